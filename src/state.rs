use crate::aggregator;
use crate::filter::host_matches;
use crate::frontier::{FrontierEntry, SeenSet};
use crate::tokenizer::STOP_WORDS;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::collections::HashMap;

/// Plain copy of the four crawl tables, as saved to and loaded from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSnapshot {
    pub seen: HashMap<String, bool>,
    pub word_counts: HashMap<String, u64>,
    pub frequencies: HashMap<String, u64>,
    pub subdomains: HashMap<String, u64>,
}

/// Shared statistics for one crawl run. Each table has its own lock; page
/// processing holds the read side of `gate`, snapshots and merges take the
/// write side so they never interleave with page mutations.
pub struct CrawlState {
    gate: RwLock<()>,
    seen: SeenSet,
    word_counts: Mutex<HashMap<String, u64>>,
    frequencies: Mutex<HashMap<String, u64>>,
    subdomains: Mutex<HashMap<String, u64>>,
    subdomain_suffix: String,
}

/// Held while a page is being folded into the state.
pub struct PageGuard<'a> {
    _gate: RwLockReadGuard<'a, ()>,
}

impl CrawlState {
    pub fn new(subdomain_suffix: impl Into<String>) -> Self {
        Self {
            gate: RwLock::new(()),
            seen: SeenSet::new(),
            word_counts: Mutex::new(HashMap::new()),
            frequencies: Mutex::new(HashMap::new()),
            subdomains: Mutex::new(HashMap::new()),
            subdomain_suffix: subdomain_suffix.into(),
        }
    }

    pub fn begin_page(&self) -> PageGuard<'_> {
        PageGuard {
            _gate: self.gate.read(),
        }
    }

    /// Records a discovered URL. Returns true the first time it is seen, in
    /// which case its host is also tallied.
    pub fn observe(&self, entry: &FrontierEntry) -> bool {
        let is_new = self.seen.observe(entry);
        if is_new {
            if let Some(host) = entry.url.host() {
                self.tally_subdomain(host);
            }
        }
        is_new
    }

    pub fn tally_subdomain(&self, host: &str) {
        if !host_matches(host, &self.subdomain_suffix) {
            return;
        }
        *self.subdomains.lock().entry(host.to_ascii_lowercase()).or_insert(0) += 1;
    }

    pub fn fold_into_global(&self, page_frequencies: &HashMap<String, u64>) {
        aggregator::fold_into_global(page_frequencies, &mut self.frequencies.lock());
    }

    pub fn record_page_length(&self, url: &str, token_count: u64) {
        aggregator::record_page_length(url, token_count, &mut self.word_counts.lock());
    }

    pub fn unique_links(&self) -> usize {
        self.seen.len()
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn pages_recorded(&self) -> usize {
        self.word_counts.lock().len()
    }

    pub fn word_count(&self, url: &str) -> Option<u64> {
        self.word_counts.lock().get(url).copied()
    }

    pub fn frequency(&self, token: &str) -> u64 {
        self.frequencies.lock().get(token).copied().unwrap_or(0)
    }

    pub fn longest_page(&self) -> Option<(String, u64)> {
        aggregator::longest_page(&self.word_counts.lock())
    }

    pub fn top_words(&self, n: usize) -> Vec<(String, u64)> {
        aggregator::top_n(&self.frequencies.lock(), n, STOP_WORDS)
    }

    /// Subdomain counts ordered by host name.
    pub fn subdomain_counts(&self) -> Vec<(String, u64)> {
        let mut counts: Vec<(String, u64)> = self
            .subdomains
            .lock()
            .iter()
            .map(|(host, count)| (host.clone(), *count))
            .collect();
        counts.sort_by(|a, b| a.0.cmp(&b.0));
        counts
    }

    pub fn snapshot(&self) -> CrawlSnapshot {
        let _gate = self.gate.write();
        CrawlSnapshot {
            seen: self.seen.snapshot(),
            word_counts: self.word_counts.lock().clone(),
            frequencies: self.frequencies.lock().clone(),
            subdomains: self.subdomains.lock().clone(),
        }
    }

    /// Folds a loaded snapshot into the live tables: seen entries are added,
    /// page lengths overwrite, counters are summed.
    pub fn merge(&self, snapshot: CrawlSnapshot) {
        let _gate = self.gate.write();
        self.seen.merge(snapshot.seen);
        self.word_counts.lock().extend(snapshot.word_counts);
        aggregator::fold_into_global(&snapshot.frequencies, &mut self.frequencies.lock());
        aggregator::fold_into_global(&snapshot.subdomains, &mut self.subdomains.lock());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::NormalizedUrl;

    fn entry(url: &str, eligible: bool) -> FrontierEntry {
        FrontierEntry::new(NormalizedUrl::parse(url).unwrap(), eligible)
    }

    #[test]
    fn subdomains_only_count_hosts_under_the_suffix() {
        let state = CrawlState::new("ics.uci.edu");
        state.observe(&entry("https://www.ics.uci.edu/a", true));
        state.observe(&entry("https://www.ics.uci.edu/b", true));
        state.observe(&entry("https://vision.ics.uci.edu/", false));
        state.observe(&entry("https://evil.com/", false));
        state.observe(&entry("https://www.ics.uci.edu/a", true));

        assert_eq!(state.unique_links(), 4);
        assert_eq!(
            state.subdomain_counts(),
            vec![
                ("vision.ics.uci.edu".to_string(), 1),
                ("www.ics.uci.edu".to_string(), 2)
            ]
        );
    }

    #[test]
    fn snapshot_and_merge_round_trip() {
        let state = CrawlState::new("ics.uci.edu");
        state.observe(&entry("https://www.ics.uci.edu/a", true));
        state.record_page_length("https://www.ics.uci.edu/a", 3);
        state.fold_into_global(&HashMap::from([("crawl".to_string(), 3)]));
        let snapshot = state.snapshot();

        let restored = CrawlState::new("ics.uci.edu");
        restored.fold_into_global(&HashMap::from([("crawl".to_string(), 1)]));
        restored.merge(snapshot);

        assert_eq!(restored.unique_links(), 1);
        assert_eq!(restored.word_count("https://www.ics.uci.edu/a"), Some(3));
        assert_eq!(restored.frequency("crawl"), 4);
        assert_eq!(restored.subdomain_counts(), vec![("www.ics.uci.edu".to_string(), 1)]);
    }

    #[test]
    fn top_words_exclude_stop_words() {
        let state = CrawlState::new("ics.uci.edu");
        state.fold_into_global(&HashMap::from([
            ("the".to_string(), 10),
            ("informatics".to_string(), 2),
        ]));
        assert_eq!(state.top_words(50), vec![("informatics".to_string(), 2)]);
    }
}
