use crate::normalizer::NormalizedUrl;
use parking_lot::Mutex;
use std::collections::HashMap;

/// A discovered URL and whether it may be crawled. Eligibility is fixed the
/// first time the URL is observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: NormalizedUrl,
    pub eligible: bool,
}

impl FrontierEntry {
    pub fn new(url: NormalizedUrl, eligible: bool) -> Self {
        Self { url, eligible }
    }
}

/// Every URL ever discovered, eligible or not. Only grows.
#[derive(Default)]
pub struct SeenSet {
    entries: Mutex<HashMap<String, bool>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the entry if its URL is unseen. Returns whether it was new;
    /// an existing entry keeps its original eligibility.
    pub fn observe(&self, entry: &FrontierEntry) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(entry.url.as_str()) {
            return false;
        }
        entries.insert(entry.url.as_str().to_string(), entry.eligible);
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.lock().contains_key(url)
    }

    pub fn is_eligible(&self, url: &str) -> Option<bool> {
        self.entries.lock().get(url).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn snapshot(&self) -> HashMap<String, bool> {
        self.entries.lock().clone()
    }

    /// Adds restored entries without touching ones already present.
    pub(crate) fn merge(&self, restored: HashMap<String, bool>) {
        let mut entries = self.entries.lock();
        for (url, eligible) in restored {
            entries.entry(url).or_insert(eligible);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn entry(url: &str, eligible: bool) -> FrontierEntry {
        FrontierEntry::new(NormalizedUrl::parse(url).unwrap(), eligible)
    }

    #[test]
    fn observe_is_true_exactly_once() {
        let seen = SeenSet::new();
        let page = entry("https://www.ics.uci.edu/a", true);
        assert!(seen.observe(&page));
        assert!(!seen.observe(&page));
        assert!(!seen.observe(&page));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn eligibility_is_never_reevaluated() {
        let seen = SeenSet::new();
        assert!(seen.observe(&entry("https://evil.com/", false)));
        assert!(!seen.observe(&entry("https://evil.com/", true)));
        assert_eq!(seen.is_eligible("https://evil.com/"), Some(false));
    }

    #[test]
    fn fragments_do_not_create_new_entries() {
        let seen = SeenSet::new();
        assert!(seen.observe(&entry("https://www.ics.uci.edu/a#one", true)));
        assert!(!seen.observe(&entry("https://www.ics.uci.edu/a#two", true)));
    }

    #[test]
    fn merge_keeps_existing_entries() {
        let seen = SeenSet::new();
        seen.observe(&entry("https://www.ics.uci.edu/a", true));
        let restored = HashMap::from([
            ("https://www.ics.uci.edu/a".to_string(), false),
            ("https://www.ics.uci.edu/b".to_string(), true),
        ]);
        seen.merge(restored);
        assert_eq!(seen.len(), 2);
        assert_eq!(seen.is_eligible("https://www.ics.uci.edu/a"), Some(true));
    }

    #[test]
    fn concurrent_observers_agree_on_a_single_winner() {
        let seen = Arc::new(SeenSet::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let seen = Arc::clone(&seen);
                std::thread::spawn(move || {
                    (0..100)
                        .filter(|i| {
                            let url = format!("https://www.ics.uci.edu/p{i}");
                            seen.observe(&entry(&url, true))
                        })
                        .count()
                })
            })
            .collect();
        let wins: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(wins, 100);
        assert_eq!(seen.len(), 100);
    }
}
