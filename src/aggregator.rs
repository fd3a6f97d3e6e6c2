//! Table operations behind the crawl statistics. These work on plain maps;
//! `CrawlState` wraps them in locks.

use std::collections::{HashMap, HashSet};

pub fn fold_into_global(page: &HashMap<String, u64>, global: &mut HashMap<String, u64>) {
    for (token, count) in page {
        *global.entry(token.clone()).or_insert(0) += count;
    }
}

pub fn record_page_length(url: &str, token_count: u64, table: &mut HashMap<String, u64>) {
    table.insert(url.to_string(), token_count);
}

/// Most frequent tokens not in `stop_words`, count descending. Equal counts
/// are ordered by token so the result does not depend on map iteration.
pub fn top_n(global: &HashMap<String, u64>, n: usize, stop_words: &[&str]) -> Vec<(String, u64)> {
    let stop_words: HashSet<&str> = stop_words.iter().copied().collect();
    let mut words: Vec<(&String, u64)> = global
        .iter()
        .filter(|(token, _)| !stop_words.contains(token.as_str()))
        .map(|(token, count)| (token, *count))
        .collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    words
        .into_iter()
        .take(n)
        .map(|(token, count)| (token.clone(), count))
        .collect()
}

/// Page with the most tokens; the smallest URL wins a tie.
pub fn longest_page(table: &HashMap<String, u64>) -> Option<(String, u64)> {
    table
        .iter()
        .min_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)))
        .map(|(url, count)| (url.clone(), *count))
}
