use crate::state::CrawlState;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLength {
    pub url: String,
    pub words: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Count {
    pub key: String,
    pub count: u64,
}

/// End-of-crawl report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub unique_links: usize,
    pub longest_page: Option<PageLength>,
    pub top_words: Vec<Count>,
    pub subdomains: Vec<Count>,
}

impl Summary {
    pub fn from_state(state: &CrawlState, top_words: usize) -> Self {
        Self {
            unique_links: state.unique_links(),
            longest_page: state
                .longest_page()
                .map(|(url, words)| PageLength { url, words }),
            top_words: to_counts(state.top_words(top_words)),
            subdomains: to_counts(state.subdomain_counts()),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn to_counts(pairs: Vec<(String, u64)>) -> Vec<Count> {
    pairs
        .into_iter()
        .map(|(key, count)| Count { key, count })
        .collect()
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Crawl Summary")?;
        writeln!(f, "Total unique links: {}", self.unique_links)?;
        match &self.longest_page {
            Some(page) => writeln!(f, "Longest page: {} ({} words)", page.url, page.words)?,
            None => writeln!(f, "Longest page: N/A (no pages with words)")?,
        }
        writeln!(f, "Top {} words:", self.top_words.len())?;
        for word in &self.top_words {
            writeln!(f, "{}: {}", word.key, word.count)?;
        }
        writeln!(f, "Subdomains: {}", self.subdomains.len())?;
        for subdomain in &self.subdomains {
            writeln!(f, "{}: {}", subdomain.key, subdomain.count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontier::FrontierEntry;
    use crate::normalizer::NormalizedUrl;
    use std::collections::HashMap;

    #[test]
    fn renders_sections_in_order() {
        let state = CrawlState::new("ics.uci.edu");
        for url in ["https://www.ics.uci.edu/a", "https://alpha.ics.uci.edu/"] {
            state.observe(&FrontierEntry::new(NormalizedUrl::parse(url).unwrap(), true));
        }
        state.record_page_length("https://www.ics.uci.edu/a", 3);
        state.fold_into_global(&HashMap::from([
            ("crawler".to_string(), 2),
            ("the".to_string(), 5),
            ("trap".to_string(), 1),
        ]));

        let text = Summary::from_state(&state, 50).to_string();
        assert_eq!(
            text,
            "Crawl Summary\n\
             Total unique links: 2\n\
             Longest page: https://www.ics.uci.edu/a (3 words)\n\
             Top 2 words:\n\
             crawler: 2\n\
             trap: 1\n\
             Subdomains: 2\n\
             alpha.ics.uci.edu: 1\n\
             www.ics.uci.edu: 1\n"
        );
    }

    #[test]
    fn empty_crawl_has_no_longest_page() {
        let summary = Summary::from_state(&CrawlState::new("ics.uci.edu"), 50);
        assert!(summary.to_string().contains("Longest page: N/A"));
        let json = summary.to_json().unwrap();
        assert!(json.contains("\"unique_links\": 0"));
    }
}
