use crate::filter::{AdmissibilityFilter, Verdict};
use crate::frontier::FrontierEntry;
use crate::http_client::FetchResult;
use crate::normalizer::{NormalizedUrl, normalize_against};
use crate::parser::PageExtractor;
use crate::state::CrawlState;
use crate::tokenizer::{compute_frequencies, tokenize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Non-2xx status or a transport failure.
    Fetch {
        status: Option<u16>,
        error: Option<String>,
    },
    NoContent,
    Unparseable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Fetch {
                error: Some(error), ..
            } => write!(f, "{error}"),
            SkipReason::Fetch {
                status: Some(status),
                error: None,
            } => write!(f, "http status {status}"),
            SkipReason::Fetch { .. } => write!(f, "fetch failed"),
            SkipReason::NoContent => write!(f, "no content"),
            SkipReason::Unparseable(e) => write!(f, "unparseable: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Processed {
        tokens: u64,
        candidates: Vec<NormalizedUrl>,
    },
    Skipped(SkipReason),
}

impl PageOutcome {
    pub fn candidates(&self) -> &[NormalizedUrl] {
        match self {
            PageOutcome::Processed { candidates, .. } => candidates,
            PageOutcome::Skipped(_) => &[],
        }
    }
}

/// Folds fetched pages into a [`CrawlState`] and picks the next URLs to crawl.
#[derive(Clone)]
pub struct PageProcessor {
    state: Arc<CrawlState>,
    filter: Arc<AdmissibilityFilter>,
    extractor: Arc<dyn PageExtractor>,
}

impl PageProcessor {
    pub fn new(
        state: Arc<CrawlState>,
        filter: Arc<AdmissibilityFilter>,
        extractor: Arc<dyn PageExtractor>,
    ) -> Self {
        Self {
            state,
            filter,
            extractor,
        }
    }

    pub fn state(&self) -> &Arc<CrawlState> {
        &self.state
    }

    pub fn filter(&self) -> &AdmissibilityFilter {
        &self.filter
    }

    /// Registers a seed like any discovered link. Returns true when the seed
    /// is new and admissible, i.e. should be queued.
    pub fn observe_seed(&self, url: &NormalizedUrl) -> bool {
        let verdict = self.filter.evaluate(url);
        if let Verdict::Rejected(rule) = verdict {
            warn!(url = %url, rule, "seed is not admissible");
        }
        let _page = self.state.begin_page();
        self.state
            .observe(&FrontierEntry::new(url.clone(), verdict.is_admitted()))
            && verdict.is_admitted()
    }

    pub fn process_page(&self, url: &NormalizedUrl, fetch: &FetchResult) -> PageOutcome {
        if !fetch.is_success() {
            warn!(
                url = %url,
                status = ?fetch.status,
                error = fetch.error.as_deref().unwrap_or(""),
                "skipping unsuccessful fetch"
            );
            return PageOutcome::Skipped(SkipReason::Fetch {
                status: fetch.status,
                error: fetch.error.clone(),
            });
        }
        let Some(content) = fetch.content.as_deref() else {
            warn!(url = %url, "skipping page without content");
            return PageOutcome::Skipped(SkipReason::NoContent);
        };
        let page = match self.extractor.extract(content) {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %url, error = %e, "skipping unparseable page");
                return PageOutcome::Skipped(SkipReason::Unparseable(e.to_string()));
            }
        };

        // Links resolve against where the redirect chain ended.
        let base = Url::parse(&fetch.final_url).unwrap_or_else(|_| url.as_url().clone());
        let tokens = tokenize(&page.text);
        let frequencies = compute_frequencies(&tokens);
        let token_count = tokens.len() as u64;

        let _page = self.state.begin_page();
        self.state.observe(&FrontierEntry::new(
            url.clone(),
            self.filter.is_admissible(url),
        ));
        self.state.fold_into_global(&frequencies);
        self.state.record_page_length(url.as_str(), token_count);

        let mut candidates = Vec::new();
        for href in &page.links {
            let link = match normalize_against(&base, href) {
                Ok(link) => link,
                Err(e) => {
                    debug!(page = %url, error = %e, "dropping malformed link");
                    continue;
                }
            };
            let verdict = self.filter.evaluate(&link);
            if let Verdict::Rejected(rule) = verdict {
                trace!(url = %link, rule, "link not admissible");
            }
            let entry = FrontierEntry::new(link, verdict.is_admitted());
            if self.state.observe(&entry) && entry.eligible {
                candidates.push(entry.url);
            }
        }

        debug!(url = %url, tokens = token_count, candidates = candidates.len(), "page processed");
        PageOutcome::Processed {
            tokens: token_count,
            candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::parser::HtmlExtractor;

    fn processor() -> PageProcessor {
        PageProcessor::new(
            Arc::new(CrawlState::new("ics.uci.edu")),
            Arc::new(AdmissibilityFilter::from_config(&FilterConfig::default()).unwrap()),
            Arc::new(HtmlExtractor),
        )
    }

    fn url(s: &str) -> NormalizedUrl {
        NormalizedUrl::parse(s).unwrap()
    }

    #[test]
    fn failed_fetches_are_skipped_without_side_effects() {
        let processor = processor();
        let page = url("https://www.ics.uci.edu/missing");
        let fetch = FetchResult::failure(page.as_str(), Some(404), "http error: 404");
        let outcome = processor.process_page(&page, &fetch);
        assert!(matches!(
            outcome,
            PageOutcome::Skipped(SkipReason::Fetch {
                status: Some(404),
                ..
            })
        ));
        assert_eq!(processor.state().unique_links(), 0);
        assert_eq!(processor.state().pages_recorded(), 0);
    }

    #[test]
    fn refused_body_is_skipped_with_its_error_detail() {
        let processor = processor();
        let page = url("https://www.ics.uci.edu/report");
        let fetch = FetchResult::failure(
            page.as_str(),
            Some(200),
            "invalid content type: application/pdf",
        );
        assert_eq!(
            processor.process_page(&page, &fetch),
            PageOutcome::Skipped(SkipReason::Fetch {
                status: Some(200),
                error: Some("invalid content type: application/pdf".to_string()),
            })
        );
        assert_eq!(processor.state().pages_recorded(), 0);
    }

    #[test]
    fn missing_content_is_skipped() {
        let processor = processor();
        let page = url("https://www.ics.uci.edu/empty");
        let mut fetch = FetchResult::success(page.as_str(), "");
        fetch.content = None;
        assert_eq!(
            processor.process_page(&page, &fetch),
            PageOutcome::Skipped(SkipReason::NoContent)
        );
    }

    #[test]
    fn malformed_links_are_dropped_and_the_page_continues() {
        let processor = processor();
        let page = url("https://www.ics.uci.edu/index");
        let html = r#"<html><body>one two
            <a href="http://[broken">bad</a>
            <a href="/people">people</a>
        </body></html>"#;
        let outcome = processor.process_page(&page, &FetchResult::success(page.as_str(), html));
        assert_eq!(outcome.candidates(), &[url("https://www.ics.uci.edu/people")]);
        assert_eq!(processor.state().unique_links(), 2);
    }

    #[test]
    fn inadmissible_links_are_seen_but_not_returned() {
        let processor = processor();
        let page = url("https://www.ics.uci.edu/");
        let html = r#"<body>
            <a href="/calendar/2023/05">cal</a>
            <a href="/slides.pdf">pdf</a>
            <a href="https://evil.com/">evil</a>
            <a href="/about#team">about</a>
            <a href="/about">about again</a>
        </body>"#;
        let outcome = processor.process_page(&page, &FetchResult::success(page.as_str(), html));
        assert_eq!(outcome.candidates(), &[url("https://www.ics.uci.edu/about")]);
        assert_eq!(processor.state().unique_links(), 5);
        assert_eq!(
            processor.state().seen().is_eligible("https://evil.com/"),
            Some(false)
        );
    }

    #[test]
    fn links_resolve_against_the_final_url() {
        let processor = processor();
        let page = url("https://www.ics.uci.edu/old");
        let mut fetch = FetchResult::success(page.as_str(), r#"<body><a href="next">n</a></body>"#);
        fetch.final_url = "https://www.ics.uci.edu/new/".to_string();
        let outcome = processor.process_page(&page, &fetch);
        assert_eq!(outcome.candidates(), &[url("https://www.ics.uci.edu/new/next")]);
        assert_eq!(processor.state().word_count(page.as_str()), Some(1));
    }

    #[test]
    fn seeds_are_queued_once() {
        let processor = processor();
        let seed = url("https://www.ics.uci.edu/");
        assert!(processor.observe_seed(&seed));
        assert!(!processor.observe_seed(&seed));
        assert!(!processor.observe_seed(&url("https://evil.com/")));
        assert_eq!(processor.state().unique_links(), 2);
    }
}
