//! Scope-limited web crawler: fetches pages under a set of allowed domains,
//! filters out traps and low-value URLs, and keeps word and subdomain
//! statistics that survive restarts.

pub mod aggregator;
pub mod config;
pub mod crawler;
pub mod filter;
pub mod frontier;
pub mod http_client;
pub mod normalizer;
pub mod parser;
pub mod processor;
pub mod rate_limiter;
pub mod report;
pub mod state;
pub mod store;
pub mod tokenizer;
pub mod ui;

pub use config::{ConfigError, CrawlerConfig, FilterConfig};
pub use crawler::{CrawlOutcome, Crawler};
pub use filter::{AdmissibilityFilter, Rule, Verdict};
pub use frontier::{FrontierEntry, SeenSet};
pub use http_client::{FetchResult, Fetcher, HttpClient};
pub use normalizer::{MalformedUrl, NormalizedUrl, normalize};
pub use parser::{ExtractedPage, HtmlExtractor, PageExtractor};
pub use processor::{PageOutcome, PageProcessor, SkipReason};
pub use report::Summary;
pub use state::{CrawlSnapshot, CrawlState};
pub use store::{Store, StoreError};
