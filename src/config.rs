use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; scoped-crawler/0.1)";
const DEFAULT_POLITENESS_MS: u64 = 500;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CHECKPOINT_INTERVAL: usize = 100;
const DEFAULT_TOP_WORDS: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid trap pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    #[serde(default = "default_seeds")]
    pub seeds: Vec<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Stop after this many fetches. Unlimited when absent.
    #[serde(default)]
    pub max_pages: Option<usize>,
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Pages processed between stop-the-world saves.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,
    #[serde(default = "default_top_words")]
    pub top_words: usize,
    /// Only hosts under this suffix are tallied in the subdomain table.
    #[serde(default = "default_subdomain_suffix")]
    pub subdomain_suffix: String,
    #[serde(default)]
    pub filter: FilterConfig,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seeds: default_seeds(),
            user_agent: default_user_agent(),
            workers: default_workers(),
            politeness_delay_ms: default_politeness_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            max_pages: None,
            store_path: default_store_path(),
            checkpoint_interval: default_checkpoint_interval(),
            top_words: default_top_words(),
            subdomain_suffix: default_subdomain_suffix(),
            filter: FilterConfig::default(),
        }
    }
}

impl CrawlerConfig {
    /// Reads a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Zero("workers"));
        }
        if self.filter.max_url_length == 0 {
            return Err(ConfigError::Zero("filter.max_url_length"));
        }
        if self.filter.max_path_segments == 0 {
            return Err(ConfigError::Zero("filter.max_path_segments"));
        }
        Ok(())
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_seeds() -> Vec<String> {
    vec![
        "https://www.ics.uci.edu".to_string(),
        "https://www.cs.uci.edu".to_string(),
        "https://www.informatics.uci.edu".to_string(),
        "https://www.stat.uci.edu".to_string(),
    ]
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_politeness_delay_ms() -> u64 {
    DEFAULT_POLITENESS_MS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_store_path() -> PathBuf {
    PathBuf::from("crawl_state.db")
}

fn default_checkpoint_interval() -> usize {
    DEFAULT_CHECKPOINT_INTERVAL
}

fn default_top_words() -> usize {
    DEFAULT_TOP_WORDS
}

fn default_subdomain_suffix() -> String {
    "ics.uci.edu".to_string()
}

/// Host that is only in scope under a particular path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathQualifiedDomain {
    pub host_marker: String,
    pub path_prefix: String,
}

/// Markers that only apply on `host` and its subdomains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostMarkers {
    pub host: String,
    pub markers: Vec<String>,
}

impl HostMarkers {
    fn new(host: &str, markers: &[&str]) -> Self {
        Self {
            host: host.to_string(),
            markers: to_strings(markers),
        }
    }
}

/// Parameters for every admissibility rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub allowed_domains: Vec<String>,
    pub path_qualified_domains: Vec<PathQualifiedDomain>,
    pub max_url_length: usize,
    /// Regexes matched against the lowercased path.
    pub trap_path_patterns: Vec<String>,
    pub max_path_segments: usize,
    /// Substrings rejected in the lowercased query on any host.
    pub noise_query_markers: Vec<String>,
    /// Query parameter names that page through listings; rejected when the
    /// value is a number.
    pub paging_query_params: Vec<String>,
    pub host_query_markers: Vec<HostMarkers>,
    /// Substrings of `path?query` marking login-gated pages.
    pub auth_gated: Vec<HostMarkers>,
    pub denied_extensions: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            allowed_domains: to_strings(&[
                "ics.uci.edu",
                "cs.uci.edu",
                "informatics.uci.edu",
                "stat.uci.edu",
            ]),
            path_qualified_domains: vec![PathQualifiedDomain {
                host_marker: "today.uci.edu".to_string(),
                path_prefix: "/department/information_computer_sciences".to_string(),
            }],
            max_url_length: 2000,
            trap_path_patterns: to_strings(&[
                r"calendar",
                r"/events?/(\d+|category|categories|tag|tags|list|day|week|month|today|upcoming|past|archive|page)(/|$)",
                r"/events?/\d{4}-\d{2}(-\d{2})?(/|$)",
                r"(^|/)\d{4}/\d{1,2}/\d{1,2}(/|$)",
                r"(^|/)\d{4}-\d{2}-\d{2}(/|$)",
                r"(^|/)(january|february|march|april|may|june|july|august|september|october|november|december)(-\d{4})?(/|$)",
            ]),
            max_path_segments: 8,
            noise_query_markers: to_strings(&[
                "share=",
                "replytocom=",
                "do=diff",
                "do=revisions",
                "do=edit",
                "do=backlink",
                "do=index",
                "rev=",
                "difftype=",
                "idx=",
                "action=download",
                "action=diff",
                "action=history",
                "ical=",
                "outlook-ical=",
                "tribe-bar-date=",
                "eventdisplay=",
                "c=n;o=",
                "c=m;o=",
                "c=s;o=",
                "c=d;o=",
            ]),
            paging_query_params: to_strings(&["page", "paged"]),
            host_query_markers: vec![
                HostMarkers::new(
                    "wiki.ics.uci.edu",
                    &["media=", "image=", "tab_files=", "tab_details=", "do=media"],
                ),
                HostMarkers::new(
                    "swiki.ics.uci.edu",
                    &["media=", "image=", "tab_files=", "tab_details=", "do=media"],
                ),
            ],
            auth_gated: vec![
                HostMarkers::new(
                    "wiki.ics.uci.edu",
                    &["do=login", "do=register", "do=resendpwd", "do=profile"],
                ),
                HostMarkers::new("gitlab.ics.uci.edu", &["/users/sign_in", "/users/password"]),
                HostMarkers::new("grape.ics.uci.edu", &["/login", "/prefs"]),
            ],
            denied_extensions: to_strings(&[
                "css", "js", "bmp", "gif", "jpg", "jpeg", "ico", "png", "tif", "tiff", "mid",
                "mp2", "mp3", "mp4", "wav", "avi", "mov", "mpeg", "ram", "m4v", "mkv", "ogg",
                "ogv", "pdf", "ps", "eps", "tex", "ppt", "pptx", "doc", "docx", "xls", "xlsx",
                "names", "data", "dat", "exe", "bz2", "tar", "msi", "bin", "7z", "psd", "dmg",
                "iso", "epub", "dll", "cnf", "tgz", "sha1", "thmx", "mso", "arff", "rtf", "jar",
                "csv", "rm", "smil", "wmv", "swf", "wma", "zip", "rar", "gz",
            ]),
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
