//! Admissibility filter: an ordered list of independent rules, each of which
//! can veto a URL. Evaluation stops at the first rule that rejects.

use crate::config::{ConfigError, FilterConfig, HostMarkers, PathQualifiedDomain};
use crate::normalizer::{MalformedUrl, NormalizedUrl};
use regex::Regex;
use std::collections::HashSet;

/// A single admissibility check. Implementations must be pure.
pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;

    fn admits(&self, url: &NormalizedUrl) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Admitted,
    Rejected(&'static str),
}

impl Verdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Verdict::Admitted)
    }
}

pub struct AdmissibilityFilter {
    rules: Vec<Box<dyn Rule>>,
}

impl AdmissibilityFilter {
    /// A filter with no rules admits everything.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Builds the standard rule chain. Cheap structural checks come first.
    pub fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        Ok(Self::empty()
            .with_rule(SchemeRule)
            .with_rule(DomainRule::new(
                config.allowed_domains.clone(),
                config.path_qualified_domains.clone(),
            ))
            .with_rule(UrlLengthRule {
                max: config.max_url_length,
            })
            .with_rule(TrapPathRule::new(&config.trap_path_patterns)?)
            .with_rule(SegmentCountRule {
                max: config.max_path_segments,
            })
            .with_rule(DistinctSegmentsRule)
            .with_rule(AdjacentRepeatRule)
            .with_rule(QueryNoiseRule::new(
                &config.noise_query_markers,
                &config.host_query_markers,
            )
            .with_paging_params(&config.paging_query_params))
            .with_rule(AuthGateRule::new(&config.auth_gated))
            .with_rule(ExtensionRule::new(&config.denied_extensions)))
    }

    /// Appends a rule after the existing ones.
    pub fn with_rule<R: Rule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    pub fn evaluate(&self, url: &NormalizedUrl) -> Verdict {
        for rule in &self.rules {
            if !rule.admits(url) {
                return Verdict::Rejected(rule.name());
            }
        }
        Verdict::Admitted
    }

    pub fn is_admissible(&self, url: &NormalizedUrl) -> bool {
        self.evaluate(url).is_admitted()
    }

    /// Parses `input` first; unparseable input is reported, not admitted.
    pub fn check_str(&self, input: &str) -> Result<bool, MalformedUrl> {
        let url = NormalizedUrl::parse(input)?;
        Ok(self.is_admissible(&url))
    }
}

/// True when `host` is `domain` or one of its subdomains.
pub fn host_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim_start_matches('.');
    if host.len() == domain.len() {
        return host.eq_ignore_ascii_case(domain);
    }
    host.len() > domain.len()
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
        && host[host.len() - domain.len()..].eq_ignore_ascii_case(domain)
}

pub struct SchemeRule;

impl Rule for SchemeRule {
    fn name(&self) -> &'static str {
        "scheme"
    }

    fn admits(&self, url: &NormalizedUrl) -> bool {
        matches!(url.scheme(), "http" | "https")
    }
}

/// Host must equal an allowed domain or be one of its subdomains. Matching
/// is on label boundaries, so `physics.uci.edu` is not under `ics.uci.edu`
/// even though the string ends with it. A path-qualified domain admits a
/// host containing its marker when the path contains the required prefix.
pub struct DomainRule {
    allowed: Vec<String>,
    path_qualified: Vec<PathQualifiedDomain>,
}

impl DomainRule {
    pub fn new(allowed: Vec<String>, path_qualified: Vec<PathQualifiedDomain>) -> Self {
        Self {
            allowed,
            path_qualified,
        }
    }
}

impl Rule for DomainRule {
    fn name(&self) -> &'static str {
        "domain"
    }

    fn admits(&self, url: &NormalizedUrl) -> bool {
        let Some(host) = url.host() else {
            return false;
        };
        if self.allowed.iter().any(|domain| host_matches(host, domain)) {
            return true;
        }
        self.path_qualified.iter().any(|qualified| {
            host.contains(qualified.host_marker.as_str())
                && url.path().contains(qualified.path_prefix.as_str())
        })
    }
}

pub struct UrlLengthRule {
    pub max: usize,
}

impl Rule for UrlLengthRule {
    fn name(&self) -> &'static str {
        "url-length"
    }

    fn admits(&self, url: &NormalizedUrl) -> bool {
        url.as_str().len() <= self.max
    }
}

/// Calendars, event listings and date-shaped paths.
pub struct TrapPathRule {
    patterns: Vec<Regex>,
}

impl TrapPathRule {
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }
}

impl Rule for TrapPathRule {
    fn name(&self) -> &'static str {
        "trap-path"
    }

    fn admits(&self, url: &NormalizedUrl) -> bool {
        let path = url.path().to_ascii_lowercase();
        !self.patterns.iter().any(|pattern| pattern.is_match(&path))
    }
}

pub struct SegmentCountRule {
    pub max: usize,
}

impl Rule for SegmentCountRule {
    fn name(&self) -> &'static str {
        "segment-count"
    }

    fn admits(&self, url: &NormalizedUrl) -> bool {
        url.segments().len() <= self.max
    }
}

/// At least half of the segments must be distinct.
pub struct DistinctSegmentsRule;

impl Rule for DistinctSegmentsRule {
    fn name(&self) -> &'static str {
        "distinct-segments"
    }

    fn admits(&self, url: &NormalizedUrl) -> bool {
        let segments = url.segments();
        let distinct: HashSet<&str> = segments.iter().copied().collect();
        distinct.len() * 2 >= segments.len()
    }
}

pub struct AdjacentRepeatRule;

impl Rule for AdjacentRepeatRule {
    fn name(&self) -> &'static str {
        "adjacent-repeat"
    }

    fn admits(&self, url: &NormalizedUrl) -> bool {
        !url.segments().windows(2).any(|pair| pair[0] == pair[1])
    }
}

pub struct QueryNoiseRule {
    markers: Vec<String>,
    host_markers: Vec<HostMarkers>,
    paging_params: Vec<String>,
}

impl QueryNoiseRule {
    pub fn new(markers: &[String], host_markers: &[HostMarkers]) -> Self {
        Self {
            markers: lowercase_all(markers),
            host_markers: host_markers.iter().map(lowercase_markers).collect(),
            paging_params: Vec::new(),
        }
    }

    /// Also rejects `name=<digits>` for each of `params`. Names match whole
    /// parameters, so `homepage=2` is not caught by `page`.
    pub fn with_paging_params(mut self, params: &[String]) -> Self {
        self.paging_params = lowercase_all(params);
        self
    }

    fn is_paging(&self, query: &str) -> bool {
        query.split(['&', ';']).any(|pair| match pair.split_once('=') {
            Some((name, value)) => {
                !value.is_empty()
                    && value.bytes().all(|b| b.is_ascii_digit())
                    && self.paging_params.iter().any(|param| param == name)
            }
            None => false,
        })
    }
}

impl Rule for QueryNoiseRule {
    fn name(&self) -> &'static str {
        "query-noise"
    }

    fn admits(&self, url: &NormalizedUrl) -> bool {
        let Some(query) = url.query() else {
            return true;
        };
        let query = query.to_ascii_lowercase();
        if self.markers.iter().any(|marker| query.contains(marker.as_str())) {
            return false;
        }
        if self.is_paging(&query) {
            return false;
        }
        !matches_host_markers(&self.host_markers, url.host(), &query)
    }
}

pub struct AuthGateRule {
    gated: Vec<HostMarkers>,
}

impl AuthGateRule {
    pub fn new(gated: &[HostMarkers]) -> Self {
        Self {
            gated: gated.iter().map(lowercase_markers).collect(),
        }
    }
}

impl Rule for AuthGateRule {
    fn name(&self) -> &'static str {
        "auth-gated"
    }

    fn admits(&self, url: &NormalizedUrl) -> bool {
        let mut target = url.path().to_ascii_lowercase();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(&query.to_ascii_lowercase());
        }
        !matches_host_markers(&self.gated, url.host(), &target)
    }
}

pub struct ExtensionRule {
    denied: HashSet<String>,
}

impl ExtensionRule {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            denied: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }
}

impl Rule for ExtensionRule {
    fn name(&self) -> &'static str {
        "extension"
    }

    fn admits(&self, url: &NormalizedUrl) -> bool {
        let last = url.path().rsplit('/').next().unwrap_or_default();
        match last.rsplit_once('.') {
            Some((_, ext)) => !self.denied.contains(&ext.to_ascii_lowercase()),
            None => true,
        }
    }
}

fn matches_host_markers(entries: &[HostMarkers], host: Option<&str>, haystack: &str) -> bool {
    let Some(host) = host else {
        return false;
    };
    entries
        .iter()
        .filter(|entry| host_matches(host, &entry.host))
        .any(|entry| entry.markers.iter().any(|marker| haystack.contains(marker.as_str())))
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_ascii_lowercase()).collect()
}

fn lowercase_markers(entry: &HostMarkers) -> HostMarkers {
    HostMarkers {
        host: entry.host.to_ascii_lowercase(),
        markers: lowercase_all(&entry.markers),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> AdmissibilityFilter {
        AdmissibilityFilter::from_config(&FilterConfig::default()).unwrap()
    }

    fn verdict(input: &str) -> Verdict {
        filter().evaluate(&NormalizedUrl::parse(input).unwrap())
    }

    #[test]
    fn rules_run_in_declared_order() {
        assert_eq!(
            filter().rule_names(),
            vec![
                "scheme",
                "domain",
                "url-length",
                "trap-path",
                "segment-count",
                "distinct-segments",
                "adjacent-repeat",
                "query-noise",
                "auth-gated",
                "extension",
            ]
        );
    }

    #[test]
    fn admits_in_scope_pages() {
        assert_eq!(verdict("https://www.ics.uci.edu/page"), Verdict::Admitted);
        assert_eq!(verdict("http://vision.ics.uci.edu/"), Verdict::Admitted);
        assert_eq!(verdict("https://www.stat.uci.edu/seminars?id=3"), Verdict::Admitted);
    }

    #[test]
    fn rejects_other_schemes() {
        assert_eq!(verdict("ftp://www.ics.uci.edu/file"), Verdict::Rejected("scheme"));
        assert_eq!(verdict("mailto:someone@ics.uci.edu"), Verdict::Rejected("scheme"));
    }

    #[test]
    fn rejects_foreign_domains() {
        assert_eq!(verdict("https://evil.com/page"), Verdict::Rejected("domain"));
        assert_eq!(verdict("https://notics.uci.edu/page"), Verdict::Rejected("domain"));
        assert_eq!(verdict("https://uci.edu/page"), Verdict::Rejected("domain"));
    }

    #[test]
    fn path_qualified_domain_needs_the_path() {
        assert_eq!(
            verdict("https://today.uci.edu/department/information_computer_sciences/news"),
            Verdict::Admitted
        );
        assert_eq!(
            verdict("https://today.uci.edu/news/department/information_computer_sciences/x"),
            Verdict::Admitted
        );
        assert_eq!(
            verdict("https://today.uci.edu/department/engineering"),
            Verdict::Rejected("domain")
        );
    }

    #[test]
    fn rejects_overlong_urls() {
        let long = format!("https://www.ics.uci.edu/search?q={}", "x".repeat(2000));
        assert_eq!(verdict(&long), Verdict::Rejected("url-length"));
    }

    #[test]
    fn length_limit_is_inclusive() {
        let prefix = "https://www.ics.uci.edu/search?q=";
        let at_limit = format!("{prefix}{}", "x".repeat(2000 - prefix.len()));
        assert_eq!(at_limit.len(), 2000);
        assert_eq!(verdict(&at_limit), Verdict::Admitted);

        let over_limit = format!("{at_limit}x");
        assert_eq!(verdict(&over_limit), Verdict::Rejected("url-length"));
    }

    #[test]
    fn rejects_calendar_and_date_traps() {
        assert_eq!(
            verdict("https://www.ics.uci.edu/calendar/events/2023/05/01"),
            Verdict::Rejected("trap-path")
        );
        assert_eq!(
            verdict("https://www.ics.uci.edu/news/2021/10/14/story"),
            Verdict::Rejected("trap-path")
        );
        assert_eq!(
            verdict("https://www.ics.uci.edu/events/category/talks"),
            Verdict::Rejected("trap-path")
        );
        assert_eq!(
            verdict("https://www.ics.uci.edu/events/2023-05"),
            Verdict::Rejected("trap-path")
        );
        assert_eq!(
            verdict("https://www.ics.uci.edu/archive/march-2019/"),
            Verdict::Rejected("trap-path")
        );
        assert_eq!(verdict("https://www.ics.uci.edu/events"), Verdict::Admitted);
    }

    #[test]
    fn rejects_deep_paths() {
        assert_eq!(
            verdict("https://www.ics.uci.edu/a/b/a/b/a/b/a/b/a"),
            Verdict::Rejected("segment-count")
        );
        assert_eq!(verdict("https://www.ics.uci.edu/a/b/c/d/e/f/g/h"), Verdict::Admitted);
    }

    #[test]
    fn rejects_mostly_repeated_segments() {
        assert_eq!(
            verdict("https://www.ics.uci.edu/a/b/a/b/a/b"),
            Verdict::Rejected("distinct-segments")
        );
        assert_eq!(verdict("https://www.ics.uci.edu/a/b/a/c"), Verdict::Admitted);
    }

    #[test]
    fn rejects_adjacent_repeats() {
        assert_eq!(
            verdict("https://www.ics.uci.edu/a/a/b"),
            Verdict::Rejected("adjacent-repeat")
        );
        assert_eq!(
            verdict("https://www.ics.uci.edu/foo/foo/"),
            Verdict::Rejected("adjacent-repeat")
        );
    }

    #[test]
    fn rejects_noise_queries() {
        assert_eq!(
            verdict("https://wiki.ics.uci.edu/doku.php?do=diff"),
            Verdict::Rejected("query-noise")
        );
        assert_eq!(
            verdict("https://www.ics.uci.edu/blog/post?share=twitter"),
            Verdict::Rejected("query-noise")
        );
        assert_eq!(
            verdict("https://www.ics.uci.edu/~user/files/?C=N;O=D"),
            Verdict::Rejected("query-noise")
        );
        assert_eq!(
            verdict("https://www.ics.uci.edu/blog/?paged=37"),
            Verdict::Rejected("query-noise")
        );
        assert_eq!(
            verdict("https://www.informatics.uci.edu/news/?page=412"),
            Verdict::Rejected("query-noise")
        );
        assert_eq!(
            verdict("https://www.ics.uci.edu/news/?cat=3&PAGE=2"),
            Verdict::Rejected("query-noise")
        );
    }

    #[test]
    fn paging_names_match_whole_parameters() {
        assert_eq!(verdict("https://www.ics.uci.edu/x?homepage=2"), Verdict::Admitted);
        assert_eq!(verdict("https://www.ics.uci.edu/x?page=about"), Verdict::Admitted);
    }

    #[test]
    fn host_scoped_query_markers_only_apply_on_their_host() {
        assert_eq!(
            verdict("https://wiki.ics.uci.edu/doku.php?id=start&tab_files=files"),
            Verdict::Rejected("query-noise")
        );
        assert_eq!(
            verdict("https://www.ics.uci.edu/gallery?image=1"),
            Verdict::Admitted
        );
    }

    #[test]
    fn rejects_login_pages_on_known_hosts() {
        assert_eq!(
            verdict("https://wiki.ics.uci.edu/doku.php?id=start&do=login"),
            Verdict::Rejected("auth-gated")
        );
        assert_eq!(
            verdict("https://gitlab.ics.uci.edu/users/sign_in"),
            Verdict::Rejected("auth-gated")
        );
        assert_eq!(verdict("https://www.ics.uci.edu/login"), Verdict::Admitted);
    }

    #[test]
    fn rejects_binary_extensions_case_insensitively() {
        assert_eq!(
            verdict("https://www.ics.uci.edu/slides/Lecture1.PDF"),
            Verdict::Rejected("extension")
        );
        assert_eq!(
            verdict("https://www.ics.uci.edu/data/set.zip"),
            Verdict::Rejected("extension")
        );
        assert_eq!(verdict("https://www.ics.uci.edu/index.php"), Verdict::Admitted);
        assert_eq!(verdict("https://www.ics.uci.edu/pdf/"), Verdict::Admitted);
    }

    #[test]
    fn evaluation_is_repeatable() {
        let filter = filter();
        let url = NormalizedUrl::parse("https://www.ics.uci.edu/a/a/b").unwrap();
        let first = filter.evaluate(&url);
        for _ in 0..5 {
            assert_eq!(filter.evaluate(&url), first);
        }
    }

    #[test]
    fn check_str_reports_malformed_input() {
        let filter = filter();
        assert!(filter.check_str("http://[bad").is_err());
        assert_eq!(filter.check_str("https://www.ics.uci.edu/page"), Ok(true));
    }

    #[test]
    fn custom_rules_append_after_the_chain() {
        struct NoTilde;
        impl Rule for NoTilde {
            fn name(&self) -> &'static str {
                "no-tilde"
            }
            fn admits(&self, url: &NormalizedUrl) -> bool {
                !url.path().contains('~')
            }
        }

        let filter = filter().with_rule(NoTilde);
        let url = NormalizedUrl::parse("https://www.ics.uci.edu/~eppstein/").unwrap();
        assert_eq!(filter.evaluate(&url), Verdict::Rejected("no-tilde"));
        assert_eq!(AdmissibilityFilter::empty().evaluate(&url), Verdict::Admitted);
    }

    #[test]
    fn invalid_trap_pattern_is_a_config_error() {
        let config = FilterConfig {
            trap_path_patterns: vec!["(".to_string()],
            ..FilterConfig::default()
        };
        assert!(matches!(
            AdmissibilityFilter::from_config(&config),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn host_matching_respects_label_boundaries() {
        assert!(host_matches("ics.uci.edu", "ics.uci.edu"));
        assert!(host_matches("www.ics.uci.edu", "ics.uci.edu"));
        assert!(!host_matches("physics.uci.edu", "ics.uci.edu"));
        assert!(!host_matches("edu", "ics.uci.edu"));
    }
}
