use serde::{Serialize, Serializer};
use std::fmt;
use url::Url;

/// Absolute URL with the fragment removed. Two values are equal exactly when
/// their serialized strings are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedUrl {
    url: Url,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed url {input:?}: {source}")]
pub struct MalformedUrl {
    input: String,
    #[source]
    source: url::ParseError,
}

impl MalformedUrl {
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl NormalizedUrl {
    /// Parses an already absolute URL.
    pub fn parse(input: &str) -> Result<Self, MalformedUrl> {
        let url = Url::parse(input.trim()).map_err(|source| MalformedUrl {
            input: input.to_string(),
            source,
        })?;
        Ok(Self::from_url(url))
    }

    fn from_url(mut url: Url) -> Self {
        url.set_fragment(None);
        Self { url }
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    /// Non-empty path segments, in order.
    pub fn segments(&self) -> Vec<&str> {
        self.url
            .path()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect()
    }
}

/// Resolves `href` against `base` (relative, protocol-relative or absolute)
/// and drops the fragment.
pub fn normalize(base: &str, href: &str) -> Result<NormalizedUrl, MalformedUrl> {
    let base_url = Url::parse(base.trim()).map_err(|source| MalformedUrl {
        input: base.to_string(),
        source,
    })?;
    normalize_against(&base_url, href)
}

/// Same as [`normalize`] for callers that already hold a parsed base.
pub fn normalize_against(base: &Url, href: &str) -> Result<NormalizedUrl, MalformedUrl> {
    let joined = base.join(href.trim()).map_err(|source| MalformedUrl {
        input: href.to_string(),
        source,
    })?;
    Ok(NormalizedUrl::from_url(joined))
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Serialize for NormalizedUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
