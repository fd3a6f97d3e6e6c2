use reqwest::Client;
use std::time::Duration;

const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Outcome of one fetch. `content` is only present for a readable HTML body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResult {
    pub requested_url: String,
    pub final_url: String,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub content: Option<Vec<u8>>,
}

impl FetchResult {
    pub fn success(url: &str, content: impl Into<Vec<u8>>) -> Self {
        Self {
            requested_url: url.to_string(),
            final_url: url.to_string(),
            status: Some(200),
            error: None,
            content: Some(content.into()),
        }
    }

    pub fn failure(url: &str, status: Option<u16>, error: impl Into<String>) -> Self {
        Self {
            requested_url: url.to_string(),
            final_url: url.to_string(),
            status,
            error: Some(error.into()),
            content: None,
        }
    }

    /// 2xx with no error detail. A 2xx whose body was refused (not HTML,
    /// too large) is not a success.
    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(200..=299)) && self.error.is_none()
    }
}

/// Source of page bodies for the crawler.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = FetchResult> + Send;
}

pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(user_agent)
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self { client })
    }
}

impl Fetcher for HttpClient {
    /// Never fails: transport errors, non-HTML bodies and oversized bodies
    /// are reported inside the result.
    async fn fetch(&self, url: &str) -> FetchResult {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return FetchResult::failure(url, None, format!("request error: {e}")),
        };

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let mut result = FetchResult::failure(url, Some(status), String::new());
        result.final_url = final_url;

        if !response.status().is_success() {
            result.error = Some(format!("http error: {status}"));
            return result;
        }

        if let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) {
            let content_type_str = content_type.to_str().unwrap_or("");
            if !content_type_str.contains("text/html") {
                result.error = Some(format!("invalid content type: {content_type_str}"));
                return result;
            }
        }

        if let Some(content_length) = response.content_length() {
            if content_length > MAX_RESPONSE_SIZE as u64 {
                result.error = Some(format!("response too large: {content_length} bytes"));
                return result;
            }
        }

        match response.bytes().await {
            Ok(body) if body.len() > MAX_RESPONSE_SIZE => {
                result.error = Some(format!("response too large: {} bytes", body.len()));
            }
            Ok(body) => {
                result.error = None;
                result.content = Some(body.to_vec());
            }
            Err(e) => {
                result.error = Some(format!("body error: {e}"));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_2xx_is_success() {
        assert!(FetchResult::success("https://a.edu/", "x").is_success());
        assert!(!FetchResult::failure("https://a.edu/", Some(404), "http error: 404").is_success());
        assert!(!FetchResult::failure("https://a.edu/", None, "timeout").is_success());
    }

    #[test]
    fn refused_2xx_body_is_not_success() {
        let refused = FetchResult::failure(
            "https://a.edu/report",
            Some(200),
            "invalid content type: application/pdf",
        );
        assert!(!refused.is_success());
    }
}
