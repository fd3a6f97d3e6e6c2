use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

/// Spaces out requests to the same host by at least `min_delay`.
#[derive(Clone)]
pub struct RateLimiter {
    min_delay: Duration,
    next_slot: Arc<Mutex<HashMap<String, Instant>>>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            next_slot: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Waits for this host's next free slot. The slot is reserved before
    /// sleeping so concurrent callers queue up behind each other.
    pub async fn wait_if_needed(&self, url: &str) {
        let Some(host) = Self::extract_host(url) else {
            return;
        };

        let now = Instant::now();
        let start = {
            let mut slots = self.next_slot.lock().await;
            let start = slots.get(&host).copied().filter(|slot| *slot > now).unwrap_or(now);
            slots.insert(host, start + self.min_delay);
            start
        };

        if start > now {
            tokio::time::sleep_until(start).await;
        }
    }

    fn extract_host(url: &str) -> Option<String> {
        Url::parse(url).ok().and_then(|u| u.host_str().map(|s| s.to_string()))
    }
}
