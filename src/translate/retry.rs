use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;
use tracing::warn;

/// Exponential backoff for throttled translation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Backoff {
    pub max_attempts: usize,
    base: Duration,
    cap: Duration,
    next: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(2), Duration::from_secs(60))
    }
}

impl Backoff {
    pub fn new(max_attempts: usize, base: Duration, cap: Duration) -> Self {
        Self {
            max_attempts,
            base,
            cap,
            next: base,
        }
    }

    /// Next delay; a longer server `Retry-After` wins. Each call doubles the
    /// base delay for the following one.
    pub fn delay(&mut self, hint: Option<Duration>) -> Duration {
        let wait = hint.map_or(self.next, |hint| hint.max(self.next));
        self.next = (self.next * 2).max(self.base).min(self.cap);
        wait
    }

    pub async fn wait(&mut self, attempt: usize, hint: Option<Duration>) {
        let wait = self.delay(hint);
        warn!(
            "translation endpoint is throttling; retry {}/{} in {:.1}s",
            attempt,
            self.max_attempts,
            wait.as_secs_f32()
        );
        tokio::time::sleep(wait).await;
    }
}

/// 429, 503 and 529 are retried, as are bodies that mention throttling.
pub(crate) fn is_throttled(status: StatusCode, body: &str) -> bool {
    if matches!(status.as_u16(), 429 | 503 | 529) {
        return true;
    }
    let body = body.to_ascii_lowercase();
    ["rate limit", "rate_limit", "too many requests", "overloaded"]
        .iter()
        .any(|needle| body.contains(needle))
}

/// `Retry-After` in whole seconds; HTTP-date values are ignored.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
