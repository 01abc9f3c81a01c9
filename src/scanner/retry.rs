//! Capped exponential backoff for rate-limited requests.
//!
//! Applies to HTTP 429 only; any other non-2xx response is fatal at this
//! layer and propagates unchanged.

use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::warn;

use crate::error::AnalysisError;

/// Backoff schedule for 429 responses
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub initial: Duration,
    /// Per-attempt delay ceiling
    pub cap: Duration,
    /// Maximum number of request attempts
    pub max_attempts: u32,
    /// Overall wall-clock budget for the whole retry sequence
    pub budget: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            max_attempts: 5,
            budget: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given 1-based failed attempt: doubles each
    /// time, capped at `cap`
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let raw = self
            .initial
            .saturating_mul(2u32.saturating_pow(exponent));
        raw.min(self.cap)
    }

    /// Send a request, retrying on 429 until the attempt count or time
    /// budget is exhausted. `build` is called once per attempt.
    pub async fn send<F, Fut>(&self, mut build: F) -> Result<reqwest::Response, AnalysisError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let started = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let response = build().await?;
            if response.status() != reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            if attempts >= self.max_attempts {
                break;
            }
            let delay = self.delay(attempts);
            if started.elapsed() + delay > self.budget {
                break;
            }

            warn!(attempt = attempts, delay_ms = delay.as_millis() as u64, "rate limited, backing off");
            sleep(delay).await;
        }

        Err(AnalysisError::RateLimited {
            attempts,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_and_caps_at_thirty_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
        assert_eq!(policy.delay(4), Duration::from_secs(8));
        assert_eq!(policy.delay(5), Duration::from_secs(16));
        assert_eq!(policy.delay(6), Duration::from_secs(30));
        assert_eq!(policy.delay(12), Duration::from_secs(30));
    }

    #[test]
    fn test_delay_tolerates_huge_attempt_numbers() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(30));
    }

    fn rate_limited_response() -> reqwest::Response {
        http::Response::builder()
            .status(http::StatusCode::TOO_MANY_REQUESTS)
            .body("slow down")
            .unwrap()
            .into()
    }

    #[tokio::test]
    async fn test_persistent_429_stops_at_max_attempts() {
        let policy = RetryPolicy {
            initial: Duration::from_millis(1),
            cap: Duration::from_millis(4),
            max_attempts: 5,
            budget: Duration::from_secs(10),
        };
        let calls = std::sync::atomic::AtomicU32::new(0);

        let err = policy
            .send(|| {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async { Ok(rate_limited_response()) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 5);
        match err {
            AnalysisError::RateLimited { attempts, .. } => assert_eq!(attempts, 5),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_first_success_returns_without_delay() {
        let policy = RetryPolicy::default();
        let response = policy
            .send(|| async {
                Ok(http::Response::builder()
                    .status(http::StatusCode::OK)
                    .body("ok")
                    .unwrap()
                    .into())
            })
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
    }
}
