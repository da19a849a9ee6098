use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

use crate::adapters::llm::LlmError;

/// The caller's usage allowance for the LLM service is spent. Retrying only
/// burns more calls, so this aborts the whole run instead of one chunk.
#[derive(Debug, Clone, Error)]
#[error("llm quota exhausted: {0}")]
pub struct QuotaError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorVerdict {
    QuotaExhausted,
    Transient,
    Permanent,
}

const TRANSIENT_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Decides how a failed LLM call is handled.
///
/// 429 is ambiguous between "retry shortly" and "plan is out of quota"; the
/// message text is what separates them, and the two cases need opposite
/// handling.
pub fn classify(err: &LlmError) -> ErrorVerdict {
    let message = err.message.to_lowercase();
    if message.contains("quota") || message.contains("billing") {
        return ErrorVerdict::QuotaExhausted;
    }
    if err.status == Some(429) && message.contains("exceed") {
        return ErrorVerdict::QuotaExhausted;
    }
    if err.status.map_or(false, |s| TRANSIENT_STATUSES.contains(&s)) {
        return ErrorVerdict::Transient;
    }
    ErrorVerdict::Permanent
}

/// Bounded retry with exponential backoff and jitter around one LLM call.
///
/// The constants are tunable policy, not protocol: see `RetryConfig` in the
/// configuration module for overrides.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_jitter,
        }
    }

    /// Invokes `call` until it succeeds or the retry budget runs out.
    ///
    /// Returns `Ok(None)` when the call is abandoned (permanent failure or
    /// exhausted retries) so the caller can skip just the current chunk.
    /// Quota exhaustion escalates as `Err` and must unwind the whole run.
    pub async fn invoke<T, F, Fut>(&self, mut call: F) -> Result<Option<T>, QuotaError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        for attempt in 0..=self.max_retries {
            let err = match call().await {
                Ok(value) => return Ok(Some(value)),
                Err(err) => err,
            };

            match classify(&err) {
                ErrorVerdict::QuotaExhausted => return Err(QuotaError(err.message)),
                ErrorVerdict::Permanent => {
                    warn!(error = %err, "permanent llm failure, abandoning chunk");
                    return Ok(None);
                }
                ErrorVerdict::Transient => {
                    if attempt == self.max_retries {
                        warn!(
                            error = %err,
                            attempts = attempt + 1,
                            "retries exhausted, abandoning chunk"
                        );
                        return Ok(None);
                    }
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        error = %err,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "transient llm failure, backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
        Ok(None)
    }

    /// `base * 2^attempt` plus uniform jitter in `[0, max_jitter)`, where
    /// `attempt` is the zero-based index of the attempt that just failed.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
        };
        self.base_delay * 2u32.saturating_pow(attempt) + jitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn err(status: Option<u16>, message: &str) -> LlmError {
        LlmError::new(status, message)
    }

    #[test]
    fn quota_keyword_in_message_is_fatal() {
        let e = err(Some(429), "Quota exceeded for billing account");
        assert_eq!(classify(&e), ErrorVerdict::QuotaExhausted);
    }

    #[test]
    fn billing_keyword_is_fatal_without_status() {
        let e = err(None, "billing hard limit reached");
        assert_eq!(classify(&e), ErrorVerdict::QuotaExhausted);
    }

    #[test]
    fn rate_limit_with_exceed_is_fatal() {
        let e = err(Some(429), "Request rate exceeded");
        assert_eq!(classify(&e), ErrorVerdict::QuotaExhausted);
    }

    #[test]
    fn plain_rate_limit_is_transient() {
        let e = err(Some(429), "too many requests, slow down");
        assert_eq!(classify(&e), ErrorVerdict::Transient);
    }

    #[test]
    fn server_errors_are_transient() {
        for status in [408, 500, 502, 503, 504] {
            let e = err(Some(status), "upstream hiccup");
            assert_eq!(classify(&e), ErrorVerdict::Transient, "status {status}");
        }
    }

    #[test]
    fn bad_request_is_permanent() {
        let e = err(Some(400), "invalid request body");
        assert_eq!(classify(&e), ErrorVerdict::Permanent);
    }

    #[test]
    fn missing_status_is_permanent() {
        let e = err(None, "connection reset by peer");
        assert_eq!(classify(&e), ErrorVerdict::Permanent);
    }

    #[test]
    fn backoff_doubles_within_jitter_bounds() {
        let policy = RetryPolicy::default();
        for attempt in 0..3u32 {
            let base = 1000u64 * 2u64.pow(attempt);
            let delay = policy.backoff_delay(attempt).as_millis() as u64;
            assert!(delay >= base, "attempt {attempt}: {delay} < {base}");
            assert!(delay < base + 200, "attempt {attempt}: {delay} >= {}", base + 200);
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(1))
    }

    #[tokio::test]
    async fn persistent_transient_failure_uses_all_attempts() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .invoke(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(err(Some(503), "unavailable")) }
            })
            .await;
        assert!(matches!(result, Ok(None)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn quota_failure_stops_after_one_attempt() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .invoke(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(err(Some(429), "quota exhausted")) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permanent_failure_stops_after_one_attempt() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .invoke(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(err(Some(400), "bad request")) }
            })
            .await;
        assert!(matches!(result, Ok(None)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_after_transient_failures_returns_value() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .invoke(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(err(Some(502), "bad gateway"))
                    } else {
                        Ok(7u32)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), Some(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
