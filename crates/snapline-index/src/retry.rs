use snapline_core::config::IndexConfig;
use snapline_core::error::IndexError;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before the second attempt; grows linearly with each retry.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &IndexConfig) -> Self {
        Self {
            attempts: config.retries.saturating_add(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    pub fn no_delay(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff: Duration::ZERO,
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or the attempts run out.
pub fn with_retries<T>(
    policy: &RetryPolicy,
    label: &str,
    mut op: impl FnMut() -> Result<T, IndexError>,
) -> Result<T, IndexError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) if attempt >= attempts => {
                return Err(IndexError::RetriesExhausted {
                    attempts,
                    last: Box::new(err),
                });
            }
            Err(err) => {
                warn!(query = label, attempt, attempts, error = %err, "index query failed; retrying");
                if !policy.backoff.is_zero() {
                    std::thread::sleep(policy.backoff * attempt);
                }
                attempt += 1;
            }
        }
    }
}
