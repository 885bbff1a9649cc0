use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{Error, Result};

/// Bounded exponential backoff shared by pagination and batch resolution.
///
/// `attempts` is the total number of tries, not the number of retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following the given zero-based failed attempt.
    fn delay_for(&self, failed_attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << failed_attempt.min(16))
            .min(self.max_delay)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget runs out. The attempt counter is local to this call,
    /// so concurrent retry loops never share backoff state.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut failed = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    failed += 1;
                    if failed >= self.attempts {
                        return Err(Error::ExhaustedRetries {
                            attempts: failed,
                            source: Box::new(err),
                        });
                    }
                    let delay = self.delay_for(failed - 1);
                    warn!(
                        "{} failed ({}), retrying in {:?} (attempt {}/{})",
                        what,
                        err,
                        delay,
                        failed + 1,
                        self.attempts
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
