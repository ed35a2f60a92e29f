use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::{AgentError, AgentResult};
use crate::providers::errors::ProviderError;

/// Exponential backoff for model calls the backend rejected as overloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry, counting from zero
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
    }

    /// Run `operation` until it succeeds, fails with a non-transient error, or has
    /// been retried `max_retries` times. `on_retry` sees the retry number (from 1),
    /// the delay about to be slept and the error that caused it.
    pub async fn run<T, F, Fut, R>(&self, mut operation: F, mut on_retry: R) -> AgentResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AgentResult<T>>,
        R: FnMut(u32, Duration, &ProviderError),
    {
        let mut retries = 0;
        loop {
            match operation().await {
                Err(AgentError::Provider(error)) if error.is_transient() => {
                    if retries >= self.max_retries {
                        return Err(AgentError::RetriesExhausted {
                            retries,
                            source: error,
                        });
                    }
                    let delay = self.backoff(retries);
                    retries += 1;
                    warn!(
                        attempt = retries,
                        backoff_ms = delay.as_millis() as u64,
                        error = %error,
                        "Model overloaded, backing off"
                    );
                    on_retry(retries, delay, &error);
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}
