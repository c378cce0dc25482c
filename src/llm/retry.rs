use std::future::Future;
use std::time::Duration;

use crate::core::config::settings::LlmSettings;
use crate::core::errors::ApiError;

/// Bounded retry for model-provider calls.
///
/// Only errors reporting `is_retryable()` are retried; everything else
/// fails on the first attempt. After `max_attempts` the last error is
/// returned so the round fails as a whole.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self::new(settings.max_attempts, settings.retry_backoff)
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}",
                        operation,
                        attempt,
                        self.max_attempts,
                        err
                    );
                    // linear backoff
                    tokio::time::sleep(self.backoff * attempt as u32).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}
