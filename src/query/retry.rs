//! Retry policy for read queries.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::cache::CacheConfig;
use crate::infra::error::TransportError;

/// Fixed-delay retry for reads that never reached the server.
///
/// Server answers are final: a 4xx/5xx is recorded on the entry as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 0,
            delay: Duration::ZERO,
        }
    }

    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(err) if err.is_retryable() && attempt < self.attempts => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max_attempts = self.attempts,
                        error = %err,
                        "Read failed before reaching the server; retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                }
                other => return other,
            }
        }
    }
}

impl From<&CacheConfig> for RetryPolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            attempts: config.query_retry_attempts,
            delay: config.query_retry_delay(),
        }
    }
}
