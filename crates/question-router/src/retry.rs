use std::time::Duration;

use tracing::debug;

use common::env_const::{get_retry_base_delay_ms, get_retry_max_attempts};
use loupe_env::Environment;

use crate::UpstreamError;

/// Bounded exponential backoff for collaborator calls.
///
/// `Client` errors are deterministic and returned immediately; `Server`
/// errors and timeouts are retried up to `max_attempts` total attempts,
/// sleeping `base_delay * 2^(attempt-1)` between attempts. No lock is held
/// across the sleep.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn new_from_env(env: &dyn Environment) -> Result<Self, loupe_env::EnvError> {
        Ok(Self::new(
            get_retry_max_attempts(env)?,
            Duration::from_millis(get_retry_base_delay_ms(env)?),
        ))
    }

    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.base_delay * 2u32.saturating_pow(attempt - 1);
                    debug!(%error, attempt, ?delay, "Retrying upstream call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn server_errors_retried_up_to_the_cap() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(UpstreamError::Server("503".into())) }
            })
            .await;

        assert_eq!(result, Err(UpstreamError::Server("503".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_never_retried() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(UpstreamError::Client("400".into())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let calls = AtomicU32::new(0);

        let result = policy
            .run(|| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt < 3 {
                        Err(UpstreamError::Timeout)
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn first_success_returns_immediately() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));

        let result = policy.run(|| async { Ok(42) }).await;
        assert_eq!(result, Ok(42));
    }
}
