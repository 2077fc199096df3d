//! Retry-with-backoff for operations whose error reports itself as
//! retryable. Built on the `backoff` crate (already a teacher dependency),
//! capped at a bounded number of attempts rather than the crate's default
//! unbounded elapsed-time budget.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(10);

pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_interval: Duration::from_millis(200),
            max_interval: DEFAULT_MAX_INTERVAL,
        }
    }
}

/// Retries `op` with exponential backoff and jitter while `is_retryable`
/// says the error allows it, up to `policy.max_retries` attempts beyond the
/// first.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(policy.initial_interval)
        .with_max_interval(policy.max_interval)
        .with_max_elapsed_time(None)
        .build();

    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_retries && is_retryable(&err) => {
                attempt += 1;
                let delay = backoff.next_backoff().unwrap_or(policy.max_interval);
                warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying after transient failure");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
