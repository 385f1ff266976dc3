//! Retry with exponential backoff for infrastructure writes.

use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Retry a task with exponential backoff.
///
/// Attempts the task up to `max_attempts` times (at least once). The delay
/// starts at `initial_delay` and doubles after every failure.
///
/// Returns `Ok(T)` on success or the last `Err(E)` once attempts run out.
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut task_fn: F,
    max_attempts: u32,
    initial_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut delay = initial_delay;
    let mut attempt = 1;

    loop {
        match task_fn().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt >= max_attempts => {
                error!("Task failed after {} attempts: {}", attempt, e);
                return Err(e);
            }
            Err(e) => {
                warn!(
                    "Task failed on attempt {}/{}: {}. Retrying in {:?}...",
                    attempt, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
        }
    }
}
