//! Exponential backoff for transient backend failures.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::RetryConfig;
use crate::errors::PipelineError;

/// Run `op` until it succeeds, fails non-transiently, or exhausts the
/// configured attempts. Delay doubles per attempt, capped at `max_delay_ms`,
/// with up to 50% random jitter added to spread concurrent retries.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    mut op: F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let attempts = config.max_attempts.max(1);
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() || attempt == attempts => return Err(err),
            Err(err) => {
                let delay = backoff_delay(config, attempt);
                warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
    unreachable!("loop returns on the final attempt")
}

fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let base = config
        .base_delay_ms
        .saturating_mul(1u64 << (attempt - 1).min(16))
        .min(config.max_delay_ms);
    let jitter = if base == 0 {
        0
    } else {
        rand::rng().random_range(0..=base / 2)
    };
    Duration::from_millis(base + jitter)
}
