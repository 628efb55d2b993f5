// ABOUTME: Bounded, cancellable retry around an arbitrary unit of work
// ABOUTME: Computes fixed, exponential, and linear backoff delays between attempts

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::{EngineError, Result};
use crate::parser::{RetryConfig, RetryStrategy};

/// Coefficient applied by the linear backoff strategy.
const LINEAR_BACKOFF_RATE: f64 = 1.5;

pub struct RetryCoordinator;

impl RetryCoordinator {
    /// Execute `op` with up to `retry_count` retries after the first failed
    /// attempt. The attempt counter is written through `retries` before every
    /// attempt, so it reflects the attempts made even on final failure.
    ///
    /// Cancellation is checked before the first attempt and during every
    /// backoff wait; a fired token fails with `Interrupted` without consuming
    /// a retry attempt. An exhausted budget re-raises the last underlying
    /// failure unchanged.
    pub async fn execute<T, F, Fut>(
        config: &RetryConfig,
        cancel: &CancellationToken,
        retries: &mut u32,
        should_retry: Option<&(dyn Fn(&EngineError) -> bool + Sync)>,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if cancel.is_cancelled() {
            return Err(EngineError::Interrupted);
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            *retries = attempt;

            let error = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let retryable = error.is_retryable()
                && should_retry.map_or(true, |predicate| predicate(&error));
            if !retryable || attempt > config.retry_count {
                return Err(error);
            }

            let delay = Self::delay_for(config, attempt);
            warn!(
                "Attempt {} failed ({}), retrying after {:?}",
                attempt, error, delay
            );

            tokio::select! {
                _ = sleep(delay) => {}
                _ = cancel.cancelled() => {
                    debug!("Cancellation fired during backoff wait");
                    return Err(EngineError::Interrupted);
                }
            }
        }
    }

    /// Delay to wait after a failed attempt, attempts numbered from 1.
    pub fn delay_for(config: &RetryConfig, attempt: u32) -> Duration {
        let base = config.retry_delay_seconds.max(0.0);
        let seconds = match config.retry_strategy {
            RetryStrategy::Fixed => base,
            RetryStrategy::ExponentialBackoff => base * 2f64.powi(attempt as i32),
            RetryStrategy::LinearBackoff => base * LINEAR_BACKOFF_RATE * attempt as f64,
        };
        Duration::from_secs_f64(seconds)
    }
}
