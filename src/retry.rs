//! Bounded retry with exponential backoff for optimistic store writes.
//!
//! Every status, finalizer, and annotation write in this operator is a
//! compare-and-swap against the object's resource version. Conflicts are
//! expected under concurrent writers and are resolved here by re-running the
//! whole read-modify-write closure against fresh state, with exponential
//! backoff and jitter, up to a fixed attempt budget.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::OperatorError;

/// Backoff configuration for conflict retries.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts before giving up
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on the delay between retries
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each attempt
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A config suitable for tests: same budget, negligible delays.
    pub fn fast() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }
}

/// Run an optimistic write operation, retrying on store conflicts only.
///
/// Non-conflict errors return immediately. When the attempt budget is spent
/// the final conflict is reported as [`OperatorError::ConflictBudgetExhausted`]
/// naming `object`.
pub async fn retry_on_conflict<F, Fut, T>(
    config: &RetryConfig,
    object: &str,
    mut operation: F,
) -> Result<T, OperatorError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, OperatorError>>,
{
    let mut delay = config.initial_delay;

    for attempt in 1..=config.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_conflict() && attempt < config.max_attempts => {
                // Jitter between 0.5x and 1.5x to decorrelate concurrent writers
                let jitter = rand::thread_rng().gen_range(0.5..1.5);
                let jittered = Duration::from_secs_f64(delay.as_secs_f64() * jitter);

                debug!(
                    object = %object,
                    attempt = attempt,
                    delay_ms = jittered.as_millis() as u64,
                    "write conflict, retrying against fresh state"
                );

                tokio::time::sleep(jittered).await;

                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.backoff_multiplier)
                        .min(config.max_delay.as_secs_f64()),
                );
            }
            Err(e) if e.is_conflict() => {
                warn!(object = %object, attempts = config.max_attempts, "conflict budget exhausted");
                return Err(OperatorError::ConflictBudgetExhausted {
                    object: object.to_string(),
                    attempts: config.max_attempts,
                });
            }
            Err(e) => return Err(e),
        }
    }

    // max_attempts is never 0 in practice; treat it as an exhausted budget
    Err(OperatorError::ConflictBudgetExhausted {
        object: object.to_string(),
        attempts: config.max_attempts,
    })
}
