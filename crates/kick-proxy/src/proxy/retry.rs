//! Linear retry-with-backoff shared by the bypass fetch and the dispatch loop.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Attempt budget and linear backoff step.
///
/// The delay after attempt `n` (1-based) is `step * n`; nothing is slept
/// after the last attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub attempts: u32,
    pub step: Duration,
}

impl Backoff {
    pub fn new(attempts: u32, step: Duration) -> Self {
        Self { attempts, step }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.step * attempt
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Returned when no attempt succeeded.
#[derive(Debug)]
pub struct RetryError<E> {
    pub attempts: u32,
    /// Error of the final attempt; `None` only when the budget was zero.
    pub last: Option<E>,
}

impl<E: Display> Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.last {
            Some(e) => write!(f, "{e}"),
            None => write!(f, "no attempts made"),
        }
    }
}

/// Run `op` until it succeeds or the budget is spent.
///
/// `op` receives the 1-based attempt number. Failures are logged here with
/// the caller's `label`, so callers only log what is specific to them.
pub async fn retry_with_backoff<T, E, F, Fut>(
    backoff: &Backoff,
    label: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last = None;

    for attempt in 1..=backoff.attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(
                    attempt = attempt,
                    max_attempts = backoff.attempts,
                    error = %e,
                    "{label} attempt {attempt}/{} failed",
                    backoff.attempts
                );
                last = Some(e);
            }
        }

        if attempt < backoff.attempts {
            tokio::time::sleep(backoff.delay_for_attempt(attempt)).await;
        }
    }

    Err(RetryError {
        attempts: backoff.attempts,
        last,
    })
}
