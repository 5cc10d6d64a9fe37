//! Bounded retry-with-backoff for connection bootstrap.
//!
//! Only the initial connection to the index store retries; timeouts inside
//! a request are surfaced as unavailability and any further retry policy
//! lives with the caller.

use std::time::Duration;

use tracing::warn;

/// Retry policy: fixed attempt count with doubling, capped sleeps.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub attempts: u32,
    pub initial: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
        }
    }
}

/// Run `op` until it succeeds or the attempt budget is exhausted.
///
/// Returns the last error when every attempt fails. Sleeps between
/// attempts, never after the final one.
pub fn with_backoff<T, E, F>(label: &str, policy: &Backoff, mut op: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    let mut delay = policy.initial;
    let mut attempt = 1;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if attempt >= policy.attempts => return Err(e),
            Err(e) => {
                warn!(
                    label = label,
                    attempt = attempt,
                    max_attempts = policy.attempts,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after error: {e}"
                );
                std::thread::sleep(delay);
                delay = (delay * 2).min(policy.max);
                attempt += 1;
            }
        }
    }
}
