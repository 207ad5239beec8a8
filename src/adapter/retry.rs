//! Retry decisions for transport failures.

use log::{debug, warn};

use crate::error::TransportError;

/// Decides whether a failed attempt gets another try.
///
/// Only DNS and socket failures are retried, immediately and without
/// backoff, until `max_attempts` attempts have been made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// `attempt` is the 1-based number of the attempt that just failed.
    pub fn should_retry(&self, error: &TransportError, attempt: u32) -> bool {
        if !error.is_transient() {
            debug!("non-retryable error on attempt {}: {}", attempt, error);
            return false;
        }

        if attempt >= self.max_attempts {
            debug!(
                "giving up after {}/{} attempts: {}",
                attempt, self.max_attempts, error
            );
            return false;
        }

        warn!(
            "attempt {}/{} failed ({}), retrying...",
            attempt, self.max_attempts, error
        );
        true
    }
}
