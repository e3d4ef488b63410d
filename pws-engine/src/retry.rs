//! Re-invocation policy for failed passes.
//!
//! The engine never waits or retries on its own; whoever schedules
//! passes asks this policy when to run the next one.

use std::time::Duration;

use crate::error::ReconcileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Run the pass again after the given delay.
    Requeue(Duration),
    /// Retrying cannot help; surface the error to an operator.
    Abandon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound for the exponential backoff.
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(300), // 5 minutes
        }
    }
}

impl RetryPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// `attempt` counts the failed passes so far, starting at 1.
    ///
    /// Conflicts only need a fresh read, so they always requeue after
    /// `base`; other retryable failures back off exponentially.
    pub fn decide(&self, error: &ReconcileError, attempt: u32) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::Abandon;
        }
        if error.is_conflict() {
            return RetryDecision::Requeue(self.base.min(self.max));
        }

        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max);
        RetryDecision::Requeue(delay)
    }
}
