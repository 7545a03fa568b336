//! Retry policy for transient store conflicts
//!
//! A logical call moves through the states of [`RetryState`]:
//!
//! ```text
//! Attempting(n) ──success──────────────▶ (returned to caller)
//!       │
//!       ├──terminal failure────────────▶ TerminalFailure(error)
//!       │
//!       └──transient failure─┬─ n < max ─▶ Backoff { n + 1, base * n } ──▶ Attempting(n + 1)
//!                            └─ n = max ─▶ RetriesExhausted { n, error }
//! ```
//!
//! The policy only decides transitions; waiting out a backoff is the job of
//! the engine's injected [`Sleeper`](crate::core::traits::Sleeper).

use crate::core::classify::ErrorClass;
use std::time::Duration;

/// Default attempt ceiling
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default linear backoff step
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(50);

/// Default cap on a single backoff delay
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1);

/// Retry policy configuration
///
/// Backoff is linear: after failed attempt `n` the engine waits
/// `base_delay * n`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts per logical call, first attempt included
    pub max_attempts: u32,
    /// Linear backoff step
    pub base_delay: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

/// State of one logical call
///
/// The terminal states own the error that ended the call, so the caller
/// always gets the last attempt's failure back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState<E> {
    /// Attempt `n` (1-indexed) is about to run
    Attempting(u32),
    /// Waiting `delay` before attempt `next_attempt`
    Backoff { next_attempt: u32, delay: Duration },
    /// The last attempt failed with a non-retryable error
    TerminalFailure(E),
    /// Every allowed attempt failed with a transient conflict
    RetriesExhausted { attempts: u32, last_error: E },
}

impl RetryPolicy {
    /// Create a policy with linear backoff
    ///
    /// A ceiling of zero is treated as one attempt.
    pub fn linear(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Create a policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(attempt)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Initial state of a logical call
    pub fn start<E>(&self) -> RetryState<E> {
        RetryState::Attempting(1)
    }

    /// Transition after attempt `attempt` failed with `error` of class `class`
    pub fn on_failure<E>(&self, attempt: u32, class: ErrorClass, error: E) -> RetryState<E> {
        if !class.is_retryable() {
            return RetryState::TerminalFailure(error);
        }

        if attempt >= self.max_attempts {
            return RetryState::RetriesExhausted {
                attempts: attempt,
                last_error: error,
            };
        }

        RetryState::Backoff {
            next_attempt: attempt + 1,
            delay: self.delay_for_attempt(attempt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.base_delay, Duration::from_millis(50));
        assert_eq!(policy.start::<()>(), RetryState::Attempting(1));
    }

    #[rstest]
    #[case::first(1, Duration::from_millis(50))]
    #[case::second(2, Duration::from_millis(100))]
    #[case::ninth(9, Duration::from_millis(450))]
    #[case::capped(40, Duration::from_secs(1))]
    fn test_linear_delay(#[case] attempt: u32, #[case] expected: Duration) {
        assert_eq!(RetryPolicy::default().delay_for_attempt(attempt), expected);
    }

    #[rstest]
    #[case::validation(ErrorClass::Validation)]
    #[case::not_found(ErrorClass::NotFound)]
    #[case::terminal(ErrorClass::Terminal)]
    fn test_non_transient_is_terminal(#[case] class: ErrorClass) {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.on_failure(1, class, "boom"),
            RetryState::TerminalFailure("boom")
        );
    }

    #[test]
    fn test_transient_backs_off_linearly() {
        let policy = RetryPolicy::default();

        assert_eq!(
            policy.on_failure(3, ErrorClass::Transient, "deadlock"),
            RetryState::Backoff {
                next_attempt: 4,
                delay: Duration::from_millis(150)
            }
        );
    }

    #[test]
    fn test_transient_on_last_attempt_exhausts() {
        let policy = RetryPolicy::linear(3, Duration::from_millis(10), Duration::from_secs(1));

        assert_eq!(
            policy.on_failure(3, ErrorClass::Transient, "deadlock"),
            RetryState::RetriesExhausted {
                attempts: 3,
                last_error: "deadlock"
            }
        );
    }

    #[test]
    fn test_zero_ceiling_means_single_attempt() {
        let policy = RetryPolicy::linear(0, Duration::from_millis(10), Duration::from_secs(1));

        assert_eq!(policy.max_attempts, 1);
        assert!(matches!(
            policy.on_failure(1, ErrorClass::Transient, ()),
            RetryState::RetriesExhausted { attempts: 1, .. }
        ));
    }

    #[test]
    fn test_no_retry_policy() {
        assert!(matches!(
            RetryPolicy::no_retry().on_failure(1, ErrorClass::Transient, ()),
            RetryState::RetriesExhausted { attempts: 1, .. }
        ));
    }
}
