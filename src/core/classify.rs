//! Error classification for the retry decision
//!
//! The engine asks an [`ErrorClassifier`] what kind of failure an attempt
//! produced and lets the retry policy act on the answer. Only
//! [`ErrorClass::Transient`] is ever retried.

use crate::types::{StoreError, WalletError};

/// Retry-relevant category of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The wallet does not exist
    NotFound,

    /// Storage contention (deadlock, serialization failure); may succeed on retry
    Transient,

    /// Will not change on retry (business rule, fatal store error, deadline)
    Terminal,

    /// The caller's input was rejected
    Validation,
}

impl ErrorClass {
    /// Whether a failure of this class may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClass::Transient)
    }
}

/// Maps an attempt error to its [`ErrorClass`]
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, error: &WalletError) -> ErrorClass;
}

/// Classifier used by default
///
/// Treats both deadlocks and serialization failures as transient.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl ErrorClassifier for DefaultClassifier {
    fn classify(&self, error: &WalletError) -> ErrorClass {
        match error {
            WalletError::InvalidAmount { .. } | WalletError::InvalidOperation { .. } => {
                ErrorClass::Validation
            }
            WalletError::WalletNotFound { .. } | WalletError::Store(StoreError::NotFound) => {
                ErrorClass::NotFound
            }
            WalletError::Store(StoreError::Deadlock(_))
            | WalletError::Store(StoreError::SerializationFailure(_)) => ErrorClass::Transient,
            WalletError::InsufficientFunds { .. }
            | WalletError::ArithmeticOverflow { .. }
            | WalletError::RetriesExhausted { .. }
            | WalletError::Timeout { .. }
            | WalletError::Cancelled
            | WalletError::Store(StoreError::Backend(_)) => ErrorClass::Terminal,
        }
    }
}
