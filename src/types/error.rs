//! Error types for the wallet engine
//!
//! This module defines every error the engine can return and every failure a
//! transactional store can report.
//!
//! # Error Categories
//!
//! - **Validation**: invalid amount, unknown operation type. Never retried.
//! - **Not found**: the wallet does not exist. Never retried.
//! - **Business conflict**: insufficient funds, arithmetic overflow. Never retried.
//! - **Transient store conflict**: deadlock, serialization failure. Retried with backoff.
//! - **Fatal store error**: anything else the store reports. Never retried.
//! - **Deadline**: the caller's timeout elapsed or its token was cancelled.

use super::wallet::WalletId;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a transactional store
///
/// Stores translate their native errors into one of these variants so the
/// engine's retry decision never depends on a concrete backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The requested row does not exist
    #[error("Record not found")]
    NotFound,

    /// Two transactions waited on each other's locks; one was aborted
    #[error("Deadlock detected: {0}")]
    Deadlock(String),

    /// The transaction could not be serialized against a concurrent one
    #[error("Serialization failure: {0}")]
    SerializationFailure(String),

    /// Any other store failure (connection loss, constraint violation, ...)
    #[error("Store error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a Backend error
    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend(message.into())
    }

    /// Create a Deadlock error
    pub fn deadlock(message: impl Into<String>) -> Self {
        StoreError::Deadlock(message.into())
    }

    /// Create a SerializationFailure error
    pub fn serialization_failure(message: impl Into<String>) -> Self {
        StoreError::SerializationFailure(message.into())
    }
}

/// Main error type for the wallet engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WalletError {
    /// Amount was zero or negative, or cannot be stored exactly
    ///
    /// Detected before any transaction is opened.
    #[error("Amount must be positive with at most 4 decimal places and below 10^16, got {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// Operation type is not one of DEPOSIT or WITHDRAW
    #[error("Invalid operation type '{operation_type}'")]
    InvalidOperation {
        /// The rejected operation type, as received
        operation_type: String,
    },

    /// No wallet exists with the given identifier
    #[error("Wallet {wallet_id} not found")]
    WalletNotFound {
        /// The wallet that was looked up
        wallet_id: WalletId,
    },

    /// Withdrawal larger than the locked balance
    ///
    /// Deterministic given the balance, so it is never retried.
    #[error("Insufficient funds in wallet {wallet_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Wallet ID
        wallet_id: WalletId,
        /// Balance observed under the row lock
        balance: Decimal,
        /// Requested withdrawal amount
        requested: Decimal,
    },

    /// Deposit would overflow the decimal range
    #[error("Arithmetic overflow in {operation} for wallet {wallet_id}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Wallet ID
        wallet_id: WalletId,
    },

    /// Every allowed attempt ended in a transient conflict
    ///
    /// Carries the error of the final attempt.
    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error reported by the last attempt
        last_error: Box<WalletError>,
    },

    /// The caller's deadline elapsed before the call completed
    #[error("Operation timed out after {after:?}")]
    Timeout {
        /// The deadline that elapsed
        after: Duration,
    },

    /// The caller cancelled the call
    #[error("Operation cancelled")]
    Cancelled,

    /// Store failure that is not a transient conflict
    #[error(transparent)]
    Store(#[from] StoreError),
}

// Helper functions for creating common errors

impl WalletError {
    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Decimal) -> Self {
        WalletError::InvalidAmount { amount }
    }

    /// Create an InvalidOperation error
    pub fn invalid_operation(operation_type: &str) -> Self {
        WalletError::InvalidOperation {
            operation_type: operation_type.to_string(),
        }
    }

    /// Create a WalletNotFound error
    pub fn wallet_not_found(wallet_id: WalletId) -> Self {
        WalletError::WalletNotFound { wallet_id }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(wallet_id: WalletId, balance: Decimal, requested: Decimal) -> Self {
        WalletError::InsufficientFunds {
            wallet_id,
            balance,
            requested,
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, wallet_id: WalletId) -> Self {
        WalletError::ArithmeticOverflow {
            operation: operation.to_string(),
            wallet_id,
        }
    }

    /// Create a RetriesExhausted error wrapping the last attempt's error
    pub fn retries_exhausted(attempts: u32, last_error: WalletError) -> Self {
        WalletError::RetriesExhausted {
            attempts,
            last_error: Box::new(last_error),
        }
    }
}
