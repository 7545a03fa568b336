//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `amount`: precision and range limits of stored amounts
//! - `wallet`: the balance record
//! - `operation`: operation types and audit records
//! - `error`: error types for the engine and the stores

pub mod amount;
pub mod error;
pub mod operation;
pub mod wallet;

pub use amount::{amount_limit, fits_storage, AMOUNT_PRECISION, AMOUNT_SCALE};
pub use error::{StoreError, WalletError};
pub use operation::{NewOperation, Operation, OperationId, OperationType};
pub use wallet::{Wallet, WalletId};
