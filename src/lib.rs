//! Wallet Balance Engine Library
//! # Overview
//!
//! This library applies deposits and withdrawals to wallet balances under
//! concurrent load. Every mutation runs in its own store transaction with an
//! exclusive lock on the wallet row, and transient lock conflicts are retried
//! with bounded linear backoff.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Wallet, Operation, errors)
//! - [`core`] - Business logic components:
//!   - [`core::engine`] - Balance mutation orchestration
//!   - [`core::retry`] - Retry policy and per-call state machine
//!   - [`core::classify`] - Retry classification of attempt errors
//!   - [`core::traits`] - Store and backoff abstractions
//! - [`store`] - In-memory and PostgreSQL stores
//! - [`api`] - HTTP boundary
//! - [`cli`], [`config`], [`telemetry`] - Process setup
//!
//! # Operation Types
//!
//! - **DEPOSIT**: Credit funds to a wallet
//! - **WITHDRAW**: Debit funds from a wallet (requires a sufficient balance)
//!
//! # Guarantees
//!
//! - A balance never goes negative
//! - Each committed mutation produces exactly one audit record, and a failed
//!   attempt leaves neither a balance change nor a record behind
//! - Concurrent mutations of one wallet are serialized; the final balance
//!   equals the initial balance plus the sum of the committed operations
//! - Amounts and balances carry at most 4 decimal places and stay below
//!   10^16, so every store records exactly the requested values

pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod store;
pub mod telemetry;
pub mod types;

pub use crate::core::{BalanceEngine, EngineConfig, OperationContext, RetryPolicy};
pub use store::{InMemoryStore, PgStore};
pub use types::{
    NewOperation, Operation, OperationId, OperationType, StoreError, Wallet, WalletError,
    WalletId,
};
