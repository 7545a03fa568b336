//! Core traits for transactional storage and backoff
//!
//! This module defines the capability traits the engine is written against.
//! The in-memory store and the PostgreSQL store both implement
//! [`TransactionalStore`], so the engine and its tests never depend on a
//! concrete backend.

use crate::types::{NewOperation, Operation, StoreError, Wallet, WalletId};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;

/// A store that hands out all-or-nothing units of work
///
/// Implementations must classify every failure they raise into one of the
/// [`StoreError`] variants: `NotFound`, a transient conflict (`Deadlock`,
/// `SerializationFailure`), or `Backend`.
#[async_trait]
pub trait TransactionalStore: Send + Sync + 'static {
    /// Transaction scope produced by [`begin`](Self::begin)
    type Tx: StoreTransaction;

    /// Open an isolated unit of work
    ///
    /// Every call made during one attempt goes through the returned scope.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Read a committed wallet without taking any lock
    ///
    /// Returns `StoreError::NotFound` for unknown identifiers.
    async fn find_wallet(&self, wallet_id: WalletId) -> Result<Wallet, StoreError>;
}

/// One unit of work inside a [`TransactionalStore`]
///
/// Dropping a transaction without calling [`commit`](Self::commit) discards
/// every write made through it and releases any row lock it holds.
#[async_trait]
pub trait StoreTransaction: Send + Sized {
    /// Take an exclusive lock on the wallet row and return its current state
    ///
    /// Blocks until the lock is granted. Returns `StoreError::NotFound` if the
    /// wallet does not exist.
    async fn lock_wallet_for_update(&mut self, wallet_id: WalletId) -> Result<Wallet, StoreError>;

    /// Overwrite the balance of a wallet locked by this transaction
    async fn write_balance(
        &mut self,
        wallet_id: WalletId,
        new_balance: Decimal,
    ) -> Result<(), StoreError>;

    /// Append an audit record in this transaction
    ///
    /// Returns the record with the timestamp assigned by the store.
    async fn append_operation(&mut self, operation: NewOperation)
        -> Result<Operation, StoreError>;

    /// Make every write of this transaction durable and release its locks
    async fn commit(self) -> Result<(), StoreError>;

    /// Discard every write of this transaction and release its locks
    async fn rollback(self) -> Result<(), StoreError>;
}

/// Waits out a backoff delay
///
/// Injected into the engine so retry tests can run without wall-clock delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend the caller for `delay`
    async fn sleep(&self, delay: Duration);
}

/// [`Sleeper`] backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}
