//! Thread-safe in-memory transactional store
//!
//! This module provides `InMemoryStore`, a [`TransactionalStore`] that keeps
//! wallets and audit records in process memory.
//!
//! # Design
//!
//! Committed wallet state lives in a `DashMap`, so the read path never waits
//! on a writer. Each wallet also owns an async row lock; a transaction holds
//! the lock through an `OwnedMutexGuard` from `lock_wallet_for_update` until
//! it commits, rolls back, or is dropped. Writes are buffered in the
//! transaction and only reach the committed maps on commit, which gives the
//! all-or-nothing behaviour of a database transaction.
//!
//! # Fault Injection
//!
//! Tests can make any stage of a transaction fail, either for the next *k*
//! occurrences or permanently, to exercise the engine's retry path without a
//! real database. The store also counts begun transactions, which equals the
//! number of attempts the engine made.

use crate::core::traits::{StoreTransaction, TransactionalStore};
use crate::types::amount::amount_column_type;
use crate::types::{
    fits_storage, NewOperation, Operation, OperationId, StoreError, Wallet, WalletId,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Stage of a transaction at which a fault can be injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultStage {
    /// `lock_wallet_for_update`
    Lock,
    /// `write_balance`
    WriteBalance,
    /// `append_operation`
    AppendOperation,
    /// `commit`
    Commit,
    /// `rollback`
    Rollback,
}

#[derive(Debug, Clone)]
struct FaultRule {
    error: StoreError,
    /// `None` fails forever
    remaining: Option<u32>,
}

#[derive(Debug, Default)]
struct StoreState {
    wallets: DashMap<WalletId, Wallet>,
    row_locks: DashMap<WalletId, Arc<Mutex<()>>>,
    operations: DashMap<OperationId, Operation>,
    faults: DashMap<FaultStage, FaultRule>,
    transactions_begun: AtomicU64,
    commits: AtomicU64,
}

impl StoreState {
    fn take_fault(&self, stage: FaultStage) -> Result<(), StoreError> {
        // Decrement and removal happen under one shard lock
        match self.faults.entry(stage) {
            Entry::Vacant(_) => Ok(()),
            Entry::Occupied(mut entry) => {
                let error = entry.get().error.clone();
                let exhausted = match entry.get_mut().remaining.as_mut() {
                    Some(remaining) => {
                        *remaining = remaining.saturating_sub(1);
                        *remaining == 0
                    }
                    None => false,
                };
                if exhausted {
                    entry.remove();
                }
                Err(error)
            }
        }
    }
}

/// In-memory implementation of [`TransactionalStore`]
///
/// Cheap to clone; clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<StoreState>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a wallet with a fresh identifier and the given opening balance
    pub fn create_wallet(&self, balance: Decimal) -> Wallet {
        let wallet = Wallet::new(balance);
        self.insert_wallet(wallet.clone());
        wallet
    }

    /// Insert (or replace) a wallet with a caller-chosen identifier
    pub fn insert_wallet(&self, wallet: Wallet) {
        self.state
            .row_locks
            .entry(wallet.id)
            .or_insert_with(|| Arc::new(Mutex::new(())));
        self.state.wallets.insert(wallet.id, wallet);
    }

    /// Committed state of a wallet, if it exists
    pub fn wallet(&self, wallet_id: WalletId) -> Option<Wallet> {
        self.state
            .wallets
            .get(&wallet_id)
            .map(|entry| entry.value().clone())
    }

    /// Every committed audit record for a wallet, oldest first
    ///
    /// Not a snapshot taken together with the balance. A commit publishes the
    /// new balance before its audit record, so an operation seen here is
    /// always already reflected in [`wallet`](Self::wallet).
    pub fn operations_for(&self, wallet_id: WalletId) -> Vec<Operation> {
        let mut operations: Vec<Operation> = self
            .state
            .operations
            .iter()
            .filter(|entry| entry.value().wallet_id == wallet_id)
            .map(|entry| entry.value().clone())
            .collect();
        operations.sort_by_key(|op| op.created_at);
        operations
    }

    /// Total number of committed audit records
    pub fn operation_count(&self) -> usize {
        self.state.operations.len()
    }

    /// Number of transactions opened so far
    pub fn transactions_begun(&self) -> u64 {
        self.state.transactions_begun.load(Ordering::SeqCst)
    }

    /// Number of transactions committed so far
    pub fn commits(&self) -> u64 {
        self.state.commits.load(Ordering::SeqCst)
    }

    /// Fail the next `times` occurrences of `stage` with `error`
    pub fn fail_next(&self, stage: FaultStage, error: StoreError, times: u32) {
        if times == 0 {
            return;
        }
        self.state.faults.insert(
            stage,
            FaultRule {
                error,
                remaining: Some(times),
            },
        );
    }

    /// Fail every occurrence of `stage` with `error` until cleared
    pub fn fail_always(&self, stage: FaultStage, error: StoreError) {
        self.state.faults.insert(
            stage,
            FaultRule {
                error,
                remaining: None,
            },
        );
    }

    /// Remove every injected fault
    pub fn clear_faults(&self) {
        self.state.faults.clear();
    }
}

#[async_trait]
impl TransactionalStore for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        self.state.transactions_begun.fetch_add(1, Ordering::SeqCst);
        Ok(InMemoryTransaction {
            state: Arc::clone(&self.state),
            locked: None,
            pending_operations: Vec::new(),
        })
    }

    async fn find_wallet(&self, wallet_id: WalletId) -> Result<Wallet, StoreError> {
        self.wallet(wallet_id).ok_or(StoreError::NotFound)
    }
}

/// Wallet row held under an exclusive lock
#[derive(Debug)]
struct LockedRow {
    snapshot: Wallet,
    pending_balance: Option<Decimal>,
    _guard: OwnedMutexGuard<()>,
}

impl LockedRow {
    fn current(&self) -> Wallet {
        let mut wallet = self.snapshot.clone();
        if let Some(balance) = self.pending_balance {
            wallet.balance = balance;
        }
        wallet
    }
}

/// Transaction scope of an [`InMemoryStore`]
///
/// Holds at most one wallet row lock. Dropping it discards buffered writes
/// and releases the lock.
#[derive(Debug)]
pub struct InMemoryTransaction {
    state: Arc<StoreState>,
    locked: Option<LockedRow>,
    pending_operations: Vec<Operation>,
}

impl InMemoryTransaction {
    fn locked_row(&mut self, wallet_id: WalletId) -> Result<&mut LockedRow, StoreError> {
        match self.locked.as_mut() {
            Some(row) if row.snapshot.id == wallet_id => Ok(row),
            _ => Err(StoreError::backend(format!(
                "wallet {} is not locked by this transaction",
                wallet_id
            ))),
        }
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn lock_wallet_for_update(&mut self, wallet_id: WalletId) -> Result<Wallet, StoreError> {
        self.state.take_fault(FaultStage::Lock)?;

        if let Some(row) = self.locked.as_ref() {
            if row.snapshot.id == wallet_id {
                return Ok(row.current());
            }
            return Err(StoreError::backend(format!(
                "transaction already holds the lock on wallet {}",
                row.snapshot.id
            )));
        }

        let row_lock = self
            .state
            .row_locks
            .get(&wallet_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(StoreError::NotFound)?;

        let guard = row_lock.lock_owned().await;

        let snapshot = self
            .state
            .wallets
            .get(&wallet_id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound)?;

        let wallet = snapshot.clone();
        self.locked = Some(LockedRow {
            snapshot,
            pending_balance: None,
            _guard: guard,
        });

        Ok(wallet)
    }

    async fn write_balance(
        &mut self,
        wallet_id: WalletId,
        new_balance: Decimal,
    ) -> Result<(), StoreError> {
        self.state.take_fault(FaultStage::WriteBalance)?;

        if new_balance < Decimal::ZERO {
            return Err(StoreError::backend(format!(
                "balance check violated for wallet {}: {}",
                wallet_id, new_balance
            )));
        }
        if !fits_storage(new_balance) {
            return Err(StoreError::backend(format!(
                "balance {} of wallet {} does not fit {}",
                new_balance,
                wallet_id,
                amount_column_type()
            )));
        }

        let row = self.locked_row(wallet_id)?;
        row.pending_balance = Some(new_balance);
        Ok(())
    }

    async fn append_operation(
        &mut self,
        operation: NewOperation,
    ) -> Result<Operation, StoreError> {
        self.state.take_fault(FaultStage::AppendOperation)?;

        if !self.state.wallets.contains_key(&operation.wallet_id) {
            return Err(StoreError::backend(format!(
                "operation references unknown wallet {}",
                operation.wallet_id
            )));
        }
        if operation.amount <= Decimal::ZERO {
            return Err(StoreError::backend(format!(
                "amount check violated for operation {}: {}",
                operation.id, operation.amount
            )));
        }
        if !fits_storage(operation.amount) {
            return Err(StoreError::backend(format!(
                "amount {} of operation {} does not fit {}",
                operation.amount,
                operation.id,
                amount_column_type()
            )));
        }

        let stored = operation.persisted_at(Utc::now());
        self.pending_operations.push(stored.clone());
        Ok(stored)
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        self.state.take_fault(FaultStage::Commit)?;

        // Balance first, then audit records, then the row lock
        let row = self.locked.take();
        if let Some(row) = row.as_ref() {
            if let Some(balance) = row.pending_balance {
                if let Some(mut wallet) = self.state.wallets.get_mut(&row.snapshot.id) {
                    wallet.balance = balance;
                }
            }
        }

        for operation in self.pending_operations.drain(..) {
            self.state.operations.insert(operation.id, operation);
        }
        drop(row);

        self.state.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        // The row lock is released when `self` drops, fault or not
        self.state.take_fault(FaultStage::Rollback)
    }
}
