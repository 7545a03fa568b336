//! Balance mutation engine
//!
//! This module provides the `BalanceEngine` that applies deposits and
//! withdrawals to a wallet under an exclusive row lock and records one audit
//! entry per committed mutation.
//!
//! # Attempt
//!
//! ```text
//! begin ─▶ lock wallet row ─▶ compute new balance ─▶ write balance ─▶ append operation ─▶ commit
//! ```
//!
//! A transient conflict anywhere in the attempt discards the whole
//! transaction (the row lock included) and the attempt is retried per the
//! [`RetryPolicy`]. Every other failure is returned immediately.
//!
//! # Thread Safety
//!
//! The engine holds no mutable state of its own. Serialization of operations
//! on one wallet happens entirely at the store's row lock, so the engine can
//! be cloned and called from any number of tasks at once.

use crate::core::classify::{DefaultClassifier, ErrorClassifier};
use crate::core::retry::{RetryPolicy, RetryState};
use crate::core::traits::{Sleeper, StoreTransaction, TokioSleeper, TransactionalStore};
use crate::types::{
    fits_storage, NewOperation, Operation, OperationType, StoreError, Wallet, WalletError,
    WalletId,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default deadline for one logical call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Retry policy for transient conflicts
    pub retry: RetryPolicy,
    /// Deadline applied when the caller does not supply one
    pub timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Deadline and cancellation signal of one logical call
///
/// When either fires, the in-flight attempt is dropped (rolling back its
/// transaction and releasing its row lock) and no further attempt starts.
#[derive(Debug, Clone)]
pub struct OperationContext {
    timeout: Duration,
    cancel: CancellationToken,
}

impl OperationContext {
    /// Context with a deadline and a fresh cancellation token
    pub fn new(timeout: Duration) -> Self {
        Self::with_cancellation(timeout, CancellationToken::new())
    }

    /// Context with a deadline bound to an existing cancellation token
    pub fn with_cancellation(timeout: Duration, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }

    /// The deadline of this call
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Token that cancels this call
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Applies balance mutations with row locking and bounded retries
pub struct BalanceEngine<S> {
    store: Arc<S>,
    config: EngineConfig,
    classifier: Arc<dyn ErrorClassifier>,
    sleeper: Arc<dyn Sleeper>,
}

impl<S> Clone for BalanceEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            classifier: Arc::clone(&self.classifier),
            sleeper: Arc::clone(&self.sleeper),
        }
    }
}

impl<S: TransactionalStore> BalanceEngine<S> {
    /// Create an engine with the default classifier and the tokio timer
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            classifier: Arc::new(DefaultClassifier),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the error classifier
    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Replace the backoff sleeper
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply a deposit or withdrawal under the default deadline
    ///
    /// # Arguments
    ///
    /// * `wallet_id` - Wallet to mutate
    /// * `operation_type` - `"DEPOSIT"` or `"WITHDRAW"`, as received from the caller
    /// * `amount` - Strictly positive amount
    ///
    /// # Returns
    ///
    /// * `Ok(Operation)` - The committed audit record
    /// * `Err(WalletError::InvalidAmount)` - `amount <= 0`, more than four decimal places,
    ///   or not below `10^16`; no transaction was opened
    /// * `Err(WalletError::InvalidOperation)` - Unknown operation type; no transaction was opened
    /// * `Err(WalletError::WalletNotFound)` - No such wallet
    /// * `Err(WalletError::InsufficientFunds)` - Withdrawal larger than the balance
    /// * `Err(WalletError::RetriesExhausted)` - Every attempt hit a transient conflict
    /// * `Err(WalletError::Timeout)` - The deadline elapsed
    pub async fn apply_operation(
        &self,
        wallet_id: WalletId,
        operation_type: &str,
        amount: Decimal,
    ) -> Result<Operation, WalletError> {
        let ctx = OperationContext::new(self.config.timeout);
        self.apply_operation_with(&ctx, wallet_id, operation_type, amount)
            .await
    }

    /// Apply a deposit or withdrawal under a caller-supplied context
    ///
    /// Same contract as [`apply_operation`](Self::apply_operation), plus
    /// `Err(WalletError::Cancelled)` when the context's token is cancelled.
    pub async fn apply_operation_with(
        &self,
        ctx: &OperationContext,
        wallet_id: WalletId,
        operation_type: &str,
        amount: Decimal,
    ) -> Result<Operation, WalletError> {
        validate_amount(amount)?;
        let operation_type: OperationType = operation_type.parse()?;

        self.execute(ctx, wallet_id, operation_type, amount).await
    }

    /// Deposit `amount` into a wallet
    pub async fn deposit(
        &self,
        wallet_id: WalletId,
        amount: Decimal,
    ) -> Result<Operation, WalletError> {
        validate_amount(amount)?;
        let ctx = OperationContext::new(self.config.timeout);
        self.execute(&ctx, wallet_id, OperationType::Deposit, amount)
            .await
    }

    /// Withdraw `amount` from a wallet
    pub async fn withdraw(
        &self,
        wallet_id: WalletId,
        amount: Decimal,
    ) -> Result<Operation, WalletError> {
        validate_amount(amount)?;
        let ctx = OperationContext::new(self.config.timeout);
        self.execute(&ctx, wallet_id, OperationType::Withdraw, amount)
            .await
    }

    /// Current committed balance of a wallet
    ///
    /// A single non-locking read; never retried.
    pub async fn get_balance(&self, wallet_id: WalletId) -> Result<Decimal, WalletError> {
        self.get_wallet(wallet_id).await.map(|wallet| wallet.balance)
    }

    /// Current committed state of a wallet
    pub async fn get_wallet(&self, wallet_id: WalletId) -> Result<Wallet, WalletError> {
        self.store
            .find_wallet(wallet_id)
            .await
            .map_err(|e| store_error(e, wallet_id))
    }

    /// Run the retry loop under the context's deadline and cancellation token
    async fn execute(
        &self,
        ctx: &OperationContext,
        wallet_id: WalletId,
        operation_type: OperationType,
        amount: Decimal,
    ) -> Result<Operation, WalletError> {
        if ctx.cancel.is_cancelled() {
            return Err(WalletError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                warn!(%wallet_id, %operation_type, "operation cancelled by caller");
                Err(WalletError::Cancelled)
            }
            result = tokio::time::timeout(
                ctx.timeout,
                self.run_with_retry(wallet_id, operation_type, amount),
            ) => match result {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(%wallet_id, %operation_type, timeout = ?ctx.timeout, "operation timed out");
                    Err(WalletError::Timeout { after: ctx.timeout })
                }
            },
        }
    }

    async fn run_with_retry(
        &self,
        wallet_id: WalletId,
        operation_type: OperationType,
        amount: Decimal,
    ) -> Result<Operation, WalletError> {
        let policy = &self.config.retry;
        let mut state = policy.start();

        loop {
            state = match state {
                RetryState::Attempting(attempt) => {
                    debug!(%wallet_id, %operation_type, %amount, attempt, "starting attempt");
                    match self.attempt(wallet_id, operation_type, amount).await {
                        Ok(operation) => {
                            info!(
                                %wallet_id,
                                operation_id = %operation.id,
                                %operation_type,
                                %amount,
                                attempt,
                                "operation committed"
                            );
                            return Ok(operation);
                        }
                        Err(error) => {
                            let class = self.classifier.classify(&error);
                            policy.on_failure(attempt, class, error)
                        }
                    }
                }
                RetryState::Backoff {
                    next_attempt,
                    delay,
                } => {
                    warn!(%wallet_id, next_attempt, ?delay, "transient conflict, backing off");
                    self.sleeper.sleep(delay).await;
                    RetryState::Attempting(next_attempt)
                }
                RetryState::TerminalFailure(error) => {
                    debug!(%wallet_id, %error, "operation failed");
                    return Err(error);
                }
                RetryState::RetriesExhausted {
                    attempts,
                    last_error,
                } => {
                    warn!(%wallet_id, attempts, error = %last_error, "retries exhausted");
                    return Err(WalletError::retries_exhausted(attempts, last_error));
                }
            };
        }
    }

    /// One attempt inside one transaction
    ///
    /// Any early return drops `tx`, which rolls the attempt back. A business
    /// rejection is returned as is even if the explicit rollback fails.
    async fn attempt(
        &self,
        wallet_id: WalletId,
        operation_type: OperationType,
        amount: Decimal,
    ) -> Result<Operation, WalletError> {
        let mut tx = self.store.begin().await?;

        let wallet = tx
            .lock_wallet_for_update(wallet_id)
            .await
            .map_err(|e| store_error(e, wallet_id))?;

        let new_balance = match compute_new_balance(&wallet, operation_type, amount) {
            Ok(balance) => balance,
            Err(error) => {
                if let Err(rollback_error) = tx.rollback().await {
                    warn!(%wallet_id, error = %rollback_error, "rollback failed");
                }
                return Err(error);
            }
        };

        tx.write_balance(wallet_id, new_balance).await?;
        let operation = tx
            .append_operation(NewOperation::new(wallet_id, operation_type, amount))
            .await?;
        tx.commit().await?;

        Ok(operation)
    }
}

/// Amounts must be positive and representable by every store without rounding
fn validate_amount(amount: Decimal) -> Result<(), WalletError> {
    if amount <= Decimal::ZERO || !fits_storage(amount) {
        return Err(WalletError::invalid_amount(amount));
    }
    Ok(())
}

fn store_error(error: StoreError, wallet_id: WalletId) -> WalletError {
    match error {
        StoreError::NotFound => WalletError::wallet_not_found(wallet_id),
        other => WalletError::Store(other),
    }
}

/// Balance after applying one operation to a locked wallet
///
/// A deposit whose result reaches [`amount_limit`](crate::types::amount_limit)
/// is an overflow, the same as one that overflows `Decimal`.
pub fn compute_new_balance(
    wallet: &Wallet,
    operation_type: OperationType,
    amount: Decimal,
) -> Result<Decimal, WalletError> {
    match operation_type {
        OperationType::Deposit => wallet
            .balance
            .checked_add(amount)
            .filter(|balance| fits_storage(*balance))
            .ok_or_else(|| WalletError::arithmetic_overflow("deposit", wallet.id)),
        OperationType::Withdraw => {
            if wallet.balance < amount {
                return Err(WalletError::insufficient_funds(
                    wallet.id,
                    wallet.balance,
                    amount,
                ));
            }
            wallet
                .balance
                .checked_sub(amount)
                .ok_or_else(|| WalletError::arithmetic_overflow("withdraw", wallet.id))
        }
    }
}
