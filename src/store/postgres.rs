//! PostgreSQL transactional store
//!
//! `PgStore` maps the store traits onto a `sqlx` connection pool. Each engine
//! attempt runs in its own database transaction; the wallet row is locked
//! with `SELECT ... FOR UPDATE` and released by `COMMIT` or `ROLLBACK`.
//!
//! Database errors are classified by SQLSTATE:
//!
//! | SQLSTATE | Meaning               | `StoreError`           |
//! |----------|-----------------------|------------------------|
//! | `40P01`  | deadlock detected     | `Deadlock`             |
//! | `40001`  | serialization failure | `SerializationFailure` |
//! | other    |                       | `Backend`              |

use crate::config::mask_url;
use crate::core::traits::{StoreTransaction, TransactionalStore};
use crate::types::amount::amount_column_type;
use crate::types::{
    fits_storage, NewOperation, Operation, OperationType, StoreError, Wallet, WalletId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// SQLSTATE raised when PostgreSQL aborts a deadlock victim
pub const SQLSTATE_DEADLOCK: &str = "40P01";

/// SQLSTATE raised when a transaction cannot be serialized
pub const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

fn create_wallets_sql() -> String {
    format!(
        r#"
    CREATE TABLE IF NOT EXISTS wallets (
        id UUID PRIMARY KEY,
        balance {} NOT NULL DEFAULT 0 CHECK (balance >= 0),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#,
        amount_column_type()
    )
}

fn create_operations_sql() -> String {
    format!(
        r#"
    CREATE TABLE IF NOT EXISTS operations (
        id UUID PRIMARY KEY,
        wallet_id UUID NOT NULL REFERENCES wallets (id),
        type VARCHAR(10) NOT NULL,
        amount {} NOT NULL CHECK (amount > 0),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#,
        amount_column_type()
    )
}

const CREATE_OPERATIONS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_operations_wallet_id ON operations (wallet_id)";

/// Map a SQLSTATE code to a store error
pub fn classify_sqlstate(code: Option<&str>, message: impl Into<String>) -> StoreError {
    match code {
        Some(SQLSTATE_DEADLOCK) => StoreError::Deadlock(message.into()),
        Some(SQLSTATE_SERIALIZATION_FAILURE) => StoreError::SerializationFailure(message.into()),
        _ => StoreError::Backend(message.into()),
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.into_owned());
                classify_sqlstate(code.as_deref(), db.message())
            }
            other => StoreError::backend(other.to_string()),
        }
    }
}

#[derive(Debug, FromRow)]
struct WalletRow {
    id: Uuid,
    balance: Decimal,
    created_at: DateTime<Utc>,
}

impl From<WalletRow> for Wallet {
    fn from(row: WalletRow) -> Self {
        Wallet {
            id: row.id,
            balance: row.balance,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct OperationRow {
    id: Uuid,
    wallet_id: Uuid,
    #[sqlx(rename = "type")]
    operation_type: String,
    amount: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<OperationRow> for Operation {
    type Error = StoreError;

    fn try_from(row: OperationRow) -> Result<Self, Self::Error> {
        let operation_type: OperationType = row
            .operation_type
            .parse()
            .map_err(|e| StoreError::backend(format!("corrupt operation {}: {}", row.id, e)))?;

        Ok(Operation {
            id: row.id,
            wallet_id: row.wallet_id,
            operation_type,
            amount: row.amount,
            created_at: row.created_at,
        })
    }
}

/// PostgreSQL implementation of [`TransactionalStore`]
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        info!("Connecting to PostgreSQL: {}", mask_url(database_url));

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::backend(format!("PostgreSQL: {}", e)))?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// The underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the wallets and operations tables if they are missing
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let statements = [
            create_wallets_sql(),
            create_operations_sql(),
            CREATE_OPERATIONS_INDEX.to_string(),
        ];
        for statement in &statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema ready");
        Ok(())
    }

    /// Insert a wallet, keeping the existing row if the id is taken
    ///
    /// A balance the column cannot hold exactly is refused rather than rounded.
    pub async fn create_wallet(
        &self,
        wallet_id: WalletId,
        balance: Decimal,
    ) -> Result<Wallet, StoreError> {
        if balance < Decimal::ZERO || !fits_storage(balance) {
            return Err(StoreError::backend(format!(
                "balance {} does not fit {}",
                balance,
                amount_column_type()
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO wallets (id, balance)
            VALUES ($1, $2)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(wallet_id)
        .bind(balance)
        .execute(&self.pool)
        .await?;

        self.find_wallet(wallet_id).await
    }

    /// Every committed audit record for a wallet, oldest first
    pub async fn operations_for(&self, wallet_id: WalletId) -> Result<Vec<Operation>, StoreError> {
        let rows = sqlx::query_as::<_, OperationRow>(
            r#"
            SELECT id, wallet_id, type, amount, created_at
            FROM operations
            WHERE wallet_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(wallet_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Operation::try_from).collect()
    }
}

#[async_trait]
impl TransactionalStore for PgStore {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgTransaction { tx })
    }

    async fn find_wallet(&self, wallet_id: WalletId) -> Result<Wallet, StoreError> {
        sqlx::query_as::<_, WalletRow>(
            "SELECT id, balance, created_at FROM wallets WHERE id = $1",
        )
        .bind(wallet_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Wallet::from)
        .ok_or(StoreError::NotFound)
    }
}

/// Transaction scope of a [`PgStore`]
///
/// Dropping it without committing returns the connection to the pool, where
/// sqlx issues the `ROLLBACK`.
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn lock_wallet_for_update(&mut self, wallet_id: WalletId) -> Result<Wallet, StoreError> {
        sqlx::query_as::<_, WalletRow>(
            "SELECT id, balance, created_at FROM wallets WHERE id = $1 FOR UPDATE",
        )
        .bind(wallet_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Wallet::from)
        .ok_or(StoreError::NotFound)
    }

    async fn write_balance(
        &mut self,
        wallet_id: WalletId,
        new_balance: Decimal,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE wallets SET balance = $2 WHERE id = $1")
            .bind(wallet_id)
            .bind(new_balance)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn append_operation(
        &mut self,
        operation: NewOperation,
    ) -> Result<Operation, StoreError> {
        let row = sqlx::query_as::<_, OperationRow>(
            r#"
            INSERT INTO operations (id, wallet_id, type, amount)
            VALUES ($1, $2, $3, $4)
            RETURNING id, wallet_id, type, amount, created_at
            "#,
        )
        .bind(operation.id)
        .bind(operation.wallet_id)
        .bind(operation.operation_type.as_str())
        .bind(operation.amount)
        .fetch_one(&mut *self.tx)
        .await?;

        Operation::try_from(row)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
