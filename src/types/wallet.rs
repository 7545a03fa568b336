//! Wallet-related types for the wallet engine
//!
//! This module defines the Wallet structure, the balance record that the
//! engine locks and mutates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Wallet identifier
///
/// Assigned at creation and never changed afterwards.
pub type WalletId = Uuid;

/// A balance record owned by the transactional store
///
/// The engine only ever holds a `Wallet` for the duration of one attempt;
/// the store remains the owner of the committed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    /// Unique wallet identifier
    pub id: WalletId,

    /// Current balance
    ///
    /// Never negative in any committed state. Currency-agnostic.
    pub balance: Decimal,

    /// Creation timestamp, immutable
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a new wallet with a fresh identifier and the given opening balance
    ///
    /// # Arguments
    ///
    /// * `balance` - Opening balance; callers are expected to pass a non-negative value
    pub fn new(balance: Decimal) -> Self {
        Self::with_id(Uuid::new_v4(), balance)
    }

    /// Create a wallet with a caller-chosen identifier
    pub fn with_id(id: WalletId, balance: Decimal) -> Self {
        Wallet {
            id,
            balance,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_wallet_gets_unique_id() {
        let a = Wallet::new(Decimal::ZERO);
        let b = Wallet::new(Decimal::ZERO);

        assert_ne!(a.id, b.id);
        assert_eq!(a.balance, Decimal::ZERO);
    }

    #[test]
    fn test_with_id_keeps_identifier() {
        let id = Uuid::new_v4();
        let wallet = Wallet::with_id(id, Decimal::new(1000, 2));

        assert_eq!(wallet.id, id);
        assert_eq!(wallet.balance, Decimal::new(1000, 2));
    }
}
