//! Operation-related types for the wallet engine
//!
//! This module defines the operation types accepted by the engine and the
//! audit records it appends for every committed balance mutation.

use super::error::WalletError;
use super::wallet::WalletId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Operation identifier
pub type OperationId = Uuid;

/// Balance mutations supported by the engine
///
/// The wire form is upper case (`DEPOSIT`, `WITHDRAW`), matching the column
/// values stored in the `operations` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    /// Credit funds to a wallet
    Deposit,

    /// Debit funds from a wallet
    ///
    /// Requires the locked balance to cover the amount.
    Withdraw,
}

impl OperationType {
    /// The canonical upper-case name used on the wire and in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Deposit => "DEPOSIT",
            OperationType::Withdraw => "WITHDRAW",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = WalletError;

    /// Parse an operation type
    ///
    /// Only the exact upper-case names are accepted; anything else is an
    /// `InvalidOperation`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(OperationType::Deposit),
            "WITHDRAW" => Ok(OperationType::Withdraw),
            other => Err(WalletError::invalid_operation(other)),
        }
    }
}

/// An audit record built by the engine before it is persisted
///
/// Lives only inside one attempt. If the attempt rolls back, the value is
/// dropped together with the transaction and never reaches the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOperation {
    /// Fresh identifier, generated per attempt
    pub id: OperationId,

    /// Wallet the operation mutated
    pub wallet_id: WalletId,

    /// Deposit or withdrawal
    pub operation_type: OperationType,

    /// Strictly positive amount
    pub amount: Decimal,
}

impl NewOperation {
    /// Create a new in-memory operation with a fresh identifier
    pub fn new(wallet_id: WalletId, operation_type: OperationType, amount: Decimal) -> Self {
        NewOperation {
            id: Uuid::new_v4(),
            wallet_id,
            operation_type,
            amount,
        }
    }

    /// Attach the persistence timestamp assigned by the store
    pub fn persisted_at(self, created_at: DateTime<Utc>) -> Operation {
        Operation {
            id: self.id,
            wallet_id: self.wallet_id,
            operation_type: self.operation_type,
            amount: self.amount,
            created_at,
        }
    }
}

/// A persisted, immutable audit record
///
/// Append-only: nothing in this crate updates or deletes an `Operation`
/// once it has been stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// Operation identifier
    pub id: OperationId,

    /// Wallet the operation mutated
    pub wallet_id: WalletId,

    /// Deposit or withdrawal
    pub operation_type: OperationType,

    /// Strictly positive amount
    pub amount: Decimal,

    /// Set by the store at persistence time
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::deposit("DEPOSIT", OperationType::Deposit)]
    #[case::withdraw("WITHDRAW", OperationType::Withdraw)]
    fn test_parse_valid_operation_type(#[case] input: &str, #[case] expected: OperationType) {
        assert_eq!(input.parse::<OperationType>().unwrap(), expected);
        assert_eq!(expected.as_str(), input);
    }

    #[rstest]
    #[case::unknown("FOO")]
    #[case::lowercase("deposit")]
    #[case::empty("")]
    #[case::withdrawal_spelling("WITHDRAWAL")]
    fn test_parse_invalid_operation_type(#[case] input: &str) {
        let err = input.parse::<OperationType>().unwrap_err();
        assert_eq!(err, WalletError::invalid_operation(input));
    }

    #[test]
    fn test_operation_type_serializes_upper_case() {
        let json = serde_json::to_string(&OperationType::Withdraw).unwrap();
        assert_eq!(json, "\"WITHDRAW\"");
    }

    #[test]
    fn test_persisted_at_keeps_fields() {
        let wallet_id = Uuid::new_v4();
        let pending = NewOperation::new(wallet_id, OperationType::Deposit, Decimal::new(500, 2));
        let id = pending.id;
        let now = Utc::now();

        let op = pending.persisted_at(now);

        assert_eq!(op.id, id);
        assert_eq!(op.wallet_id, wallet_id);
        assert_eq!(op.operation_type, OperationType::Deposit);
        assert_eq!(op.amount, Decimal::new(500, 2));
        assert_eq!(op.created_at, now);
    }
}
