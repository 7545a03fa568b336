//! Request and response bodies

use crate::types::{Operation, OperationId, OperationType, WalletId};
use chrono::SecondsFormat;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/v1/wallet`
///
/// `operationType` is kept as received so an unknown value surfaces as an
/// invalid operation rather than a malformed body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletOperationRequest {
    pub wallet_id: WalletId,
    pub operation_type: String,
    pub amount: Decimal,
}

/// Committed operation returned by `POST /api/v1/wallet`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletOperationResponse {
    pub operation_id: OperationId,
    pub wallet_id: WalletId,
    pub operation_type: OperationType,
    pub amount: Decimal,
    /// RFC 3339, UTC, second precision
    pub created_at: String,
}

impl From<Operation> for WalletOperationResponse {
    fn from(op: Operation) -> Self {
        Self {
            operation_id: op.id,
            wallet_id: op.wallet_id,
            operation_type: op.operation_type,
            amount: op.amount,
            created_at: op.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Body of `GET /api/v1/wallets/{walletId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetWalletResponse {
    pub wallet_id: WalletId,
    pub balance: Decimal,
}

/// Body of every error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
