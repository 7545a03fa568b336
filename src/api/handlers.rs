//! Request handlers

use super::dto::{GetWalletResponse, WalletOperationRequest, WalletOperationResponse};
use super::{ApiError, ApiResult, AppState};
use crate::core::traits::TransactionalStore;
use crate::types::WalletId;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

/// `GET /api/v1/wallets/{walletId}`
pub async fn get_wallet_balance<S: TransactionalStore>(
    State(state): State<AppState<S>>,
    Path(wallet_id): Path<String>,
) -> ApiResult<Json<GetWalletResponse>> {
    let wallet_id = WalletId::parse_str(&wallet_id).map_err(|_| ApiError::InvalidWalletId)?;

    let balance = state.engine.get_balance(wallet_id).await?;

    Ok(Json(GetWalletResponse { wallet_id, balance }))
}

/// `POST /api/v1/wallet`
///
/// Runs under the engine's configured deadline.
pub async fn update_wallet_balance<S: TransactionalStore>(
    State(state): State<AppState<S>>,
    body: Result<Json<WalletOperationRequest>, JsonRejection>,
) -> ApiResult<Json<WalletOperationResponse>> {
    let Json(request) = body.map_err(|_| ApiError::InvalidRequestBody)?;

    let operation = state
        .engine
        .apply_operation(request.wallet_id, &request.operation_type, request.amount)
        .await?;

    Ok(Json(operation.into()))
}
