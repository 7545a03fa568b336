//! Router construction

use super::handlers::{get_wallet_balance, update_wallet_balance};
use super::AppState;
use crate::core::traits::TransactionalStore;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Build the application router over any store
pub fn create_router<S: TransactionalStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/api/v1/wallets/:wallet_id", get(get_wallet_balance::<S>))
        .route("/api/v1/wallet", post(update_wallet_balance::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
