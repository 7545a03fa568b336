//! HTTP boundary
//!
//! Exposes the engine over two JSON endpoints:
//!
//! | Method | Path                         | Handler                      |
//! |--------|------------------------------|------------------------------|
//! | GET    | `/api/v1/wallets/{walletId}` | [`handlers::get_wallet_balance`] |
//! | POST   | `/api/v1/wallet`             | [`handlers::update_wallet_balance`] |

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;

use crate::core::engine::BalanceEngine;

/// Shared state of every request handler
pub struct AppState<S> {
    pub engine: BalanceEngine<S>,
}

impl<S> AppState<S> {
    pub fn new(engine: BalanceEngine<S>) -> Self {
        Self { engine }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}
