//! API error handling
//!
//! Maps engine errors onto HTTP status codes. Anything the client cannot act
//! on is logged and reported as a bare 500.

use super::dto::ErrorResponse;
use crate::types::WalletError;
use rust_decimal::Decimal;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by the request handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid wallet UUID")]
    InvalidWalletId,

    #[error("invalid request body")]
    InvalidRequestBody,

    #[error(transparent)]
    Wallet(#[from] WalletError),
}

impl ApiError {
    /// HTTP status of this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidWalletId | ApiError::InvalidRequestBody => StatusCode::BAD_REQUEST,
            ApiError::Wallet(err) => match err {
                WalletError::WalletNotFound { .. } => StatusCode::NOT_FOUND,
                WalletError::InvalidOperation { .. } | WalletError::InvalidAmount { .. } => {
                    StatusCode::BAD_REQUEST
                }
                WalletError::InsufficientFunds { .. } => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Message sent to the client
    pub fn client_message(&self) -> &'static str {
        match self {
            ApiError::InvalidWalletId => "invalid wallet UUID",
            ApiError::InvalidRequestBody => "invalid request body",
            ApiError::Wallet(err) => match err {
                WalletError::WalletNotFound { .. } => "wallet not found",
                WalletError::InvalidOperation { .. } => "invalid operation type",
                WalletError::InvalidAmount { amount } if *amount <= Decimal::ZERO => {
                    "amount must be positive"
                }
                WalletError::InvalidAmount { .. } => {
                    "amount must have at most 4 decimal places and be below 10^16"
                }
                WalletError::InsufficientFunds { .. } => "insufficient funds",
                _ => "internal server error",
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "unexpected error");
        }

        let body = ErrorResponse {
            error: self.client_message().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StoreError;
    use rstest::rstest;
    use std::time::Duration;
    use uuid::Uuid;

    #[rstest]
    #[case::bad_uuid(ApiError::InvalidWalletId, StatusCode::BAD_REQUEST, "invalid wallet UUID")]
    #[case::bad_body(ApiError::InvalidRequestBody, StatusCode::BAD_REQUEST, "invalid request body")]
    #[case::not_found(
        WalletError::wallet_not_found(Uuid::nil()).into(),
        StatusCode::NOT_FOUND,
        "wallet not found"
    )]
    #[case::invalid_operation(
        WalletError::invalid_operation("FOO").into(),
        StatusCode::BAD_REQUEST,
        "invalid operation type"
    )]
    #[case::invalid_amount(
        WalletError::invalid_amount(Decimal::new(-10, 0)).into(),
        StatusCode::BAD_REQUEST,
        "amount must be positive"
    )]
    #[case::amount_too_precise(
        WalletError::invalid_amount(Decimal::new(1, 5)).into(),
        StatusCode::BAD_REQUEST,
        "amount must have at most 4 decimal places and be below 10^16"
    )]
    #[case::amount_too_large(
        WalletError::invalid_amount(Decimal::new(10_000_000_000_000_000, 0)).into(),
        StatusCode::BAD_REQUEST,
        "amount must have at most 4 decimal places and be below 10^16"
    )]
    #[case::insufficient_funds(
        WalletError::insufficient_funds(Uuid::nil(), Decimal::ONE, Decimal::TEN).into(),
        StatusCode::CONFLICT,
        "insufficient funds"
    )]
    #[case::timeout(
        WalletError::Timeout { after: Duration::from_secs(10) }.into(),
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal server error"
    )]
    #[case::retries_exhausted(
        WalletError::retries_exhausted(10, WalletError::Store(StoreError::deadlock("x"))).into(),
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal server error"
    )]
    #[case::backend(
        WalletError::Store(StoreError::backend("connection reset")).into(),
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal server error"
    )]
    fn test_error_mapping(
        #[case] error: ApiError,
        #[case] status: StatusCode,
        #[case] message: &str,
    ) {
        assert_eq!(error.status_code(), status);
        assert_eq!(error.client_message(), message);
    }
}
