//! Core business logic module
//!
//! This module contains the balance mutation components:
//! - `traits` - Store and backoff abstractions the engine is written against
//! - `classify` - Maps attempt failures to retry categories
//! - `retry` - Retry policy and the per-call state machine
//! - `engine` - Balance mutation orchestration

pub mod classify;
pub mod engine;
pub mod retry;
pub mod traits;

pub use classify::{DefaultClassifier, ErrorClass, ErrorClassifier};
pub use engine::{BalanceEngine, EngineConfig, OperationContext, DEFAULT_TIMEOUT};
pub use retry::{RetryPolicy, RetryState};
pub use traits::{Sleeper, StoreTransaction, TokioSleeper, TransactionalStore};
