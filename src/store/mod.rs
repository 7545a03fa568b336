//! Transactional store implementations
//!
//! - `memory` - Process-local store with row locks and fault injection
//! - `postgres` - PostgreSQL store using `SELECT ... FOR UPDATE`

pub mod memory;
pub mod postgres;

pub use memory::{FaultStage, InMemoryStore, InMemoryTransaction};
pub use postgres::{PgStore, PgTransaction};
