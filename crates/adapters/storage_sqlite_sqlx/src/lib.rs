//! # greenhub-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `greenhub-app::ports`
//! - Serve sensor/output snapshots and output writes for the control loop
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `greenhub-app` (for port traits) and `greenhub-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod automation_repo;
mod condition_repo;
pub mod error;
mod greenhouse;
pub mod pool;

pub use automation_repo::SqliteAutomationRepository;
pub use condition_repo::SqliteConditionRepository;
pub use error::StorageError;
pub use greenhouse::SqliteGreenhouse;
pub use pool::{Config, Database};

fn decode<E: std::error::Error + Send + Sync + 'static>(err: E) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}
