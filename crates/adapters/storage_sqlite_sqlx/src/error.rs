//! Storage-specific error type wrapping sqlx errors.

use greenhub_domain::error::GreenhubError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A condition position does not fit in an `INTEGER` column.
    #[error("condition position out of range")]
    Position(#[from] std::num::TryFromIntError),
}

impl From<StorageError> for GreenhubError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}
