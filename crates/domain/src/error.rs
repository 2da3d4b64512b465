//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`GreenhubError`] via `#[from]` (no `String` variants at this level).

/// Top-level error returned by domain and application operations.
#[derive(Debug, thiserror::Error)]
pub enum GreenhubError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// Opaque persistence failure raised by a storage adapter.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A domain invariant was violated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("value {0} is out of range, expected 0 to 100")]
    ValueOutOfRange(u16),

    #[error("an id is required to update an existing record")]
    MissingId,

    #[error("comparison value must be a finite number")]
    NonFiniteComparison,

    #[error("invalid time of day {0:?}, expected HH:MM")]
    InvalidTimeOfDay(String),

    #[error("unknown {field} {value:?}")]
    UnknownVariant { field: &'static str, value: String },
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}
