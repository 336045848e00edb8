//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is local and recoverable: the operation that produced it was
/// aborted before any mutation was committed. Nothing here is retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// User-correctable input problem (non-positive quantity, missing notes,
    /// insufficient stock, unresolved placeholder, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Referential violation, e.g. deleting a definition that is still referenced.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// An identifier did not resolve to a live record.
    #[error("not found: {0}")]
    NotFound(String),

    /// Stored state broke an invariant. Indicates a bug, not bad input.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The unit-conversion collaborator could not convert between units.
    #[error("unit conversion failed: {0}")]
    Conversion(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn conversion(msg: impl Into<String>) -> Self {
        Self::Conversion(msg.into())
    }

    /// True for the categories a user can fix by changing their input.
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Conversion(_))
    }
}
