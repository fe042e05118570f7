//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic business/domain failures. Infrastructure
/// concerns (storage, transport) belong elsewhere. Every variant maps to a
/// stable machine-readable kind at the API boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A requested entity id does not resolve.
    #[error("not found")]
    NotFound,

    /// Duplicate name, lost concurrent race, or entity still in use.
    #[error("conflict: {0}")]
    Conflict(String),

    /// System-entity immutability, ownership mismatch, or insufficient role.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Missing or expired credential.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// A department reassignment would break the tree shape.
    #[error("invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    /// A workflow stage rule was violated.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// A collaborator timed out or is unreachable; retryable by the caller.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn invalid_hierarchy(msg: impl Into<String>) -> Self {
        Self::InvalidHierarchy(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
