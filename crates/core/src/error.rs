//! Domain error model shared by products and media buys.

use thiserror::Error;

use crate::id::TenantId;

pub type DomainResult<T> = Result<T, DomainError>;

/// Business-rule failures raised by aggregates and value objects.
///
/// Catalog, repository and ad-server failures live in their own crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Buyer or publisher input is malformed: an empty buyer ref, an inverted
    /// flight window, a bad country code.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The command does not fit the aggregate's current state.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid {kind}: {reason}")]
    InvalidId { kind: &'static str, reason: String },

    /// The aggregate was never created.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    /// A command addressed another tenant's aggregate.
    #[error("{entity} belongs to another tenant than {requested}")]
    TenantMismatch {
        entity: &'static str,
        requested: TenantId,
    },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidId {
            kind,
            reason: reason.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound(entity)
    }

    pub fn tenant_mismatch(entity: &'static str, requested: TenantId) -> Self {
        Self::TenantMismatch { entity, requested }
    }
}
