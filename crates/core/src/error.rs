//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Broad failure class, for callers that route on the class of a failure
/// instead of matching every variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DomainErrorKind {
    /// Malformed or incomplete input, rejected before any write. The caller
    /// recovers by correcting the input.
    Validation,
    /// A business rule refused the operation. Surfaced to the user; no
    /// partial effect.
    DomainRule,
    /// Stale client state or a broken invariant. Logged as a serious
    /// condition; the operation is aborted.
    Consistency,
}

/// Domain-level error.
///
/// Keep this focused on deterministic business failures. Storage and
/// atomicity concerns live in the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// A value failed validation (e.g. missing weight, malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A batch cannot be committed without at least one carcass part.
    #[error("batch must be committed with at least one stock item")]
    EmptyBatch,

    /// The item aged past the sanitary window and is blocked for sale.
    #[error("stock item {item_id} blocked for sale after {days} days in storage")]
    StaleInventory { item_id: String, days: i64 },

    /// A payment (received amount plus discount) would exceed the
    /// receivable's outstanding balance.
    #[error("payment of {attempted:.2} exceeds outstanding balance {outstanding:.2}")]
    Overpayment { attempted: f64, outstanding: f64 },

    /// The field became immutable when the batch was committed; corrections
    /// go through reversal.
    #[error("field is immutable after commit: {0}")]
    ImmutableField(String),

    /// The ledger entry was already compensated by a reversal entry.
    #[error("transaction {0} was already reversed")]
    AlreadyReversed(String),

    /// A referenced entity does not exist (domain-level).
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict occurred (e.g. stale version / duplicate creation).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn immutable(field: impl Into<String>) -> Self {
        Self::ImmutableField(field.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Classify this error for routing/logging purposes.
    pub fn kind(&self) -> DomainErrorKind {
        match self {
            Self::Validation(_) | Self::InvalidId(_) => DomainErrorKind::Validation,
            Self::EmptyBatch
            | Self::StaleInventory { .. }
            | Self::Overpayment { .. }
            | Self::ImmutableField(_) => DomainErrorKind::DomainRule,
            Self::AlreadyReversed(_)
            | Self::NotFound(_)
            | Self::Conflict(_)
            | Self::InvariantViolation(_) => DomainErrorKind::Consistency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_rule_errors_classify_as_domain_rule() {
        assert_eq!(DomainError::EmptyBatch.kind(), DomainErrorKind::DomainRule);
        assert_eq!(
            DomainError::Overpayment {
                attempted: 100.0,
                outstanding: 50.0
            }
            .kind(),
            DomainErrorKind::DomainRule
        );
        assert_eq!(
            DomainError::StaleInventory {
                item_id: "X-20250101-001-001-WHOLE".to_string(),
                days: 14
            }
            .kind(),
            DomainErrorKind::DomainRule
        );
    }

    #[test]
    fn stale_state_errors_classify_as_consistency() {
        assert_eq!(
            DomainError::AlreadyReversed("tx".to_string()).kind(),
            DomainErrorKind::Consistency
        );
        assert_eq!(
            DomainError::not_found("batch").kind(),
            DomainErrorKind::Consistency
        );
    }
}
