//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::unit::Unit;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed line item).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested record was not found for the given owner.
    #[error("not found")]
    NotFound,

    /// A conflict occurred (stale version, duplicate record).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A movement would drive the stock balance below zero.
    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: Decimal, requested: Decimal },

    /// Two units of different dimensions (e.g. kg and l) cannot be converted.
    #[error("cannot convert {from} to {to}")]
    UnitMismatch { from: Unit, to: Unit },

    /// Authorization failure at the domain boundary.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Decimal arithmetic overflowed on an otherwise valid input.
    pub fn out_of_range() -> Self {
        Self::Validation("amount out of range".to_string())
    }
}
