//! Domain error model.

use thiserror::Error;

/// Rejection raised by a domain type.
///
/// Only deterministic failures live here: a command the purchase state machine
/// refuses, or an identifier that cannot be parsed. Provider, timeout and
/// configuration failures are modelled by the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A command carried a value the aggregate cannot act on
    /// (e.g. resolving a purchase to a non-outcome state).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The transition table or another aggregate rule forbids the command.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Untrusted input did not yield a usable identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The product already has an attempt in flight.
    #[error("conflict: {0}")]
    Conflict(String),
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
}
