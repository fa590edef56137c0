//! Error taxonomy shared by the mandate, scope, and crypto layers.
//!
//! Mirrors the seven error kinds of the authority core's design: each
//! variant is a value a caller matches on, not a thrown exception.
//! Persistence-specific variants live in `authority-runtime::RuntimeError`
//! and wrap these where relevant.

use thiserror::Error;

/// Core error taxonomy for mandate issuance, validation, and revocation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("state violation: {0}")]
    StateViolation(String),

    #[error("authorization denied: {0}")]
    Authorization(String),

    #[error("crypto error: {0}")]
    Crypto(String),
}

impl CoreError {
    /// The machine-readable error kind, matching §7 of the spec this core implements.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::ConstraintViolation(_) => "CONSTRAINT_VIOLATION",
            Self::StateViolation(_) => "STATE_VIOLATION",
            Self::Authorization(_) => "AUTHORIZATION",
            Self::Crypto(_) => "CRYPTO",
        }
    }

    /// Whether this error should be recorded as a `denied` ledger event.
    pub fn is_recordable_denial(&self) -> bool {
        matches!(
            self,
            Self::ConstraintViolation(_) | Self::StateViolation(_) | Self::Authorization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
