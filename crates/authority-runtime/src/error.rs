//! Runtime error taxonomy: extends `authority_types::CoreError` with the
//! persistence-failure kind, which is fatal to the in-flight request rather
//! than a recordable denial.

use authority_types::CoreError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum RuntimeError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl RuntimeError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Core(e) => e.kind(),
            Self::Persistence(_) => "PERSISTENCE",
        }
    }

    /// Persistence and crypto failures are fatal to the in-flight request;
    /// everything else is an expected, recordable outcome (§7).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Core(CoreError::Crypto(_)))
    }
}

impl From<rusqlite::Error> for RuntimeError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
