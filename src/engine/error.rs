//! Engine error taxonomy.

use crate::domain::DuplicateRank;
use thiserror::Error;

/// Failure of an engine call. Engines either return a complete result that
/// satisfies every invariant or one of these; never a partial result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Malformed or out-of-domain input. Raised before any computation.
    #[error("Validation error: {0}")]
    Validation(String),
    /// Internally inconsistent terms.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A computed result broke an arithmetic invariant. Indicates a bug.
    #[error("Arithmetic invariant violated: {0}")]
    InvariantViolation(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        EngineError::Configuration(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        EngineError::InvariantViolation(msg.into())
    }

    /// Input large enough to overflow 64-bit cents or share counts.
    pub(crate) fn out_of_range(what: &str) -> Self {
        EngineError::Validation(format!("{} is out of range", what))
    }
}

impl From<DuplicateRank> for EngineError {
    fn from(err: DuplicateRank) -> Self {
        EngineError::Validation(err.to_string())
    }
}
