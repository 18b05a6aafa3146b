//! Reliability error types.

use thiserror::Error;

/// The only failures the reliability layer lets reach a caller.
#[derive(Debug, Error)]
pub enum ReliabilityError {
    /// Caller input failed the pre-flight check. Never retried.
    #[error("validation failed for '{operation}': {reason}")]
    Validation { operation: String, reason: String },

    /// Every attempt failed; carries the last underlying cause.
    #[error("operation '{operation}' failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    /// A retry policy with unusable values was rejected.
    #[error("invalid retry policy: {reason}")]
    InvalidPolicy { reason: String },
}

impl ReliabilityError {
    /// Short label used as the error type in enhanced error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ValidationError",
            Self::RetriesExhausted { .. } => "OperationError",
            Self::InvalidPolicy { .. } => "ConfigError",
        }
    }
}
