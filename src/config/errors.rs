//! Configuration error types.
//!
//! These never escape `load_config`: a source that fails to read or parse is
//! logged and skipped. They exist so the skip can be logged with context.

use thiserror::Error;

/// Errors raised while reading a single configuration source.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: String, reason: String },

    /// The source did not contain valid JSON of the expected shape.
    #[error("malformed JSON in {source_name}: {reason}")]
    MalformedJson { source_name: String, reason: String },
}
