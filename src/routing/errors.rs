//! Routing error types.

use thiserror::Error;

/// Errors surfaced by route generation and workflow analysis.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Sequential analysis is switched off in configuration or settings.
    #[error("sequential analysis is not available: {reason}")]
    AnalysisUnavailable { reason: String },

    /// The problem or task text was blank.
    #[error("{field} must not be empty")]
    EmptyInput { field: &'static str },

    /// A route candidate could not be (de)serialized.
    #[error("route serialization error: {reason}")]
    SerializationError { reason: String },
}

impl From<serde_json::Error> for RoutingError {
    fn from(e: serde_json::Error) -> Self {
        RoutingError::SerializationError {
            reason: e.to_string(),
        }
    }
}
