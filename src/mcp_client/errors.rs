//! MCP Client error types.

use thiserror::Error;

/// Errors that can occur while querying or discovering MCP servers.
///
/// None of these abort a discovery sweep: per-server failures are converted
/// into fallback tools and per-entry failures are dropped.
#[derive(Debug, Error)]
pub enum McpError {
    /// A server process failed to start.
    #[error("failed to spawn server '{name}': {reason}")]
    SpawnFailed { name: String, reason: String },

    /// The server did not exit within the query timeout and was killed.
    #[error("server '{name}' timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },

    /// The caller cancelled the query before the server exited.
    #[error("query to server '{name}' was cancelled")]
    Cancelled { name: String },

    /// The server exited with a non-zero status.
    #[error("server '{name}' exited with {}{}", describe_code(.code), format_stderr_suffix(.stderr))]
    ProcessExited {
        name: String,
        code: Option<i32>,
        stderr: String,
    },

    /// I/O error on the server's standard streams.
    #[error("transport error for server '{server}': {reason}")]
    TransportError { server: String, reason: String },

    /// The server exited cleanly but never produced a tool listing.
    #[error("invalid response from server '{server}': {reason}")]
    InvalidResponse { server: String, reason: String },

    /// A server entry in a discovery source failed validation.
    #[error("invalid server entry in {source_name}: {reason}")]
    InvalidEntry { source_name: String, reason: String },
}

impl McpError {
    /// Short machine-friendly label, used in sweep reports and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SpawnFailed { .. } => "spawn_failed",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled { .. } => "cancelled",
            Self::ProcessExited { .. } => "process_exited",
            Self::TransportError { .. } => "transport",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::InvalidEntry { .. } => "invalid_entry",
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Format a stderr suffix for error messages (empty string if no stderr).
pub(crate) fn format_stderr_suffix(stderr: &str) -> String {
    if stderr.trim().is_empty() {
        String::new()
    } else {
        format!(" | stderr: {}", stderr.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_exited_message_includes_stderr() {
        let err = McpError::ProcessExited {
            name: "fs".into(),
            code: Some(3),
            stderr: "boom\n".into(),
        };
        assert_eq!(err.to_string(), "server 'fs' exited with code 3 | stderr: boom");
        assert_eq!(err.kind(), "process_exited");
    }

    #[test]
    fn test_process_exited_without_code() {
        let err = McpError::ProcessExited {
            name: "fs".into(),
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_kind_labels() {
        let cases = [
            (McpError::SpawnFailed { name: "a".into(), reason: "x".into() }, "spawn_failed"),
            (McpError::Timeout { name: "a".into(), timeout_ms: 5 }, "timeout"),
            (McpError::Cancelled { name: "a".into() }, "cancelled"),
            (McpError::TransportError { server: "a".into(), reason: "x".into() }, "transport"),
            (McpError::InvalidResponse { server: "a".into(), reason: "x".into() }, "invalid_response"),
            (McpError::InvalidEntry { source_name: "a".into(), reason: "x".into() }, "invalid_entry"),
        ];
        for (err, label) in cases {
            assert_eq!(err.kind(), label);
        }
    }
}
