//! Enhanced error reports: what failed, with which arguments, and what to
//! try next.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::errors::ReliabilityError;

/// `(message substring, operation-name substring, suggestion)`.
///
/// A row applies when the lower-cased message contains the first pattern and,
/// if given, the lower-cased operation name contains the second.
const SUGGESTIONS: &[(&str, Option<&str>, &str)] = &[
    ("not found", Some("search"), "Try broader search terms or fewer filters."),
    ("not found", None, "Check that the name or path exists and is spelled correctly."),
    ("timed out", None, "The server may be slow or hung; retry later or raise the query timeout."),
    ("timeout", None, "The server may be slow or hung; retry later or raise the query timeout."),
    ("permission", None, "Check access rights for the target resource."),
    ("connection refused", None, "Make sure the server is running and reachable."),
    ("rate limit", None, "Wait before retrying; the upstream service is throttling requests."),
    ("must not be empty", None, "Provide a non-empty value for every field."),
    ("missing required field", None, "Add the required fields listed in the request schema."),
    ("json object", None, "Send the arguments as a JSON object."),
    ("exited with", None, "Check the server's stderr output and its launch command."),
];

/// A failure with the context needed to act on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancedError {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub error_type: String,
    pub message: String,
    pub arguments: Value,
    pub suggestions: Vec<String>,
}

impl std::fmt::Display for EnhancedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "[{}] {} in '{}': {}", self.timestamp.to_rfc3339(), self.error_type, self.operation, self.message)?;
        write!(f, "Arguments: {}", self.arguments)?;
        if !self.suggestions.is_empty() {
            write!(f, "\nSuggestions:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n- {suggestion}")?;
            }
        }
        Ok(())
    }
}

/// Build an enhanced report for any error message.
pub fn format_enhanced_error(
    error_type: &str,
    message: &str,
    operation: &str,
    arguments: &Value,
) -> EnhancedError {
    EnhancedError {
        timestamp: Utc::now(),
        operation: operation.to_string(),
        error_type: error_type.to_string(),
        message: message.to_string(),
        arguments: arguments.clone(),
        suggestions: suggestions_for(message, operation),
    }
}

/// Matching suggestions, in table order, without duplicates.
pub fn suggestions_for(message: &str, operation: &str) -> Vec<String> {
    let message = message.to_lowercase();
    let operation = operation.to_lowercase();

    let mut out: Vec<String> = Vec::new();
    for (pattern, op_pattern, suggestion) in SUGGESTIONS {
        let op_matches = op_pattern.map_or(true, |p| operation.contains(p));
        if message.contains(pattern) && op_matches && !out.iter().any(|s| s == suggestion) {
            out.push(suggestion.to_string());
        }
    }
    out
}

impl ReliabilityError {
    /// Enhanced report for this error.
    pub fn enhance(&self, operation: &str, arguments: &Value) -> EnhancedError {
        format_enhanced_error(self.kind(), &self.to_string(), operation, arguments)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_not_found_suggests_broader_terms() {
        let report = format_enhanced_error(
            "OperationError",
            "Result NOT FOUND",
            "web_search",
            &json!({"query": "x"}),
        );
        assert_eq!(report.suggestions[0], "Try broader search terms or fewer filters.");
        assert_eq!(report.suggestions.len(), 2);
        assert_eq!(report.arguments["query"], "x");
    }

    #[test]
    fn test_timeout_suggestion_is_not_duplicated() {
        let suggestions = suggestions_for("server 'x' timed out after 5000ms (timeout)", "query");
        assert_eq!(suggestions.len(), 1);
    }

    #[test]
    fn test_no_match_no_suggestions() {
        assert!(suggestions_for("something odd", "op").is_empty());
    }

    #[test]
    fn test_display_and_from_reliability_error() {
        let err = ReliabilityError::Validation {
            operation: "generate_routes".into(),
            reason: "field 'task' must not be empty".into(),
        };
        let report = err.enhance("generate_routes", &json!({"task": ""}));
        assert_eq!(report.error_type, "ValidationError");

        let text = report.to_string();
        assert!(text.contains("ValidationError in 'generate_routes'"));
        assert!(text.contains(r#"Arguments: {"task":""}"#));
        assert!(text.contains("- Provide a non-empty value for every field."));
    }
}
