//! Fallback tool table keyed by server-name patterns.
//!
//! Used only when a live `tools/list` query fails. Each entry pairs a
//! case-insensitive regex over the server name with a canned tool list; every
//! matching entry contributes, in table order.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use super::rules::RuleSet;
use crate::mcp_client::types::{lenient, RawToolDefinition, ToolDescriptor};

/// A canned tool definition. Missing estimates are filled by the rule tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "inputSchema")]
    pub input_schema: Option<serde_json::Value>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient::complexity")]
    pub complexity: Option<u8>,
    #[serde(default, alias = "estimatedDuration", deserialize_with = "lenient::duration_ms")]
    pub estimated_duration_ms: Option<u64>,
}

impl FallbackTool {
    fn new(name: &str, description: &str, schema: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: Some(schema),
            category: None,
            complexity: None,
            estimated_duration_ms: None,
        }
    }

    fn to_raw(&self) -> RawToolDefinition {
        RawToolDefinition {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            input_schema: self.input_schema.clone(),
            category: self.category.clone(),
            complexity: self.complexity,
            estimated_duration_ms: self.estimated_duration_ms,
            dependencies: Vec::new(),
        }
    }
}

/// One row of the fallback table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackRule {
    /// Regex matched against the server name, case-insensitively.
    pub pattern: String,
    pub tools: Vec<FallbackTool>,
}

/// Produce fallback tools for a server, classified through `rules`.
///
/// Rows with an invalid regex are skipped (and logged), never fatal.
pub fn fallback_tools_for(
    server_name: &str,
    table: &[FallbackRule],
    rules: &RuleSet,
) -> Vec<ToolDescriptor> {
    let mut tools = Vec::new();

    for row in table {
        let regex = match RegexBuilder::new(&row.pattern).case_insensitive(true).build() {
            Ok(regex) => regex,
            Err(e) => {
                tracing::warn!(
                    pattern = %row.pattern,
                    error = %e,
                    "skipping fallback rule with invalid pattern"
                );
                continue;
            }
        };

        if regex.is_match(server_name) {
            tools.extend(
                row.tools
                    .iter()
                    .map(|tool| rules.describe_tool(server_name, tool.to_raw())),
            );
        }
    }

    tools
}

fn path_schema(extra: &[(&str, &str)]) -> serde_json::Value {
    let mut properties = serde_json::Map::new();
    let mut required = vec![serde_json::json!("path")];
    properties.insert(
        "path".to_string(),
        serde_json::json!({"type": "string", "description": "Target path"}),
    );
    for (field, description) in extra {
        properties.insert(
            field.to_string(),
            serde_json::json!({"type": "string", "description": description}),
        );
        required.push(serde_json::json!(field));
    }
    serde_json::json!({"type": "object", "properties": properties, "required": required})
}

/// The built-in fallback table.
pub fn default_fallback_rules() -> Vec<FallbackRule> {
    vec![
        FallbackRule {
            pattern: "file|fs".to_string(),
            tools: vec![
                FallbackTool::new("read_file", "Read the contents of a file", path_schema(&[])),
                FallbackTool::new(
                    "write_file",
                    "Write content to a file",
                    path_schema(&[("content", "Content to write")]),
                ),
                FallbackTool::new(
                    "list_directory",
                    "List entries of a directory",
                    path_schema(&[]),
                ),
            ],
        },
        FallbackRule {
            pattern: "terminal|shell|command|desktop".to_string(),
            tools: vec![FallbackTool::new(
                "execute_command",
                "Execute a terminal command",
                serde_json::json!({
                    "type": "object",
                    "properties": {"command": {"type": "string"}},
                    "required": ["command"]
                }),
            )],
        },
        FallbackRule {
            pattern: "search|brave|web".to_string(),
            tools: vec![FallbackTool::new(
                "web_search",
                "Search the web for information",
                serde_json::json!({
                    "type": "object",
                    "properties": {"query": {"type": "string"}},
                    "required": ["query"]
                }),
            )],
        },
        FallbackRule {
            pattern: "git".to_string(),
            tools: vec![
                FallbackTool::new("git_status", "Show git working tree status", path_schema(&[])),
                FallbackTool::new("git_log", "Show git commit history", path_schema(&[])),
            ],
        },
        FallbackRule {
            pattern: "memory|knowledge".to_string(),
            tools: vec![FallbackTool::new(
                "search_nodes",
                "Search the knowledge graph memory",
                serde_json::json!({
                    "type": "object",
                    "properties": {"query": {"type": "string"}},
                    "required": ["query"]
                }),
            )],
        },
        FallbackRule {
            pattern: "sequential|thinking".to_string(),
            tools: vec![FallbackTool::new(
                "sequentialthinking",
                "Think through a problem step by step",
                serde_json::json!({
                    "type": "object",
                    "properties": {"thought": {"type": "string"}},
                    "required": ["thought"]
                }),
            )],
        },
    ]
}

// ─── Tests ───────────────────────────────────────────────────────────────────
