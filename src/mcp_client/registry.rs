//! Tool catalog: the classified tools of every server from the last sweep.
//!
//! Provides:
//! - Per-server tool lists in upstream response order
//! - Lookup by bare or fully-qualified (`server.tool`) name
//! - Category and server views for the route optimizer
//! - A compact capability summary for hosting layers

use std::collections::{BTreeMap, BTreeSet};

use super::types::ToolDescriptor;

// ─── ToolCatalog ─────────────────────────────────────────────────────────────

/// Aggregated tool catalog across all servers.
///
/// Servers are kept in name order; within a server, tools keep the order the
/// server (or the fallback table) reported them in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCatalog {
    /// `server_name → tools`.
    tools: BTreeMap<String, Vec<ToolDescriptor>>,
}

impl ToolCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tool list of one server.
    pub fn register_server_tools(&mut self, server_name: &str, tools: Vec<ToolDescriptor>) {
        self.tools.insert(server_name.to_string(), tools);
    }

    pub fn clear(&mut self) {
        self.tools.clear();
    }

    /// All tools, grouped by server name.
    pub fn all_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.values().flatten().cloned().collect()
    }

    /// Tools of one server, in upstream order. Unknown servers yield nothing.
    pub fn by_server(&self, server_name: &str) -> Vec<ToolDescriptor> {
        self.tools.get(server_name).cloned().unwrap_or_default()
    }

    /// Tools whose category equals `category` (case-insensitive).
    pub fn by_category(&self, category: &str) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .flatten()
            .filter(|t| t.category.eq_ignore_ascii_case(category))
            .cloned()
            .collect()
    }

    /// Look up a tool by `server.tool` or by bare name (first match in
    /// server-name order).
    pub fn get_tool(&self, name: &str) -> Option<&ToolDescriptor> {
        if let Some((server, tool)) = name.split_once('.') {
            if let Some(found) = self
                .tools
                .get(server)
                .and_then(|tools| tools.iter().find(|t| t.name == tool))
            {
                return Some(found);
            }
        }
        self.tools.values().flatten().find(|t| t.name == name)
    }

    /// Sorted, de-duplicated category names.
    pub fn categories(&self) -> Vec<String> {
        self.tools
            .values()
            .flatten()
            .map(|t| t.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Total number of tools.
    pub fn len(&self) -> usize {
        self.tools.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compact textual summary of the catalog.
    ///
    /// One line listing servers with tool counts, then one line per category.
    pub fn capability_summary(&self) -> String {
        if self.is_empty() {
            return "No tools currently available.".to_string();
        }

        let server_parts: Vec<String> = self
            .tools
            .iter()
            .filter(|(_, tools)| !tools.is_empty())
            .map(|(name, tools)| format!("{name} ({})", tools.len()))
            .collect();

        let mut summary = format!(
            "Available capabilities ({} tools across {} servers): {}.",
            self.len(),
            server_parts.len(),
            server_parts.join(", "),
        );

        for category in self.categories() {
            let names: Vec<String> = self
                .by_category(&category)
                .iter()
                .map(ToolDescriptor::qualified_name)
                .collect();
            summary.push_str(&format!("\n{category}: {}.", names.join(", ")));
        }

        summary
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(server: &str, name: &str, category: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: format!("{name} tool"),
            input_schema: serde_json::json!({"type": "object"}),
            server_name: server.to_string(),
            category: category.to_string(),
            complexity: 2,
            estimated_duration_ms: 100,
            dependencies: vec![],
        }
    }

    fn sample() -> ToolCatalog {
        let mut catalog = ToolCatalog::new();
        catalog.register_server_tools(
            "fs",
            vec![
                tool("fs", "write_file", "filesystem"),
                tool("fs", "read_file", "filesystem"),
            ],
        );
        catalog.register_server_tools("web", vec![tool("web", "web_search", "search")]);
        catalog
    }

    #[test]
    fn test_preserves_upstream_order() {
        let names: Vec<String> = sample().by_server("fs").into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["write_file", "read_file"]);
    }

    #[test]
    fn test_views() {
        let catalog = sample();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.by_category("FILESYSTEM").len(), 2);
        assert_eq!(catalog.by_category("nope").len(), 0);
        assert!(catalog.by_server("unknown").is_empty());
        assert_eq!(catalog.categories(), vec!["filesystem", "search"]);
    }

    #[test]
    fn test_get_tool_qualified_and_bare() {
        let catalog = sample();
        assert_eq!(catalog.get_tool("fs.read_file").unwrap().server_name, "fs");
        assert_eq!(catalog.get_tool("web_search").unwrap().server_name, "web");
        // qualified names never resolve to another server's tool
        assert!(catalog.get_tool("fs.web_search").is_none());
        assert!(catalog.get_tool("missing").is_none());
    }

    #[test]
    fn test_register_replaces_and_clear_empties() {
        let mut catalog = sample();
        catalog.register_server_tools("fs", vec![tool("fs", "list_directory", "filesystem")]);
        assert_eq!(catalog.by_server("fs").len(), 1);
        assert!(catalog.get_tool("read_file").is_none());

        catalog.clear();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_capability_summary() {
        let summary = sample().capability_summary();
        assert!(summary.starts_with("Available capabilities (3 tools across 2 servers): fs (2), web (1)."));
        assert!(summary.contains("filesystem: fs.write_file, fs.read_file."));
        assert!(summary.contains("search: web.web_search."));

        assert_eq!(ToolCatalog::new().capability_summary(), "No tools currently available.");
    }
}
