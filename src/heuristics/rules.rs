//! Data-driven classification rule tables.
//!
//! Each table maps a lower-case substring pattern to a value. Classification
//! looks at `name + " " + description`, lower-cased, and takes the value of
//! the first rule whose pattern occurs in it. Tables are ordered: put the more
//! specific patterns first.

use serde::{Deserialize, Serialize};

use crate::mcp_client::types::{RawToolDefinition, ToolDescriptor};

// ─── Defaults ────────────────────────────────────────────────────────────────

/// Category used when no category rule matches.
pub const DEFAULT_CATEGORY: &str = "utility";

/// Complexity used when no complexity rule matches.
pub const DEFAULT_COMPLEXITY: u8 = 3;

/// Duration used when no duration rule matches (ms).
pub const DEFAULT_DURATION_MS: u64 = 500;

/// Lowest and highest complexity a tool can carry.
pub const MIN_COMPLEXITY: u8 = 1;
pub const MAX_COMPLEXITY: u8 = 10;

// ─── Types ───────────────────────────────────────────────────────────────────

/// One classification rule: `pattern` → `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule<T> {
    pub pattern: String,
    pub value: T,
    #[serde(default)]
    pub description: String,
}

impl<T> Rule<T> {
    pub fn new(pattern: &str, value: T, description: &str) -> Self {
        Self {
            pattern: pattern.to_lowercase(),
            value,
            description: description.to_string(),
        }
    }
}

/// Outcome of classifying a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: String,
    pub complexity: u8,
    pub estimated_duration_ms: u64,
}

/// The three rule tables used by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub category: Vec<Rule<String>>,
    pub complexity: Vec<Rule<u8>>,
    pub duration: Vec<Rule<u64>>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            category: default_category_rules(),
            complexity: default_complexity_rules(),
            duration: default_duration_rules(),
        }
    }
}

impl RuleSet {
    /// Classify a tool from its name and description.
    pub fn classify(&self, name: &str, description: &str) -> Classification {
        let haystack = format!("{name} {description}").to_lowercase();

        let category = first_match(&self.category, &haystack)
            .cloned()
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        let complexity = first_match(&self.complexity, &haystack)
            .copied()
            .unwrap_or(DEFAULT_COMPLEXITY);
        let duration = first_match(&self.duration, &haystack)
            .copied()
            .unwrap_or(DEFAULT_DURATION_MS);

        Classification {
            category,
            complexity: clamp_complexity(complexity),
            estimated_duration_ms: clamp_duration(duration),
        }
    }

    /// Build a catalog entry from a server-reported tool.
    ///
    /// Values the server supplied itself take precedence; the rule tables
    /// fill whatever is missing.
    pub fn describe_tool(&self, server_name: &str, raw: RawToolDefinition) -> ToolDescriptor {
        let description = raw.description.unwrap_or_default();
        let guess = self.classify(&raw.name, &description);

        ToolDescriptor {
            name: raw.name,
            description,
            input_schema: raw
                .input_schema
                .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}})),
            server_name: server_name.to_string(),
            category: raw
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(guess.category),
            complexity: raw.complexity.map(clamp_complexity).unwrap_or(guess.complexity),
            estimated_duration_ms: raw
                .estimated_duration_ms
                .map(clamp_duration)
                .unwrap_or(guess.estimated_duration_ms),
            dependencies: raw.dependencies,
        }
    }
}

fn first_match<'a, T>(rules: &'a [Rule<T>], haystack: &str) -> Option<&'a T> {
    rules
        .iter()
        .find(|rule| !rule.pattern.is_empty() && haystack.contains(&rule.pattern.to_lowercase()))
        .map(|rule| &rule.value)
}

/// Keep complexity within 1..=10.
pub fn clamp_complexity(value: u8) -> u8 {
    value.clamp(MIN_COMPLEXITY, MAX_COMPLEXITY)
}

/// Durations must be strictly positive.
pub fn clamp_duration(value: u64) -> u64 {
    value.max(1)
}

// ─── Default Tables ──────────────────────────────────────────────────────────

fn default_category_rules() -> Vec<Rule<String>> {
    [
        ("file", "filesystem", "file reads, writes and metadata"),
        ("directory", "filesystem", "directory listing and traversal"),
        ("folder", "filesystem", "folder operations"),
        ("git", "version_control", "git repository operations"),
        ("commit", "version_control", "commit history"),
        ("search", "search", "search and lookup"),
        ("fetch", "web", "HTTP fetches"),
        ("http", "web", "HTTP requests"),
        ("web", "web", "web access"),
        ("url", "web", "URL handling"),
        ("sql", "database", "SQL queries"),
        ("database", "database", "database access"),
        ("query", "database", "data queries"),
        ("memory", "knowledge", "memory and recall"),
        ("knowledge", "knowledge", "knowledge graphs"),
        ("entit", "knowledge", "entities and relations"),
        ("think", "reasoning", "structured reasoning"),
        ("reason", "reasoning", "reasoning helpers"),
        ("terminal", "system", "terminal access"),
        ("command", "system", "command execution"),
        ("execute", "system", "process execution"),
        ("shell", "system", "shell access"),
        ("process", "system", "process management"),
        ("browser", "automation", "browser automation"),
        ("screenshot", "automation", "screen capture"),
        ("time", "utility", "time and date helpers"),
    ]
    .into_iter()
    .map(|(pattern, value, description)| Rule::new(pattern, value.to_string(), description))
    .collect()
}

fn default_complexity_rules() -> Vec<Rule<u8>> {
    [
        ("list", 1, "listing is trivial"),
        ("read", 2, "single read"),
        ("get", 2, "single lookup"),
        ("status", 2, "status check"),
        ("fetch", 3, "remote fetch"),
        ("search", 4, "search with ranking"),
        ("write", 4, "mutating write"),
        ("create", 4, "creation"),
        ("edit", 5, "in-place edits"),
        ("move", 5, "moves and renames"),
        ("delete", 5, "destructive operation"),
        ("execute", 6, "arbitrary execution"),
        ("command", 6, "arbitrary command"),
        ("think", 6, "multi-step reasoning"),
        ("analy", 7, "analysis"),
        ("browser", 7, "browser automation"),
        ("deploy", 8, "deployment"),
    ]
    .into_iter()
    .map(|(pattern, value, description)| Rule::new(pattern, value, description))
    .collect()
}

fn default_duration_rules() -> Vec<Rule<u64>> {
    [
        ("list", 100, "local listing"),
        ("read", 100, "local read"),
        ("get", 150, "local lookup"),
        ("status", 150, "status check"),
        ("write", 200, "local write"),
        ("edit", 250, "local edit"),
        ("move", 200, "local move"),
        ("search", 1_500, "search round trip"),
        ("fetch", 2_000, "network fetch"),
        ("web", 3_000, "web access"),
        ("think", 2_000, "reasoning step"),
        ("analy", 3_000, "analysis"),
        ("execute", 5_000, "process execution"),
        ("command", 5_000, "command execution"),
        ("browser", 5_000, "browser automation"),
        ("deploy", 10_000, "deployment"),
    ]
    .into_iter()
    .map(|(pattern, value, description)| Rule::new(pattern, value, description))
    .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
