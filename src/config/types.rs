//! Discovery configuration types and field-by-field merging.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::heuristics::{default_fallback_rules, FallbackRule, Rule, RuleSet};
use crate::mcp_client::types::ServerEntry;

// ─── Defaults ────────────────────────────────────────────────────────────────

/// Default per-server query timeout (ms).
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 5_000;

/// Default depth of the recursive package-manifest search.
pub const DEFAULT_MANIFEST_DEPTH: usize = 3;

fn default_config_paths() -> Vec<String> {
    [
        "./mcp-servers.json",
        "./.mcp/servers.json",
        "./.mcp.json",
        "~/.config/mcp/servers.json",
        "~/.mcp/servers.json",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

// ─── Types ───────────────────────────────────────────────────────────────────

/// Bounded recursive search for package manifests declaring MCP servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestSearch {
    pub enabled: bool,
    pub root: String,
    #[serde(alias = "maxDepth")]
    pub max_depth: usize,
}

impl Default for ManifestSearch {
    fn default() -> Self {
        Self {
            enabled: true,
            root: ".".to_string(),
            max_depth: DEFAULT_MANIFEST_DEPTH,
        }
    }
}

/// Fully-resolved discovery configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Server-list files to read, in order. `~/` and `./` are expanded.
    pub config_paths: Vec<String>,
    /// Statically configured servers that are always part of the catalog.
    pub essential_servers: BTreeMap<String, ServerEntry>,
    pub fallback_tools: Vec<FallbackRule>,
    pub category_rules: Vec<Rule<String>>,
    pub complexity_rules: Vec<Rule<u8>>,
    pub duration_rules: Vec<Rule<u64>>,
    pub query_timeout_ms: u64,
    pub manifest_search: ManifestSearch,
    pub sequential_analysis_enabled: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let rules = RuleSet::default();
        Self {
            config_paths: default_config_paths(),
            essential_servers: BTreeMap::new(),
            fallback_tools: default_fallback_rules(),
            category_rules: rules.category,
            complexity_rules: rules.complexity,
            duration_rules: rules.duration,
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
            manifest_search: ManifestSearch::default(),
            sequential_analysis_enabled: true,
        }
    }
}

impl DiscoveryConfig {
    /// The three rule tables bundled for the classifier.
    pub fn rule_set(&self) -> RuleSet {
        RuleSet {
            category: self.category_rules.clone(),
            complexity: self.complexity_rules.clone(),
            duration: self.duration_rules.clone(),
        }
    }
}

/// A configuration fragment from one source. Absent fields leave the base
/// value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialDiscoveryConfig {
    #[serde(alias = "configPaths")]
    pub config_paths: Option<Vec<String>>,
    #[serde(alias = "essentialServers")]
    pub essential_servers: Option<BTreeMap<String, ServerEntry>>,
    #[serde(alias = "fallbackTools")]
    pub fallback_tools: Option<Vec<FallbackRule>>,
    #[serde(alias = "categoryRules")]
    pub category_rules: Option<Vec<Rule<String>>>,
    #[serde(alias = "complexityRules")]
    pub complexity_rules: Option<Vec<Rule<u8>>>,
    #[serde(alias = "durationRules")]
    pub duration_rules: Option<Vec<Rule<u64>>>,
    #[serde(alias = "queryTimeoutMs", alias = "timeout")]
    pub query_timeout_ms: Option<u64>,
    #[serde(alias = "manifestSearch")]
    pub manifest_search: Option<ManifestSearch>,
    #[serde(alias = "sequentialAnalysisEnabled")]
    pub sequential_analysis_enabled: Option<bool>,
}

// ─── Merge ───────────────────────────────────────────────────────────────────

fn non_empty_vec<T>(value: Option<Vec<T>>) -> Option<Vec<T>> {
    value.filter(|v| !v.is_empty())
}

/// Merge a fragment over a base configuration.
///
/// A field is overridden only when the fragment carries a non-empty value.
/// Lists and maps are replaced wholesale, never concatenated.
pub fn merge_configs(base: &DiscoveryConfig, partial: PartialDiscoveryConfig) -> DiscoveryConfig {
    let mut merged = base.clone();

    if let Some(paths) = non_empty_vec(partial.config_paths) {
        merged.config_paths = paths;
    }
    if let Some(servers) = partial.essential_servers.filter(|m| !m.is_empty()) {
        merged.essential_servers = servers;
    }
    if let Some(fallback) = non_empty_vec(partial.fallback_tools) {
        merged.fallback_tools = fallback;
    }
    if let Some(rules) = non_empty_vec(partial.category_rules) {
        merged.category_rules = rules;
    }
    if let Some(rules) = non_empty_vec(partial.complexity_rules) {
        merged.complexity_rules = rules;
    }
    if let Some(rules) = non_empty_vec(partial.duration_rules) {
        merged.duration_rules = rules;
    }
    if let Some(timeout) = partial.query_timeout_ms.filter(|t| *t > 0) {
        merged.query_timeout_ms = timeout;
    }
    if let Some(search) = partial.manifest_search {
        merged.manifest_search = search;
    }
    if let Some(enabled) = partial.sequential_analysis_enabled {
        merged.sequential_analysis_enabled = enabled;
    }

    merged
}

// ─── Environment ─────────────────────────────────────────────────────────────

/// Where environment variables are read from.
///
/// `Fixed` lets tests exercise env-driven behavior without touching the
/// process environment.
#[derive(Debug, Clone, Default)]
pub enum EnvSource {
    #[default]
    Process,
    Fixed(HashMap<String, String>),
}

impl EnvSource {
    /// Build a fixed environment from `(key, value)` pairs.
    pub fn fixed<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Fixed(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Look up a variable. Empty values count as unset.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match self {
            Self::Process => std::env::var(key).ok(),
            Self::Fixed(vars) => vars.get(key).cloned(),
        };
        value.filter(|v| !v.trim().is_empty())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
