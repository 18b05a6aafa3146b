//! Shared types for the MCP client.
//!
//! JSON-RPC 2.0 message types, server launch descriptors, and the classified
//! tool descriptors that make up the discovery catalog.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ─── JSON-RPC 2.0 ───────────────────────────────────────────────────────────

/// The only method the query client ever sends.
pub const TOOLS_LIST_METHOD: &str = "tools/list";

/// JSON-RPC 2.0 request message.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: serde_json::Value,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: u64, method: &str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }

    /// The `tools/list` request sent to every server: id 1, empty params.
    pub fn tools_list() -> Self {
        Self::new(1, TOOLS_LIST_METHOD, serde_json::json!({}))
    }
}

/// JSON-RPC 2.0 response message (success or error).
///
/// Servers in the wild are sloppy about `jsonrpc` and `id`, so both are
/// optional here; the query client only cares about `result.tools`.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// One entry of a `result.tools` array as the server reports it.
///
/// Only `name` is mandatory. Servers may pre-classify their own tools, in
/// which case those values win over the heuristic rule tables.
#[derive(Debug, Clone, Deserialize)]
pub struct RawToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "inputSchema")]
    pub input_schema: Option<serde_json::Value>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient::complexity")]
    pub complexity: Option<u8>,
    #[serde(
        default,
        alias = "estimatedDuration",
        alias = "estimated_duration",
        deserialize_with = "lenient::duration_ms"
    )]
    pub estimated_duration_ms: Option<u64>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Deserializers for self-reported tool estimates.
///
/// Any JSON number is accepted and rounded into the field's integer range;
/// the classifier then clamps it to the valid range. Non-numbers read as
/// absent so the rule tables fill them in.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn finite<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value
            .as_ref()
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .map(f64::round))
    }

    pub fn complexity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
        Ok(finite(deserializer)?.map(|v| v.clamp(0.0, f64::from(u8::MAX)) as u8))
    }

    pub fn duration_ms<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        // `as` saturates at u64::MAX
        Ok(finite(deserializer)?.map(|v| v.max(0.0) as u64))
    }
}

// ─── Server Descriptors ──────────────────────────────────────────────────────

/// Where a server descriptor came from.
///
/// The variant order is the precedence order: when two sources describe a
/// server with the same name, the higher-ranked source is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerSource {
    /// Found by the recursive package-manifest search.
    Manifest,
    /// Read from one of the configured server-list files.
    #[default]
    ConfigFile,
    /// Supplied through the `MCP_SERVERS` environment variable.
    Environment,
    /// Statically configured essential server.
    Essential,
}

/// Capability flags a server declares about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default = "default_true")]
    pub tools: bool,
    #[serde(default)]
    pub resources: bool,
    #[serde(default)]
    pub prompts: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: true,
            resources: false,
            prompts: false,
        }
    }
}

/// Launch metadata for a tool-providing server process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Overlaid on top of the ambient environment when spawning.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    #[serde(default)]
    pub source: ServerSource,
}

impl ServerDescriptor {
    /// Convenience constructor used by tests and static configuration.
    pub fn new(name: &str, command: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: BTreeMap::new(),
            capabilities: ServerCapabilities::default(),
            source: ServerSource::ConfigFile,
        }
    }

    /// Return a copy tagged with the given source.
    pub fn with_source(mut self, source: ServerSource) -> Self {
        self.source = source;
        self
    }
}

/// Launch entry as it appears in configuration (name carried by the map key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub capabilities: ServerCapabilities,
}

impl ServerEntry {
    /// Attach a name and source, producing a full descriptor.
    pub fn into_descriptor(self, name: &str, source: ServerSource) -> ServerDescriptor {
        ServerDescriptor {
            name: name.to_string(),
            command: self.command,
            args: self.args,
            env: self.env,
            capabilities: self.capabilities,
            source,
        }
    }
}

// ─── Tool Descriptors ────────────────────────────────────────────────────────

/// Metadata for one invocable capability, with cost estimates.
///
/// `complexity` is always within 1..=10 and `estimated_duration_ms` is always
/// positive; the classifier clamps every value it hands out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "inputSchema")]
    pub input_schema: serde_json::Value,
    #[serde(alias = "serverName")]
    pub server_name: String,
    pub category: String,
    pub complexity: u8,
    #[serde(alias = "estimatedDuration")]
    pub estimated_duration_ms: u64,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl ToolDescriptor {
    /// Fully-qualified `server.tool` name.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.server_name, self.name)
    }

    /// Lower-cased `name description category` haystack for text matching.
    pub fn search_text(&self) -> String {
        format!("{} {} {}", self.name, self.description, self.category).to_lowercase()
    }
}

// ─── Standard JSON-RPC Error Codes ───────────────────────────────────────────

/// Well-known JSON-RPC error codes.
pub mod error_codes {
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
}

// ─── Tests ───────────────────────────────────────────────────────────────────
