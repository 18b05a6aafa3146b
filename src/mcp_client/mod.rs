//! MCP Client: server discovery and `tools/list` querying over stdio.
//!
//! This module handles:
//! - Collecting server descriptors from config files, manifests and env
//! - Spawning one short-lived process per server query
//! - JSON-RPC 2.0 framing over process stdio
//! - Classifying reported tools and substituting fallback tools on failure
//! - The aggregated tool catalog consumed by the route optimizer

pub mod client;
pub mod discovery;
pub mod errors;
pub mod lifecycle;
pub mod registry;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{DiscoveryClient, FallbackRecord, SweepReport};
pub use discovery::{collect_servers, ServerTable};
pub use errors::McpError;
pub use lifecycle::{query_server_tools, ProcessState, ServerQuery};
pub use registry::ToolCatalog;
pub use types::{ServerCapabilities, ServerDescriptor, ServerEntry, ServerSource, ToolDescriptor};
