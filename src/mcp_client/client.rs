//! Discovery client: high-level interface over server discovery and tool
//! analysis.
//!
//! Owns the server table and the tool catalog from the last sweep. Mutation
//! needs `&mut self`; hosts that share one client wrap it in a
//! `tokio::sync::Mutex` (see [`crate::SharedDiscovery`]).

use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::discovery::{collect_servers, ServerTable};
use super::lifecycle::query_server_tools;
use super::registry::ToolCatalog;
use super::types::{ServerDescriptor, ToolDescriptor};
use crate::config::{load_config, merge_configs, DiscoveryConfig, EnvSource, PartialDiscoveryConfig};
use crate::heuristics::fallback_tools_for;

// ─── Sweep Report ────────────────────────────────────────────────────────────

/// A server whose live query failed and was replaced by fallback tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackRecord {
    pub server: String,
    /// Error label, see `McpError::kind`.
    pub kind: String,
    pub reason: String,
    pub fallback_tools: usize,
}

/// Outcome of one `analyze_tools` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Servers that answered `tools/list`.
    pub live: Vec<String>,
    /// Servers that fell back, with the reason.
    pub fallbacks: Vec<FallbackRecord>,
    /// Servers not queried because they declare no tool capability.
    pub skipped: Vec<String>,
    pub total_tools: usize,
    pub duration_ms: u64,
}

impl SweepReport {
    pub fn fell_back(&self, server: &str) -> bool {
        self.fallbacks.iter().any(|f| f.server == server)
    }
}

// ─── DiscoveryClient ─────────────────────────────────────────────────────────

/// Discovers servers, queries them concurrently, and exposes the catalog.
pub struct DiscoveryClient {
    config: DiscoveryConfig,
    env: EnvSource,
    servers: ServerTable,
    catalog: ToolCatalog,
    last_sweep: Option<SweepReport>,
    /// Parent of every per-sweep token; cancelled by [`Self::shutdown`].
    cancel: CancellationToken,
}

impl DiscoveryClient {
    /// Create a client from an already-resolved configuration.
    pub fn new(config: DiscoveryConfig, env: EnvSource) -> Self {
        Self {
            config,
            env,
            servers: ServerTable::new(),
            catalog: ToolCatalog::new(),
            last_sweep: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a client configured from the process environment and the
    /// default config search paths.
    pub fn from_environment() -> Self {
        Self::new(load_config(), EnvSource::Process)
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    // ─── Sweep ───────────────────────────────────────────────────────────

    /// Rebuild the server table from every configured source.
    pub fn discover_servers(&mut self) -> Vec<ServerDescriptor> {
        self.servers = collect_servers(&self.config, &self.env);
        self.servers.descriptors()
    }

    /// Query every discovered server concurrently and rebuild the catalog.
    ///
    /// A server that fails (spawn error, timeout, non-zero exit, no listing)
    /// gets the fallback tools matching its name instead. Failures never
    /// escape this call and never delay other servers beyond the timeout.
    pub async fn analyze_tools(&mut self) -> &SweepReport {
        let started = Instant::now();
        let rules = self.config.rule_set();
        let timeout = Duration::from_millis(self.config.query_timeout_ms);
        let sweep_token = self.cancel.child_token();

        let (queryable, skipped): (Vec<_>, Vec<_>) = self
            .servers
            .descriptors()
            .into_iter()
            .partition(|d| d.capabilities.tools);

        tracing::info!(servers = queryable.len(), timeout_ms = self.config.query_timeout_ms, "querying servers");

        let results = join_all(
            queryable
                .iter()
                .map(|descriptor| query_server_tools(descriptor, timeout, &rules, &sweep_token)),
        )
        .await;

        let mut catalog = ToolCatalog::new();
        let mut report = SweepReport {
            skipped: skipped.iter().map(|d| d.name.clone()).collect(),
            ..Default::default()
        };

        for (descriptor, result) in queryable.iter().zip(results) {
            match result {
                Ok(tools) => {
                    tracing::debug!(server = %descriptor.name, tools = tools.len(), "live tool listing");
                    report.live.push(descriptor.name.clone());
                    catalog.register_server_tools(&descriptor.name, tools);
                }
                Err(e) => {
                    let tools =
                        fallback_tools_for(&descriptor.name, &self.config.fallback_tools, &rules);
                    tracing::warn!(
                        server = %descriptor.name,
                        error = %e,
                        fallback_tools = tools.len(),
                        "tool query failed, using fallback tools"
                    );
                    report.fallbacks.push(FallbackRecord {
                        server: descriptor.name.clone(),
                        kind: e.kind().to_string(),
                        reason: e.to_string(),
                        fallback_tools: tools.len(),
                    });
                    catalog.register_server_tools(&descriptor.name, tools);
                }
            }
        }

        report.total_tools = catalog.len();
        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            tools = report.total_tools,
            live = report.live.len(),
            fallbacks = report.fallbacks.len(),
            duration_ms = report.duration_ms,
            "tool analysis complete"
        );

        self.catalog = catalog;
        self.last_sweep.insert(report)
    }

    /// Discover servers, then analyze their tools.
    pub async fn refresh(&mut self) -> &SweepReport {
        self.discover_servers();
        self.analyze_tools().await
    }

    /// Clear servers and tools, then re-run discovery and analysis.
    pub async fn reload_configuration(&mut self) -> &SweepReport {
        self.servers = ServerTable::new();
        self.catalog.clear();
        self.last_sweep = None;
        self.refresh().await
    }

    /// Merge `partial` over the current configuration and reload.
    pub async fn update_configuration(&mut self, partial: PartialDiscoveryConfig) -> &SweepReport {
        self.config = merge_configs(&self.config, partial);
        self.reload_configuration().await
    }

    /// Cancel any in-flight sweep and make later sweeps fail fast into
    /// fallback data.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    /// Servers from the last discovery, in name order.
    pub fn servers(&self) -> Vec<ServerDescriptor> {
        self.servers.descriptors()
    }

    pub fn tools(&self) -> Vec<ToolDescriptor> {
        self.catalog.all_tools()
    }

    pub fn tools_by_category(&self, category: &str) -> Vec<ToolDescriptor> {
        self.catalog.by_category(category)
    }

    pub fn tools_by_server(&self, server: &str) -> Vec<ToolDescriptor> {
        self.catalog.by_server(server)
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn capability_summary(&self) -> String {
        self.catalog.capability_summary()
    }

    pub fn categories(&self) -> Vec<String> {
        self.catalog.categories()
    }

    /// Look up one tool by `server.tool` or bare name.
    pub fn tool(&self, name: &str) -> Option<ToolDescriptor> {
        self.catalog.get_tool(name).cloned()
    }

    pub fn last_sweep(&self) -> Option<&SweepReport> {
        self.last_sweep.as_ref()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
