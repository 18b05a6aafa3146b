//! Route planner: the entry point a hosting layer calls into.
//!
//! Ties together the shared discovery client, the route optimizer, the
//! sequential analyzer and one reliability manager. Requests are validated
//! against the schema table before any work happens; route generation runs
//! under the retry policy.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::mcp_client::{DiscoveryClient, SweepReport, ToolDescriptor};
use crate::reliability::{format_enhanced_error, EnhancedError, HealthReport, ReliabilityError, ReliabilityManager};
use crate::routing::{
    generate_routes, AnalyzerSettings, OptimizationCriteria, RouteCandidate, RoutingError,
    SequentialAnalysis, SequentialAnalyzer,
};
use crate::schemas::SchemaId;
use crate::{SharedDiscovery, TokioMutex};

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Reliability(#[from] ReliabilityError),

    #[error(transparent)]
    Routing(#[from] RoutingError),
}

impl PlannerError {
    /// Enhanced report for this failure.
    pub fn enhance(&self, operation: &str, arguments: &Value) -> EnhancedError {
        match self {
            Self::Reliability(e) => e.enhance(operation, arguments),
            Self::Routing(e) => format_enhanced_error("RoutingError", &e.to_string(), operation, arguments),
        }
    }
}

// ─── Requests ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRoutesRequest {
    pub task: String,
    #[serde(default)]
    pub criteria: OptimizationCriteria,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeWorkflowRequest {
    pub problem: String,
    #[serde(default)]
    pub criteria: OptimizationCriteria,
    #[serde(default)]
    pub creative: bool,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn parse_request<T: serde::de::DeserializeOwned>(
    input: &Value,
    operation: &str,
) -> Result<T, ReliabilityError> {
    serde_json::from_value(input.clone()).map_err(|e| ReliabilityError::Validation {
        operation: operation.to_string(),
        reason: e.to_string(),
    })
}

// ─── RoutePlanner ────────────────────────────────────────────────────────────

pub struct RoutePlanner {
    discovery: SharedDiscovery,
    reliability: ReliabilityManager,
}

impl RoutePlanner {
    pub fn new(client: DiscoveryClient, reliability: ReliabilityManager) -> Self {
        Self {
            discovery: Arc::new(TokioMutex::new(client)),
            reliability,
        }
    }

    /// Planner configured from the process environment with the default
    /// retry policy.
    pub fn from_environment() -> Self {
        Self::new(DiscoveryClient::from_environment(), ReliabilityManager::default())
    }

    pub fn discovery(&self) -> SharedDiscovery {
        Arc::clone(&self.discovery)
    }

    pub fn reliability(&self) -> &ReliabilityManager {
        &self.reliability
    }

    /// Re-run discovery and tool analysis.
    pub async fn refresh(&self) -> SweepReport {
        self.discovery.lock().await.refresh().await.clone()
    }

    /// The catalog, sweeping first if no sweep has run yet.
    pub async fn tools(&self) -> Vec<ToolDescriptor> {
        let mut client = self.discovery.lock().await;
        ensure_catalog(&mut client).await;
        client.tools()
    }

    /// Ranked routes for `task` over the current catalog.
    pub async fn plan(
        &self,
        task: &str,
        criteria: &OptimizationCriteria,
    ) -> Result<Vec<RouteCandidate>, PlannerError> {
        self.reliability
            .validate_input(SchemaId::GenerateRoutes, &json!({ "task": task }), "generate_routes")?;

        let discovery = &self.discovery;
        let routes = self
            .reliability
            .execute_with_retry("generate_routes", move || async move {
                let mut client = discovery.lock().await;
                ensure_catalog(&mut client).await;
                anyhow::Ok(generate_routes(task, &client.tools(), criteria))
            })
            .await?;
        Ok(routes)
    }

    /// Step-by-step analysis of `problem` with routes for the recommended
    /// strategy.
    pub async fn analyze(
        &self,
        problem: &str,
        criteria: &OptimizationCriteria,
        creative: bool,
        seed: Option<u64>,
    ) -> Result<SequentialAnalysis, PlannerError> {
        self.reliability.validate_input(
            SchemaId::AnalyzeWorkflow,
            &json!({ "problem": problem }),
            "analyze_workflow",
        )?;

        let mut client = self.discovery.lock().await;
        let analyzer = SequentialAnalyzer::new(AnalyzerSettings {
            enabled: client.config().sequential_analysis_enabled,
            creative,
            seed,
        });
        if !analyzer.settings().enabled {
            return Err(RoutingError::AnalysisUnavailable {
                reason: "disabled in discovery configuration".into(),
            }
            .into());
        }

        ensure_catalog(&mut client).await;
        Ok(analyzer.analyze_workflow(problem, &client.tools(), criteria)?)
    }

    /// JSON entry point for `generate_routes`.
    pub async fn handle_generate_routes(&self, input: &Value) -> Result<Vec<RouteCandidate>, PlannerError> {
        self.reliability
            .validate_input(SchemaId::GenerateRoutes, input, "generate_routes")?;
        let request: GenerateRoutesRequest = parse_request(input, "generate_routes")?;
        self.plan(&request.task, &request.criteria).await
    }

    /// JSON entry point for `analyze_workflow`.
    pub async fn handle_analyze_workflow(&self, input: &Value) -> Result<SequentialAnalysis, PlannerError> {
        self.reliability
            .validate_input(SchemaId::AnalyzeWorkflow, input, "analyze_workflow")?;
        let request: AnalyzeWorkflowRequest = parse_request(input, "analyze_workflow")?;
        self.analyze(&request.problem, &request.criteria, request.creative, request.seed)
            .await
    }

    pub fn health_check(&self) -> HealthReport {
        self.reliability.health_check()
    }
}

async fn ensure_catalog(client: &mut DiscoveryClient) {
    if client.last_sweep().is_none() {
        client.refresh().await;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
