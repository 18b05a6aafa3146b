//! Route request and result types.

use serde::{Deserialize, Serialize};

use super::errors::RoutingError;

// ─── Criteria ────────────────────────────────────────────────────────────────

/// Caller-supplied optimization preferences for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationCriteria {
    #[serde(alias = "prioritizeSpeed")]
    pub prioritize_speed: bool,
    #[serde(alias = "prioritizeSimplicity")]
    pub prioritize_simplicity: bool,
    #[serde(alias = "prioritizeReliability")]
    pub prioritize_reliability: bool,
    #[serde(alias = "maxComplexity")]
    pub max_complexity: Option<u8>,
    #[serde(alias = "maxDuration", alias = "maxDurationMs")]
    pub max_duration_ms: Option<u64>,
    /// Capability keywords the route should cover.
    #[serde(alias = "requiredCapabilities")]
    pub required_capabilities: Vec<String>,
    /// Bare tool names or `server.tool` names to leave out.
    #[serde(alias = "excludedTools")]
    pub excluded_tools: Vec<String>,
}

impl OptimizationCriteria {
    /// Strategy ranked first: simplicity beats speed, comprehensive otherwise.
    pub fn primary_strategy(&self) -> RouteStrategy {
        if self.prioritize_simplicity {
            RouteStrategy::Simple
        } else if self.prioritize_speed {
            RouteStrategy::Fast
        } else {
            RouteStrategy::Comprehensive
        }
    }
}

// ─── Strategy ────────────────────────────────────────────────────────────────

/// Named route-construction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStrategy {
    /// Fewest, least complex tools.
    Simple,
    /// Quickest tools, each at most 2 s.
    Fast,
    /// Broadest category coverage.
    Comprehensive,
    /// Diverse non-generic tools, offered as a second opinion.
    Alternative,
}

impl RouteStrategy {
    /// The three strategies that can be primary, in fallback order.
    pub const RANKED: [RouteStrategy; 3] = [Self::Simple, Self::Fast, Self::Comprehensive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Fast => "fast",
            Self::Comprehensive => "comprehensive",
            Self::Alternative => "alternative",
        }
    }

    /// Upper bound on tools per route.
    pub fn max_tools(&self) -> usize {
        match self {
            Self::Simple => 2,
            Self::Fast => 3,
            Self::Comprehensive => 5,
            Self::Alternative => 3,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Simple => "Simple route",
            Self::Fast => "Fast route",
            Self::Comprehensive => "Comprehensive route",
            Self::Alternative => "Alternative route",
        }
    }

    /// One-line rationale used in route reasoning.
    pub fn rationale(&self) -> &'static str {
        match self {
            Self::Simple => "minimizes aggregate complexity with the fewest moving parts",
            Self::Fast => "minimizes total duration using only quick tools",
            Self::Comprehensive => "maximizes coverage across capability categories",
            Self::Alternative => "offers a diverse path that avoids generic utility and system tools",
        }
    }
}

impl std::fmt::Display for RouteStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Route Candidate ─────────────────────────────────────────────────────────

/// An ordered tool chain proposed for a task, with cost and confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteCandidate {
    /// Opaque, unique per candidate.
    pub id: String,
    pub name: String,
    pub description: String,
    pub strategy: RouteStrategy,
    /// Qualified `server.tool` names in execution order.
    pub tools: Vec<String>,
    #[serde(alias = "estimatedDuration")]
    pub estimated_duration_ms: u64,
    /// Mean complexity of the selected tools.
    pub complexity: f64,
    /// Always within 0.0..=1.0.
    pub confidence: f64,
    pub reasoning: String,
}

impl RouteCandidate {
    /// Serialize to the external JSON representation.
    pub fn to_json(&self) -> Result<String, RoutingError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from the external JSON representation.
    pub fn from_json(raw: &str) -> Result<Self, RoutingError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Field-for-field equality ignoring the opaque id.
    pub fn same_route(&self, other: &RouteCandidate) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.strategy == other.strategy
            && self.tools == other.tools
            && self.estimated_duration_ms == other.estimated_duration_ms
            && self.complexity == other.complexity
            && self.confidence == other.confidence
            && self.reasoning == other.reasoning
    }
}

/// Round to three decimals so scores survive a text round trip exactly.
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

// ─── Tests ───────────────────────────────────────────────────────────────────
