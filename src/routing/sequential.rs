//! Sequential analyzer: a bounded chain of labelled reasoning steps, a
//! workflow summary, and routes for the recommended strategy.
//!
//! Phrase templates are chosen by a seeded generator (SHA-256 over the seed,
//! the step number and the category), so a given seed always reproduces the
//! same rationale. The seed used is returned with every analysis.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::errors::RoutingError;
use super::optimizer::{eligible_tools, route_for_strategy, ALTERNATIVE_MIN_ELIGIBLE};
use super::types::{round3, OptimizationCriteria, RouteCandidate, RouteStrategy};
use crate::mcp_client::types::ToolDescriptor;

// ─── Constants ───────────────────────────────────────────────────────────────

const BASE_THOUGHTS: usize = 5;
const MAX_THOUGHTS: usize = 15;
/// Creative runs explore extra steps, up to this cap.
const MAX_CREATIVE_THOUGHTS: usize = 20;
const CREATIVE_EXTRA_THOUGHTS: usize = 5;

const COMPLEXITY_KEYWORDS: &[&str] = &["complex", "multiple", "analyze", "comprehensive", "thorough"];

/// Problem text quoted in thoughts is cut to this many characters.
const QUOTE_CHARS: usize = 60;

// ─── Types ───────────────────────────────────────────────────────────────────

/// Knobs for one analysis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    pub enabled: bool,
    /// Allow a longer chain of thoughts.
    pub creative: bool,
    /// Template-selection seed. A random one is drawn and reported when absent.
    pub seed: Option<u64>,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            creative: false,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtCategory {
    Analysis,
    Categorization,
    Optimization,
    Planning,
    Evaluation,
}

impl ThoughtCategory {
    const ORDER: [ThoughtCategory; 5] = [
        Self::Analysis,
        Self::Categorization,
        Self::Optimization,
        Self::Planning,
        Self::Evaluation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Categorization => "categorization",
            Self::Optimization => "optimization",
            Self::Planning => "planning",
            Self::Evaluation => "evaluation",
        }
    }

    /// Phase for step `index` (0-based) of `total`: the chain walks the five
    /// categories in order, spreading steps evenly.
    fn for_step(index: usize, total: usize) -> Self {
        let phase = (index * Self::ORDER.len()) / total.max(1);
        Self::ORDER[phase.min(Self::ORDER.len() - 1)]
    }

    fn templates(&self) -> &'static [&'static str] {
        match self {
            Self::Analysis => &[
                "Breaking down the problem \"{problem}\" into its core requirements.",
                "The request \"{problem}\" needs to be mapped onto {tools} available tools.",
                "Identifying what a successful outcome looks like for \"{problem}\".",
            ],
            Self::Categorization => &[
                "Grouping the {tools} tools by category to see which capabilities overlap.",
                "Separating read-only tools from mutating ones among the {tools} candidates.",
                "Sorting candidate tools by how directly they address the request.",
            ],
            Self::Optimization => &[
                "Weighing cost against coverage under a {strategy} preference.",
                "Dropping tools above complexity {max_complexity} and trimming redundant steps.",
                "Checking which ordering keeps the {strategy} route shortest.",
            ],
            Self::Planning => &[
                "Sequencing the selected tools so each step feeds the next.",
                "Drafting a {strategy} plan with a fallback if a step fails.",
                "Placing quick validation steps before expensive ones.",
            ],
            Self::Evaluation => &[
                "Step {step} of {total}: the {strategy} route covers the stated goal.",
                "Reviewing remaining risks before committing to the {strategy} route.",
                "Confirming the plan stays within the requested limits.",
            ],
        }
    }
}

/// One labelled reasoning step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThoughtEntry {
    /// 1-based position in the chain.
    pub step: usize,
    pub category: ThoughtCategory,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    Low,
    Medium,
    High,
}

/// Summary of the problem and the recommended approach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowAnalysis {
    pub complexity: ComplexityTier,
    pub keyword_hits: usize,
    pub recommended_strategy: RouteStrategy,
    pub insights: Vec<String>,
    pub challenges: Vec<String>,
}

/// Full result of [`SequentialAnalyzer::analyze_workflow`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequentialAnalysis {
    /// Seed that reproduces `thoughts`.
    pub seed: u64,
    pub thoughts: Vec<ThoughtEntry>,
    pub analysis: WorkflowAnalysis,
    pub routes: Vec<RouteCandidate>,
    pub confidence: f64,
}

// ─── Analyzer ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct SequentialAnalyzer {
    settings: AnalyzerSettings,
}

impl SequentialAnalyzer {
    pub fn new(settings: AnalyzerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Analyze `problem` against `tools` and propose routes.
    ///
    /// Fails when analysis is disabled or the problem is blank.
    pub fn analyze_workflow(
        &self,
        problem: &str,
        tools: &[ToolDescriptor],
        criteria: &OptimizationCriteria,
    ) -> Result<SequentialAnalysis, RoutingError> {
        if !self.settings.enabled {
            return Err(RoutingError::AnalysisUnavailable {
                reason: "sequential analysis is disabled".into(),
            });
        }
        if problem.trim().is_empty() {
            return Err(RoutingError::EmptyInput { field: "problem" });
        }

        let seed = self.settings.seed.unwrap_or_else(random_seed);
        let budget = thought_budget(problem, tools, self.settings.creative);
        let thoughts = synthesize_thoughts(problem, tools.len(), criteria, budget, seed);
        let analysis = summarize_workflow(problem, criteria);
        let confidence = analysis_confidence(&thoughts, &analysis);

        let mut routes = Vec::new();
        if let Some(route) = route_for_strategy(analysis.recommended_strategy, problem, tools, criteria) {
            routes.push(route);
        }
        if eligible_tools(tools, criteria).len() > ALTERNATIVE_MIN_ELIGIBLE {
            if let Some(route) = route_for_strategy(RouteStrategy::Alternative, problem, tools, criteria) {
                routes.push(route);
            }
        }
        for route in &mut routes {
            route.confidence = confidence;
            route
                .reasoning
                .push_str(&format!(" Backed by {} reasoning steps.", thoughts.len()));
        }

        tracing::debug!(
            seed,
            thoughts = thoughts.len(),
            tier = ?analysis.complexity,
            strategy = %analysis.recommended_strategy,
            routes = routes.len(),
            "workflow analysis complete"
        );

        Ok(SequentialAnalysis {
            seed,
            thoughts,
            analysis,
            routes,
            confidence,
        })
    }
}

// ─── Steps ───────────────────────────────────────────────────────────────────

/// Number of reasoning steps for a problem.
pub fn thought_budget(problem: &str, tools: &[ToolDescriptor], creative: bool) -> usize {
    let length = problem.chars().count();
    let mut budget = BASE_THOUGHTS;
    if length > 200 {
        budget += 2;
    }
    if length > 500 {
        budget += 2;
    }
    if tools.len() > 5 {
        budget += 1;
    }
    if tools.len() > 10 {
        budget += 1;
    }
    if !tools.is_empty() {
        let average =
            tools.iter().map(|t| t.complexity as f64).sum::<f64>() / tools.len() as f64;
        if average > 5.0 {
            budget += 2;
        }
    }

    if creative {
        (budget + CREATIVE_EXTRA_THOUGHTS).min(MAX_CREATIVE_THOUGHTS)
    } else {
        budget.min(MAX_THOUGHTS)
    }
}

fn synthesize_thoughts(
    problem: &str,
    tool_count: usize,
    criteria: &OptimizationCriteria,
    budget: usize,
    seed: u64,
) -> Vec<ThoughtEntry> {
    let quoted = quote(problem);
    let strategy = criteria.primary_strategy();
    let max_complexity = criteria
        .max_complexity
        .map(|c| c.to_string())
        .unwrap_or_else(|| "10".to_string());

    (0..budget)
        .map(|index| {
            let category = ThoughtCategory::for_step(index, budget);
            let templates = category.templates();
            let template = templates[seeded_index(seed, index, category, templates.len())];
            let content = template
                .replace("{problem}", &quoted)
                .replace("{tools}", &tool_count.to_string())
                .replace("{strategy}", strategy.as_str())
                .replace("{max_complexity}", &max_complexity)
                .replace("{step}", &(index + 1).to_string())
                .replace("{total}", &budget.to_string());
            ThoughtEntry {
                step: index + 1,
                category,
                content,
            }
        })
        .collect()
}

/// Deterministic index in `0..len` from the seed, step and category.
fn seeded_index(seed: u64, step: usize, category: ThoughtCategory, len: usize) -> usize {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update((step as u64).to_le_bytes());
    hasher.update(category.as_str().as_bytes());
    let digest = hasher.finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_le_bytes(head) % len.max(1) as u64) as usize
}

fn random_seed() -> u64 {
    let bytes = Uuid::new_v4().into_bytes();
    let mut head = [0u8; 8];
    head.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(head)
}

fn quote(problem: &str) -> String {
    let trimmed = problem.trim();
    match trimmed.char_indices().nth(QUOTE_CHARS) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

// ─── Summary ─────────────────────────────────────────────────────────────────

/// Classify the problem and pick the recommended strategy.
pub fn summarize_workflow(problem: &str, criteria: &OptimizationCriteria) -> WorkflowAnalysis {
    let lower = problem.to_lowercase();
    let length = problem.chars().count();
    let keyword_hits = COMPLEXITY_KEYWORDS.iter().filter(|k| lower.contains(*k)).count();

    let complexity = if length > 500 || keyword_hits >= 3 {
        ComplexityTier::High
    } else if length > 200 || keyword_hits >= 1 {
        ComplexityTier::Medium
    } else {
        ComplexityTier::Low
    };

    WorkflowAnalysis {
        complexity,
        keyword_hits,
        recommended_strategy: criteria.primary_strategy(),
        insights: vec![
            "Break the task into independently verifiable steps.".to_string(),
            "Prefer tools whose category matches the request directly.".to_string(),
            "Keep intermediate results small so later steps stay fast.".to_string(),
        ],
        challenges: vec![
            "A server may be unavailable and answer only with fallback tools.".to_string(),
            "Tool cost estimates are heuristic and may differ in practice.".to_string(),
        ],
    }
}

/// `0.5 + min(0.05·thoughts, 0.3)`, +0.1 with at least three insights, +0.1
/// with at least two challenges, capped at 1.0.
pub fn analysis_confidence(thoughts: &[ThoughtEntry], analysis: &WorkflowAnalysis) -> f64 {
    let mut confidence = 0.5 + (0.05 * thoughts.len() as f64).min(0.3);
    if analysis.insights.len() >= 3 {
        confidence += 0.1;
    }
    if analysis.challenges.len() >= 2 {
        confidence += 0.1;
    }
    round3(confidence.min(1.0))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
