//! Route optimizer: filter the catalog, score tools against the task, and
//! assemble one route per named strategy.
//!
//! Every strategy draws from the same relevance pool (tools that score above
//! zero, or every eligible tool when nothing scores), so the simple route's
//! mean complexity is never above any other route's.

use std::collections::HashSet;

use uuid::Uuid;

use super::types::{round3, OptimizationCriteria, RouteCandidate, RouteStrategy};
use crate::mcp_client::types::ToolDescriptor;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Per-tool duration ceiling for the fast strategy (ms).
pub const FAST_TOOL_MAX_DURATION_MS: u64 = 2_000;

/// The alternative route is offered only above this many eligible tools.
pub const ALTERNATIVE_MIN_ELIGIBLE: usize = 5;

/// Categories the alternative strategy leaves out.
const GENERIC_CATEGORIES: &[&str] = &["utility", "system"];

/// Task words shorter than this are ignored for scoring.
const MIN_KEYWORD_LEN: usize = 3;

const NAME_HIT: u32 = 3;
const CATEGORY_HIT: u32 = 2;
const DESCRIPTION_HIT: u32 = 1;

// ─── Scoring ─────────────────────────────────────────────────────────────────

/// A tool with its relevance score for one task.
#[derive(Debug, Clone, Copy)]
pub struct ScoredTool<'a> {
    pub tool: &'a ToolDescriptor,
    pub score: u32,
}

/// Lower-cased, de-duplicated task words of at least three characters.
pub fn task_keywords(task: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    task.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_KEYWORD_LEN)
        .filter(|w| seen.insert(w.to_string()))
        .map(String::from)
        .collect()
}

/// Textual overlap between task keywords and a tool.
pub fn relevance_score(tool: &ToolDescriptor, keywords: &[String]) -> u32 {
    let name = tool.name.to_lowercase();
    let category = tool.category.to_lowercase();
    let description = tool.description.to_lowercase();

    keywords
        .iter()
        .map(|word| {
            let mut score = 0;
            if name.contains(word.as_str()) {
                score += NAME_HIT;
            }
            if category.contains(word.as_str()) {
                score += CATEGORY_HIT;
            }
            if description.contains(word.as_str()) {
                score += DESCRIPTION_HIT;
            }
            score
        })
        .sum()
}

/// Whether `tool` is named (bare or qualified) in `excluded`.
fn is_excluded(tool: &ToolDescriptor, excluded: &[String]) -> bool {
    let qualified = tool.qualified_name();
    excluded.iter().any(|ex| *ex == tool.name || *ex == qualified)
}

/// Apply the exclusion list and the complexity and duration ceilings.
pub fn eligible_tools<'a>(
    tools: &'a [ToolDescriptor],
    criteria: &OptimizationCriteria,
) -> Vec<&'a ToolDescriptor> {
    tools
        .iter()
        .filter(|t| !is_excluded(t, &criteria.excluded_tools))
        .filter(|t| criteria.max_complexity.map_or(true, |max| t.complexity <= max))
        .filter(|t| criteria.max_duration_ms.map_or(true, |max| t.estimated_duration_ms <= max))
        .collect()
}

/// Score and sort: score descending, then tool name, then server name.
pub fn rank_tools<'a>(task: &str, tools: &[&'a ToolDescriptor]) -> Vec<ScoredTool<'a>> {
    let keywords = task_keywords(task);
    let mut ranked: Vec<ScoredTool<'a>> = tools
        .iter()
        .map(|tool| ScoredTool {
            tool,
            score: relevance_score(tool, &keywords),
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.tool.name.cmp(&b.tool.name))
            .then_with(|| a.tool.server_name.cmp(&b.tool.server_name))
    });
    ranked
}

/// Tools that scored, or everything when nothing did.
fn relevance_pool<'a>(ranked: &[ScoredTool<'a>]) -> Vec<ScoredTool<'a>> {
    let relevant: Vec<ScoredTool<'a>> = ranked.iter().copied().filter(|s| s.score > 0).collect();
    if relevant.is_empty() {
        ranked.to_vec()
    } else {
        relevant
    }
}

// ─── Strategy Selection ──────────────────────────────────────────────────────

fn select_tools<'a>(strategy: RouteStrategy, pool: &[ScoredTool<'a>]) -> Vec<&'a ToolDescriptor> {
    let limit = strategy.max_tools();

    match strategy {
        RouteStrategy::Simple => {
            let Some(min) = pool.iter().map(|s| s.tool.complexity).min() else {
                return Vec::new();
            };
            pool.iter()
                .filter(|s| s.tool.complexity == min)
                .take(limit)
                .map(|s| s.tool)
                .collect()
        }
        RouteStrategy::Fast => {
            let mut quick: Vec<&ScoredTool<'a>> = pool
                .iter()
                .filter(|s| s.tool.estimated_duration_ms <= FAST_TOOL_MAX_DURATION_MS)
                .collect();
            // stable: equal durations keep relevance order
            quick.sort_by_key(|s| s.tool.estimated_duration_ms);
            quick.into_iter().take(limit).map(|s| s.tool).collect()
        }
        RouteStrategy::Comprehensive => {
            let mut categories = HashSet::new();
            let mut selected: Vec<&'a ToolDescriptor> = pool
                .iter()
                .filter(|s| categories.insert(s.tool.category.as_str()))
                .take(limit)
                .map(|s| s.tool)
                .collect();
            for scored in pool {
                if selected.len() >= limit {
                    break;
                }
                if !selected.iter().any(|t| std::ptr::eq(*t, scored.tool)) {
                    selected.push(scored.tool);
                }
            }
            selected
        }
        RouteStrategy::Alternative => {
            let mut categories = HashSet::new();
            pool.iter()
                .filter(|s| !GENERIC_CATEGORIES.contains(&s.tool.category.as_str()))
                .filter(|s| categories.insert(s.tool.category.as_str()))
                .take(limit)
                .map(|s| s.tool)
                .collect()
        }
    }
}

// ─── Candidate Assembly ──────────────────────────────────────────────────────

/// Required capabilities that no selected tool mentions.
pub fn unmet_capabilities(selected: &[&ToolDescriptor], required: &[String]) -> Vec<String> {
    let haystacks: Vec<String> = selected.iter().map(|t| t.search_text()).collect();
    required
        .iter()
        .filter(|cap| {
            let needle = cap.trim().to_lowercase();
            !needle.is_empty() && !haystacks.iter().any(|h| h.contains(&needle))
        })
        .cloned()
        .collect()
}

/// `0.5 + min(0.08·n, 0.4) − 0.15·unmet`, plus 0.05 for short chains when
/// reliability is prioritized, clamped to 0.0..=1.0.
pub fn route_confidence(tool_count: usize, unmet: usize, criteria: &OptimizationCriteria) -> f64 {
    let mut confidence = 0.5 + (0.08 * tool_count as f64).min(0.4) - 0.15 * unmet as f64;
    if criteria.prioritize_reliability && tool_count <= 3 {
        confidence += 0.05;
    }
    round3(confidence.clamp(0.0, 1.0))
}

/// Assemble a candidate from an already-selected, ordered tool list.
pub fn build_route(
    strategy: RouteStrategy,
    selected: &[&ToolDescriptor],
    criteria: &OptimizationCriteria,
) -> RouteCandidate {
    let names: Vec<String> = selected.iter().map(|t| t.qualified_name()).collect();
    let duration: u64 = selected.iter().map(|t| t.estimated_duration_ms).sum();
    let complexity = if selected.is_empty() {
        0.0
    } else {
        selected.iter().map(|t| t.complexity as f64).sum::<f64>() / selected.len() as f64
    };
    let unmet = unmet_capabilities(selected, &criteria.required_capabilities);

    let mut reasoning = format!(
        "{} {} using {} tool{} (~{duration}ms, mean complexity {:.1}).",
        strategy.display_name(),
        strategy.rationale(),
        selected.len(),
        if selected.len() == 1 { "" } else { "s" },
        complexity,
    );
    if !unmet.is_empty() {
        reasoning.push_str(&format!(" Missing capabilities: {}.", unmet.join(", ")));
    }
    if criteria.prioritize_reliability && selected.len() <= 3 {
        reasoning.push_str(" Short chain favoured for reliability.");
    }

    RouteCandidate {
        id: Uuid::new_v4().to_string(),
        name: strategy.display_name().to_string(),
        description: format!("{} chain: {}", strategy.as_str(), names.join(" -> ")),
        strategy,
        tools: names,
        estimated_duration_ms: duration,
        complexity: round3(complexity),
        confidence: route_confidence(selected.len(), unmet.len(), criteria),
        reasoning,
    }
}

/// Build the route for one strategy over `tools`, if the strategy finds any
/// suitable tool.
pub fn route_for_strategy(
    strategy: RouteStrategy,
    task: &str,
    tools: &[ToolDescriptor],
    criteria: &OptimizationCriteria,
) -> Option<RouteCandidate> {
    let eligible = eligible_tools(tools, criteria);
    let pool = relevance_pool(&rank_tools(task, &eligible));
    let selected = select_tools(strategy, &pool);
    if selected.is_empty() {
        return None;
    }
    Some(build_route(strategy, &selected, criteria))
}

/// Generate ranked route candidates for `task` over the tool catalog.
///
/// Order: the primary strategy, the other two of simple/fast/comprehensive
/// in that order, then the alternative route when more than five tools are
/// eligible. Strategies that find no suitable tool are left out.
pub fn generate_routes(
    task: &str,
    tools: &[ToolDescriptor],
    criteria: &OptimizationCriteria,
) -> Vec<RouteCandidate> {
    let eligible = eligible_tools(tools, criteria);
    if eligible.is_empty() {
        tracing::debug!(catalog = tools.len(), "no eligible tools for route generation");
        return Vec::new();
    }

    let pool = relevance_pool(&rank_tools(task, &eligible));

    let primary = criteria.primary_strategy();
    let mut order = vec![primary];
    order.extend(RouteStrategy::RANKED.iter().copied().filter(|s| *s != primary));
    if eligible.len() > ALTERNATIVE_MIN_ELIGIBLE {
        order.push(RouteStrategy::Alternative);
    }

    let routes: Vec<RouteCandidate> = order
        .into_iter()
        .filter_map(|strategy| {
            let selected = select_tools(strategy, &pool);
            (!selected.is_empty()).then(|| build_route(strategy, &selected, criteria))
        })
        .collect();

    tracing::debug!(
        eligible = eligible.len(),
        pool = pool.len(),
        routes = routes.len(),
        primary = %primary,
        "generated routes"
    );
    routes
}

// ─── Tests ───────────────────────────────────────────────────────────────────
