//! Route planning: turn the tool catalog into ranked route candidates.
//!
//! - `optimizer`: filter, score and assemble one route per named strategy
//! - `sequential`: seeded step-by-step rationale feeding extra routes

pub mod errors;
pub mod optimizer;
pub mod sequential;
pub mod types;

pub use errors::RoutingError;
pub use optimizer::generate_routes;
pub use sequential::{AnalyzerSettings, SequentialAnalysis, SequentialAnalyzer};
pub use types::{OptimizationCriteria, RouteCandidate, RouteStrategy};
