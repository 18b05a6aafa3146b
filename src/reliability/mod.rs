//! Reliability Manager: retry with backoff, rolling metrics, health and
//! enhanced error reports for any externally visible operation.

pub mod enhanced;
pub mod errors;
pub mod manager;
pub mod metrics;
pub mod policy;

pub use enhanced::{format_enhanced_error, EnhancedError};
pub use errors::ReliabilityError;
pub use manager::ReliabilityManager;
pub use metrics::{HealthReport, HealthStatus, ReliabilityMetrics};
pub use policy::RetryPolicy;
