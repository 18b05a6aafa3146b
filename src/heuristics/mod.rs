//! Heuristic Classifier: rule tables for tool categorisation and cost
//! estimates, plus the fallback tool table used when a server can't be queried.

pub mod fallback;
pub mod rules;

pub use fallback::{default_fallback_rules, fallback_tools_for, FallbackRule, FallbackTool};
pub use rules::{Classification, Rule, RuleSet};
