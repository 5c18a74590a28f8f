//! Dispatching rules and rule engine.
//!
//! Priority rules order placement variables for list scheduling. The
//! fallback solver uses the chain named by `EngineConfig::fallback_rules`
//! ([`fallback_engine`] by default); the search backend perturbs the order
//! it produces.
//!
//! # Usage
//!
//! ```
//! use u_planner::dispatching::{rules, RuleEngine, TieBreaker};
//!
//! let engine = RuleEngine::new()
//!     .with_rule(rules::Edd)
//!     .with_rule(rules::Spt)
//!     .with_final_tie_breaker(TieBreaker::ById);
//! // let order = engine.sort_indices(&graph.vars);
//!
//! // the same chain, as named in configuration
//! let named = RuleEngine::from_names(&["edd", "spt"]).unwrap();
//! assert_eq!(named.rule_names(), engine.rule_names());
//! ```
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 4
//! - Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

mod engine;
pub mod rules;

pub use engine::{RuleEngine, TieBreaker};

use crate::cp::PlacementVar;
use std::fmt::Debug;

/// Score returned by a dispatching rule.
///
/// Lower scores = higher priority (placed first).
pub type RuleScore = f64;

/// A dispatching rule that evaluates variable priority.
///
/// # Score Convention
/// **Lower score = higher priority.**
pub trait DispatchingRule: Send + Sync + Debug {
    /// Rule name (e.g., "SPT", "EDD").
    fn name(&self) -> &'static str;

    /// Returns a score where lower = higher priority.
    fn evaluate(&self, var: &PlacementVar) -> RuleScore;

    fn description(&self) -> &'static str {
        self.name()
    }
}

/// Default rule chain of the fallback solver: earliest deadline, then
/// longest duration, then task id.
pub fn fallback_engine() -> RuleEngine {
    RuleEngine::new()
        .with_rule(rules::Edd)
        .with_rule(rules::Lpt)
        .with_final_tie_breaker(TieBreaker::ById)
}
