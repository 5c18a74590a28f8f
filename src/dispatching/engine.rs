//! Rule engine for multi-criteria dispatching.
//!
//! Applies rules in sequence: a later rule only decides between variables
//! the earlier ones score equally, and a final tie-breaker settles the rest.
//!
//! # Reference
//! Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

use std::cmp::Ordering;
use std::sync::Arc;

use super::{rules, DispatchingRule};
use crate::cp::PlacementVar;
use crate::error::ConfigError;

/// How ties are broken after all rules are exhausted.
#[derive(Debug, Clone, Default)]
pub enum TieBreaker {
    /// Leave tied variables in input order.
    #[default]
    NextRule,
    /// Deterministic by task ID (lexicographic).
    ById,
}

/// A composable rule engine for variable prioritization.
///
/// # Example
/// ```
/// use u_planner::dispatching::{rules, RuleEngine};
///
/// let engine = RuleEngine::new()
///     .with_rule(rules::Edd)
///     .with_rule(rules::Lpt);
/// ```
#[derive(Clone)]
pub struct RuleEngine {
    rules: Vec<Arc<dyn DispatchingRule>>,
    tie_breaker: TieBreaker,
    epsilon: f64,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            tie_breaker: TieBreaker::NextRule,
            epsilon: 1e-9,
        }
    }

    /// Builds a chain from rule names (see [`rules::by_name`]), in order,
    /// with a `ById` final tie-breaker.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ConfigError> {
        names
            .iter()
            .try_fold(Self::new(), |engine, name| {
                let name = name.as_ref();
                rules::by_name(name)
                    .map(|rule| engine.with_shared_rule(rule))
                    .ok_or_else(|| ConfigError::Invalid(format!("unknown dispatching rule '{name}'")))
            })
            .map(|engine| engine.with_final_tie_breaker(TieBreaker::ById))
    }

    /// Appends a rule; it only decides ties left by the rules before it.
    pub fn with_rule<R: DispatchingRule + 'static>(self, rule: R) -> Self {
        self.with_shared_rule(Arc::new(rule))
    }

    pub fn with_shared_rule(mut self, rule: Arc<dyn DispatchingRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Sets the final tie-breaking strategy.
    pub fn with_final_tie_breaker(mut self, tie_breaker: TieBreaker) -> Self {
        self.tie_breaker = tie_breaker;
        self
    }

    /// Rule names in evaluation order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Sorts variables by priority (highest priority first).
    ///
    /// Returns indices into `vars`. The sort is stable.
    pub fn sort_indices(&self, vars: &[PlacementVar]) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..vars.len()).collect();
        indices.sort_by(|&a, &b| self.compare(&vars[a], &vars[b]));
        indices
    }

    fn compare(&self, a: &PlacementVar, b: &PlacementVar) -> Ordering {
        for rule in &self.rules {
            let score_a = rule.evaluate(a);
            let score_b = rule.evaluate(b);

            if (score_a - score_b).abs() > self.epsilon {
                return score_a.partial_cmp(&score_b).unwrap_or(Ordering::Equal);
            }
        }
        match &self.tie_breaker {
            TieBreaker::NextRule => Ordering::Equal,
            TieBreaker::ById => a.task_id.cmp(&b.task_id),
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("rules", &self.rule_names())
            .field("tie_breaker", &self.tie_breaker)
            .finish()
    }
}
