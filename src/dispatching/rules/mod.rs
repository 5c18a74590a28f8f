//! Built-in dispatching rules.
//!
//! # Categories
//!
//! - **Time-based**: SPT, LPT, WSPT
//! - **Due-date**: EDD, MST, ATC
//! - **Release**: EST
//! - **Structure**: MRC, MIS
//! - **Priority**: PRIORITY
//!
//! # Score Convention
//! All rules return lower scores for higher priority variables.
//!
//! # References
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 4
//! - Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

use std::sync::Arc;

use super::{DispatchingRule, RuleScore};
use crate::cp::PlacementVar;

/// Names accepted by [`by_name`], case-insensitive.
pub const NAMES: [&str; 10] = [
    "spt", "lpt", "wspt", "edd", "mst", "atc", "est", "mrc", "mis", "priority",
];

/// Looks up a built-in rule. `atc` uses the default look-ahead.
pub fn by_name(name: &str) -> Option<Arc<dyn DispatchingRule>> {
    let rule: Arc<dyn DispatchingRule> = match name.to_ascii_lowercase().as_str() {
        "spt" => Arc::new(Spt),
        "lpt" => Arc::new(Lpt),
        "wspt" => Arc::new(Wspt),
        "edd" => Arc::new(Edd),
        "mst" => Arc::new(Mst),
        "atc" => Arc::new(Atc::default()),
        "est" => Arc::new(Est),
        "mrc" => Arc::new(Mrc),
        "mis" => Arc::new(Mis),
        "priority" => Arc::new(Priority),
        _ => return None,
    };
    Some(rule)
}

// ======================== Time-based rules ========================

/// Shortest Processing Time.
///
/// Minimizes average flow time on a single resource.
///
/// # Reference
/// Smith (1956), optimal for minimizing mean flow time on single machine.
#[derive(Debug, Clone, Copy)]
pub struct Spt;

impl DispatchingRule for Spt {
    fn name(&self) -> &'static str {
        "SPT"
    }

    fn evaluate(&self, var: &PlacementVar) -> RuleScore {
        var.duration_ms as f64
    }

    fn description(&self) -> &'static str {
        "Shortest Processing Time"
    }
}

/// Longest Processing Time.
///
/// Places big tasks first. Good load balance on parallel resources.
#[derive(Debug, Clone, Copy)]
pub struct Lpt;

impl DispatchingRule for Lpt {
    fn name(&self) -> &'static str {
        "LPT"
    }

    fn evaluate(&self, var: &PlacementVar) -> RuleScore {
        -(var.duration_ms as f64)
    }

    fn description(&self) -> &'static str {
        "Longest Processing Time"
    }
}

/// Weighted Shortest Processing Time.
///
/// Weight is derived from priority: `weight = priority + 1` (floored at 1).
#[derive(Debug, Clone, Copy)]
pub struct Wspt;

impl DispatchingRule for Wspt {
    fn name(&self) -> &'static str {
        "WSPT"
    }

    fn evaluate(&self, var: &PlacementVar) -> RuleScore {
        if var.duration_ms <= 0 {
            return f64::MAX;
        }
        let weight = (var.priority as f64 + 1.0).max(1.0);
        -(weight / var.duration_ms as f64)
    }

    fn description(&self) -> &'static str {
        "Weighted Shortest Processing Time"
    }
}

// ======================== Due-date rules ========================

/// Earliest Due Date.
///
/// Variables without a deadline come last.
///
/// # Reference
/// Jackson (1955), optimal for minimizing maximum lateness on single machine.
#[derive(Debug, Clone, Copy)]
pub struct Edd;

impl DispatchingRule for Edd {
    fn name(&self) -> &'static str {
        "EDD"
    }

    fn evaluate(&self, var: &PlacementVar) -> RuleScore {
        var.deadline_ms.map(|d| d as f64).unwrap_or(f64::MAX)
    }

    fn description(&self) -> &'static str {
        "Earliest Due Date"
    }
}

/// Minimum Slack Time.
///
/// Slack = deadline - earliest start - duration.
#[derive(Debug, Clone, Copy)]
pub struct Mst;

impl DispatchingRule for Mst {
    fn name(&self) -> &'static str {
        "MST"
    }

    fn evaluate(&self, var: &PlacementVar) -> RuleScore {
        match var.deadline_ms {
            Some(d) => d.saturating_sub(var.start_min).saturating_sub(var.duration_ms) as f64,
            None => f64::MAX,
        }
    }

    fn description(&self) -> &'static str {
        "Minimum Slack Time"
    }
}

/// Apparent Tardiness Cost.
///
/// WSPT scaled by an exponential urgency term. Slack is measured from the
/// variable's earliest start.
///
/// # Reference
/// Vepsalainen & Morton (1987), "Priority Rules for Job Shops with
/// Weighted Tardiness Costs"
#[derive(Debug, Clone, Copy)]
pub struct Atc {
    /// Lookahead parameter (default: 2.0).
    pub k: f64,
}

impl Default for Atc {
    fn default() -> Self {
        Self { k: 2.0 }
    }
}

impl Atc {
    pub fn with_k(k: f64) -> Self {
        Self { k }
    }
}

impl DispatchingRule for Atc {
    fn name(&self) -> &'static str {
        "ATC"
    }

    fn evaluate(&self, var: &PlacementVar) -> RuleScore {
        let p = var.duration_ms as f64;
        if p <= 0.0 {
            return f64::MAX;
        }
        let weight = (var.priority as f64 + 1.0).max(1.0);
        let Some(deadline) = var.deadline_ms else {
            return -(weight / p);
        };
        let slack = deadline as f64 - p - var.start_min as f64;
        let urgency = if slack <= 0.0 {
            1.0
        } else {
            (-slack / (self.k * p)).exp()
        };
        -(weight / p * urgency)
    }

    fn description(&self) -> &'static str {
        "Apparent Tardiness Cost"
    }
}

// ======================== Release rules ========================

/// Earliest Start Time: first come, first placed.
#[derive(Debug, Clone, Copy)]
pub struct Est;

impl DispatchingRule for Est {
    fn name(&self) -> &'static str {
        "EST"
    }

    fn evaluate(&self, var: &PlacementVar) -> RuleScore {
        var.start_min as f64
    }

    fn description(&self) -> &'static str {
        "Earliest Start Time"
    }
}

// ======================== Structure rules ========================

/// Most Resource Constrained: fewest eligible resources first.
#[derive(Debug, Clone, Copy)]
pub struct Mrc;

impl DispatchingRule for Mrc {
    fn name(&self) -> &'static str {
        "MRC"
    }

    fn evaluate(&self, var: &PlacementVar) -> RuleScore {
        var.candidates.len() as f64
    }

    fn description(&self) -> &'static str {
        "Most Resource Constrained"
    }
}

/// Most Immediate Successors.
#[derive(Debug, Clone, Copy)]
pub struct Mis;

impl DispatchingRule for Mis {
    fn name(&self) -> &'static str {
        "MIS"
    }

    fn evaluate(&self, var: &PlacementVar) -> RuleScore {
        -(var.successors.len() as f64)
    }

    fn description(&self) -> &'static str {
        "Most Immediate Successors"
    }
}

// ======================== Priority-based rule ========================

/// Higher `priority` first.
#[derive(Debug, Clone, Copy)]
pub struct Priority;

impl DispatchingRule for Priority {
    fn name(&self) -> &'static str {
        "PRIORITY"
    }

    fn evaluate(&self, var: &PlacementVar) -> RuleScore {
        -(var.priority as f64)
    }

    fn description(&self) -> &'static str {
        "Task Priority"
    }
}
