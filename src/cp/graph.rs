//! Solver-neutral constraint graph.
//!
//! Nodes are placement variables (one per task: which resource, which start).
//! Edges are generic relations: ordering (precedence), cumulative
//! (capacity), disjunctive (exclusion). Windows are folded into each
//! variable's start domain.

use crate::models::{Constraint, TimeWindow};

/// Index of a placement variable (tasks sorted by id).
pub type VarId = usize;

/// Index of a resource slot (resources sorted by id).
pub type ResourceIdx = usize;

/// A task placement variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementVar {
    pub id: VarId,
    pub task_id: String,
    pub duration_ms: i64,
    /// Eligible resources, ascending.
    pub candidates: Vec<ResourceIdx>,
    /// Start domain lower bound.
    pub start_min: i64,
    /// Start domain upper bound. `start_max < start_min` = empty domain.
    pub start_max: i64,
    /// Latest end from window relations, if bounded.
    pub deadline_ms: Option<i64>,
    pub priority: i32,
    /// `(predecessor, min_delay_ms)` pairs.
    pub predecessors: Vec<(VarId, i64)>,
    pub successors: Vec<VarId>,
    /// Disjunctive groups this variable belongs to.
    pub groups: Vec<usize>,
}

impl PlacementVar {
    pub fn has_empty_domain(&self) -> bool {
        self.start_max < self.start_min || self.candidates.is_empty()
    }
}

/// A compiled resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSlot {
    pub index: ResourceIdx,
    pub id: String,
    /// Concurrent unit limit. `None` when no capacity relation binds it.
    pub capacity: Option<u32>,
    /// Idle gap required after each task on a unit (only with a capacity).
    pub rest_ms: i64,
    /// Sorted, disjoint availability windows.
    pub free: Vec<TimeWindow>,
}

/// A generic relation between variables. `source` indexes
/// [`ConstraintGraph::sources`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    Ordering {
        before: VarId,
        after: VarId,
        min_delay_ms: i64,
        source: usize,
    },
    Cumulative {
        resource: ResourceIdx,
        capacity: u32,
        source: usize,
    },
    Disjunctive {
        vars: Vec<VarId>,
        source: usize,
    },
    /// Start-domain bound contributed by a window.
    Bound {
        var: VarId,
        earliest_ms: i64,
        latest_ms: i64,
        source: usize,
    },
}

/// Soft penalty terms, indexed for fast lookup during placement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoftTerms {
    /// Per variable: `(preferred resource, weight)`.
    pub prefer: Vec<Vec<(ResourceIdx, i64)>>,
    /// Per resource: `(window to keep idle, weight)`.
    pub avoid: Vec<Vec<(TimeWindow, i64)>>,
    /// Cost per ms of busy-time spread across resources.
    pub balance: i64,
}

/// The compiled problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintGraph {
    pub vars: Vec<PlacementVar>,
    pub resources: Vec<ResourceSlot>,
    pub relations: Vec<Relation>,
    /// Members of each disjunctive group.
    pub groups: Vec<Vec<VarId>>,
    /// The constraints this graph was compiled from.
    pub sources: Vec<Constraint>,
    pub soft: SoftTerms,
}

impl ConstraintGraph {
    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn var_index(&self, task_id: &str) -> Option<VarId> {
        self.vars
            .binary_search_by(|v| v.task_id.as_str().cmp(task_id))
            .ok()
    }

    pub fn resource_index(&self, resource_id: &str) -> Option<ResourceIdx> {
        self.resources
            .binary_search_by(|r| r.id.as_str().cmp(resource_id))
            .ok()
    }

    /// Soft penalty of placing `var` on `resource` over `[start, end)`.
    pub fn soft_penalty(&self, var: VarId, resource: ResourceIdx, start_ms: i64, end_ms: i64) -> i64 {
        let prefer: i64 = self.soft.prefer[var]
            .iter()
            .filter(|(preferred, _)| *preferred != resource)
            .map(|(_, w)| w)
            .sum();
        let interval = TimeWindow::new(start_ms, end_ms);
        let avoid: i64 = self.soft.avoid[resource]
            .iter()
            .filter(|(window, _)| window.overlaps(&interval))
            .map(|(_, w)| w)
            .sum();
        prefer + avoid
    }

    /// Workload term: `balance` weight times the gap between the busiest
    /// and the idlest resource. `busy_ms` is indexed by resource.
    pub fn balance_penalty(&self, busy_ms: &[i64]) -> i64 {
        if self.soft.balance == 0 {
            return 0;
        }
        let spread = match (busy_ms.iter().max(), busy_ms.iter().min()) {
            (Some(max), Some(min)) => max - min,
            _ => 0,
        };
        self.soft.balance.saturating_mul(spread)
    }

    /// Trivial makespan lower bound: no task can end before its own
    /// earliest start plus duration.
    pub fn makespan_lower_bound(&self) -> i64 {
        self.vars
            .iter()
            .map(|v| v.start_min.max(0).saturating_add(v.duration_ms))
            .max()
            .unwrap_or(0)
    }
}
