//! Schedule (solution) model.
//!
//! A schedule is an immutable solve result: ordered assignments, a
//! feasibility classification, how the solve terminated, and diagnostics
//! when something could not be placed.
//!
//! # Reference
//! Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 3

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Constraint;

/// A task-resource-time assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    /// Assigned task ID.
    pub task_id: String,
    /// Assigned resource ID.
    pub resource_id: String,
    /// Start time (ms).
    pub start_ms: i64,
    /// End time (ms, exclusive).
    pub end_ms: i64,
}

impl Assignment {
    pub fn new(
        task_id: impl Into<String>,
        resource_id: impl Into<String>,
        start_ms: i64,
        end_ms: i64,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            resource_id: resource_id.into(),
            start_ms,
            end_ms,
        }
    }

    /// Total duration (end - start) in ms.
    #[inline]
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    /// Whether two assignments overlap in time.
    #[inline]
    pub fn overlaps(&self, other: &Assignment) -> bool {
        self.start_ms < other.end_ms && other.start_ms < self.end_ms
    }
}

/// Feasibility classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduleStatus {
    /// Every task placed, every constraint satisfied.
    Feasible,
    /// The placed tasks satisfy every constraint, but the solve was cut
    /// short before all tasks were placed.
    PartiallyFeasible,
    /// No valid assignment was found for the full problem.
    Infeasible,
}

/// How the solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Termination {
    Completed,
    /// Budget exhausted (or the search engine failed); best-so-far returned.
    TimedOut,
    /// The caller cancelled; best-so-far returned.
    Cancelled,
}

/// Which engine produced the placements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineKind {
    /// Deterministic list-scheduling heuristic.
    Fallback,
    /// Budgeted search backend.
    Search,
}

/// An invariant breach found while re-verifying solver output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Violation {
    /// Type of violation.
    pub violation_type: ViolationType,
    /// Related entity ID (task or resource).
    pub entity_id: String,
    /// Human-readable description.
    pub message: String,
}

/// Classification of invariant breaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationType {
    /// Task placed outside its window.
    WindowViolation,
    /// Resource allocated beyond its capacity or rest gap.
    CapacityExceeded,
    /// Task started before its predecessor finished.
    PrecedenceViolation,
    /// Two mutually exclusive tasks overlap.
    ExclusionViolation,
    /// Task scheduled when its resource is unavailable.
    ResourceUnavailable,
    /// Resource lacks a required capability.
    CapabilityMismatch,
    /// Assignment length differs from the task duration, or it refers to
    /// an unknown or duplicated entity.
    MalformedAssignment,
}

impl Violation {
    pub fn new(
        violation_type: ViolationType,
        entity_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            violation_type,
            entity_id: entity_id.into(),
            message: message.into(),
        }
    }
}

/// A complete solve result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Assignments ordered by (start, end, resource, task).
    pub assignments: Vec<Assignment>,
    pub status: ScheduleStatus,
    pub termination: Termination,
    pub engine: EngineKind,
    /// Tasks without an assignment, sorted.
    pub unassigned: Vec<String>,
    /// Minimal conflicting constraint set (only for infeasible schedules).
    pub conflicts: Vec<Constraint>,
    /// Conflict analysis ran out of budget or was cancelled. `conflicts`
    /// then holds a valid relaxation that may not be minimal, or nothing.
    #[serde(default)]
    pub conflicts_truncated: bool,
    /// Invariant breaches found in the raw solver output.
    pub violations: Vec<Violation>,
    /// Sum of soft constraint penalties.
    pub soft_penalty: i64,
}

impl Schedule {
    /// Creates an empty, feasible, completed schedule.
    pub fn empty(engine: EngineKind) -> Self {
        Self {
            assignments: Vec::new(),
            status: ScheduleStatus::Feasible,
            termination: Termination::Completed,
            engine,
            unassigned: Vec::new(),
            conflicts: Vec::new(),
            conflicts_truncated: false,
            violations: Vec::new(),
            soft_penalty: 0,
        }
    }

    pub fn is_feasible(&self) -> bool {
        self.status == ScheduleStatus::Feasible
    }

    /// Makespan: latest end time across all assignments (ms).
    pub fn makespan_ms(&self) -> i64 {
        self.assignments.iter().map(|a| a.end_ms).max().unwrap_or(0)
    }

    /// Finds the assignment for a given task.
    pub fn assignment_for_task(&self, task_id: &str) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.task_id == task_id)
    }

    /// Returns all assignments for a given resource.
    pub fn assignments_for_resource(&self, resource_id: &str) -> Vec<&Assignment> {
        self.assignments
            .iter()
            .filter(|a| a.resource_id == resource_id)
            .collect()
    }

    /// Busy time per resource that has assignments (ms).
    pub fn busy_time_by_resource(&self) -> BTreeMap<String, i64> {
        let mut busy = BTreeMap::new();
        for a in &self.assignments {
            *busy.entry(a.resource_id.clone()).or_insert(0) += a.duration_ms();
        }
        busy
    }

    /// Computes resource utilization: busy_time / horizon.
    ///
    /// Returns `None` if `horizon_ms` is zero.
    pub fn resource_utilization(&self, resource_id: &str, horizon_ms: i64) -> Option<f64> {
        if horizon_ms <= 0 {
            return None;
        }
        let busy: i64 = self
            .assignments_for_resource(resource_id)
            .iter()
            .map(|a| a.duration_ms())
            .sum();
        Some(busy as f64 / horizon_ms as f64)
    }

    /// Number of assignments.
    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }
}
