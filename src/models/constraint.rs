//! Scheduling constraints.
//!
//! Hard constraints form a closed set of four kinds so that every stage
//! (compiler, verifier, conflict analysis) can match on them exhaustively.
//! Soft constraints only contribute a penalty.
//!
//! # Reference
//! Brucker (2007), "Scheduling Algorithms", Ch. 2

use serde::{Deserialize, Serialize};

use super::TimeWindow;

/// A hard scheduling constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constraint {
    /// Task `after` cannot start until `before` finishes + `min_delay_ms`.
    Precedence {
        before: String,
        after: String,
        min_delay_ms: i64,
    },

    /// At most `max_concurrent` tasks may use `resource_id` simultaneously.
    Capacity {
        resource_id: String,
        max_concurrent: u32,
    },

    /// No two listed tasks may overlap in time, on any resources.
    Exclusion { task_ids: Vec<String> },

    /// Task must run within [earliest_ms, latest_ms].
    Window {
        task_id: String,
        earliest_ms: i64,
        latest_ms: i64,
    },
}

/// Discriminant of [`Constraint`].
///
/// The declaration order is the order in which conflict analysis
/// relaxes constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    Exclusion,
    Capacity,
    Precedence,
    Window,
}

impl ConstraintKind {
    /// All kinds in relaxation order.
    pub const RELAXATION_ORDER: [ConstraintKind; 4] = [
        ConstraintKind::Exclusion,
        ConstraintKind::Capacity,
        ConstraintKind::Precedence,
        ConstraintKind::Window,
    ];
}

impl Constraint {
    /// Creates a zero-delay precedence constraint.
    pub fn precedence(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self::Precedence {
            before: before.into(),
            after: after.into(),
            min_delay_ms: 0,
        }
    }

    /// Creates a precedence constraint with a minimum delay.
    pub fn precedence_with_delay(
        before: impl Into<String>,
        after: impl Into<String>,
        delay_ms: i64,
    ) -> Self {
        Self::Precedence {
            before: before.into(),
            after: after.into(),
            min_delay_ms: delay_ms,
        }
    }

    /// Creates a capacity constraint.
    pub fn capacity(resource_id: impl Into<String>, max: u32) -> Self {
        Self::Capacity {
            resource_id: resource_id.into(),
            max_concurrent: max,
        }
    }

    /// Creates a mutual exclusion constraint.
    pub fn exclusion<I, S>(task_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Exclusion {
            task_ids: task_ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a time window constraint.
    pub fn window(task_id: impl Into<String>, earliest_ms: i64, latest_ms: i64) -> Self {
        Self::Window {
            task_id: task_id.into(),
            earliest_ms,
            latest_ms,
        }
    }

    pub fn kind(&self) -> ConstraintKind {
        match self {
            Self::Precedence { .. } => ConstraintKind::Precedence,
            Self::Capacity { .. } => ConstraintKind::Capacity,
            Self::Exclusion { .. } => ConstraintKind::Exclusion,
            Self::Window { .. } => ConstraintKind::Window,
        }
    }

    /// Task ids this constraint refers to.
    pub fn task_refs(&self) -> Vec<&str> {
        match self {
            Self::Precedence { before, after, .. } => vec![before.as_str(), after.as_str()],
            Self::Capacity { .. } => Vec::new(),
            Self::Exclusion { task_ids } => task_ids.iter().map(String::as_str).collect(),
            Self::Window { task_id, .. } => vec![task_id.as_str()],
        }
    }

    /// Resource id this constraint refers to, if any.
    pub fn resource_ref(&self) -> Option<&str> {
        match self {
            Self::Capacity { resource_id, .. } => Some(resource_id),
            _ => None,
        }
    }

    /// Whether this constraint mentions the task or resource `id`.
    pub fn mentions(&self, id: &str) -> bool {
        self.task_refs().contains(&id) || self.resource_ref() == Some(id)
    }

    /// Short human-readable label used in logs and conflict reports.
    pub fn describe(&self) -> String {
        match self {
            Self::Precedence {
                before,
                after,
                min_delay_ms,
            } => format!("precedence {before} -> {after} (+{min_delay_ms}ms)"),
            Self::Capacity {
                resource_id,
                max_concurrent,
            } => format!("capacity {resource_id} <= {max_concurrent}"),
            Self::Exclusion { task_ids } => format!("exclusion {{{}}}", task_ids.join(", ")),
            Self::Window {
                task_id,
                earliest_ms,
                latest_ms,
            } => format!("window {task_id} in [{earliest_ms}, {latest_ms}]"),
        }
    }
}

/// A soft preference. Violations cost `weight` each.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoftConstraint {
    /// The task should run on `resource_id`.
    Prefer {
        task_id: String,
        resource_id: String,
        weight: i64,
    },

    /// `resource_id` should stay idle during `window` (e.g. a day-off request).
    Avoid {
        resource_id: String,
        window: TimeWindow,
        weight: i64,
    },

    /// Busy time should be even across resources. Costs `weight` per ms
    /// between the busiest and the idlest resource.
    Balance { weight: i64 },
}

impl SoftConstraint {
    pub fn prefer(task_id: impl Into<String>, resource_id: impl Into<String>, weight: i64) -> Self {
        Self::Prefer {
            task_id: task_id.into(),
            resource_id: resource_id.into(),
            weight,
        }
    }

    pub fn avoid(resource_id: impl Into<String>, start_ms: i64, end_ms: i64, weight: i64) -> Self {
        Self::Avoid {
            resource_id: resource_id.into(),
            window: TimeWindow::new(start_ms, end_ms),
            weight,
        }
    }

    pub fn balance(weight: i64) -> Self {
        Self::Balance { weight }
    }

    /// Penalty incurred by running `task_id` on `resource_id` over `[start, end)`.
    /// `Balance` depends on the whole schedule and contributes nothing here.
    pub fn penalty(&self, task_id: &str, resource_id: &str, start_ms: i64, end_ms: i64) -> i64 {
        match self {
            Self::Prefer {
                task_id: t,
                resource_id: r,
                weight,
            } => {
                if t == task_id && r != resource_id {
                    *weight
                } else {
                    0
                }
            }
            Self::Avoid {
                resource_id: r,
                window,
                weight,
            } => {
                if r == resource_id && window.overlaps(&TimeWindow::new(start_ms, end_ms)) {
                    *weight
                } else {
                    0
                }
            }
            Self::Balance { .. } => 0,
        }
    }

    /// Whether this preference mentions the task or resource `id`.
    pub fn mentions(&self, id: &str) -> bool {
        match self {
            Self::Prefer {
                task_id,
                resource_id,
                ..
            } => task_id == id || resource_id == id,
            Self::Avoid { resource_id, .. } => resource_id == id,
            Self::Balance { .. } => false,
        }
    }
}
