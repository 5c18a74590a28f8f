//! Task model.
//!
//! A task is a single unit of work that occupies one unit of one resource
//! for a fixed duration.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// A task to be scheduled.
///
/// # Time Representation
/// All times are in milliseconds relative to a scheduling epoch (t=0).
/// The consumer defines what t=0 means (e.g., shift start, midnight UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Processing time (ms). Must be positive.
    pub duration_ms: i64,
    /// Capability tags a resource must carry to run this task.
    /// Empty = any resource.
    pub capabilities: BTreeSet<String>,
    /// Earliest start time (ms). `None` = available immediately.
    pub earliest_start_ms: Option<i64>,
    /// Latest completion time (ms). `None` = no deadline.
    pub deadline_ms: Option<i64>,
    /// Tasks that must finish before this one starts.
    pub dependencies: Vec<String>,
    /// Scheduling priority (higher = more important).
    pub priority: i32,
    /// Domain-specific key-value metadata.
    pub attributes: HashMap<String, String>,
}

impl Task {
    /// Creates a new task with the given ID and duration.
    pub fn new(id: impl Into<String>, duration_ms: i64) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            duration_ms,
            capabilities: BTreeSet::new(),
            earliest_start_ms: None,
            deadline_ms: None,
            dependencies: Vec::new(),
            priority: 0,
            attributes: HashMap::new(),
        }
    }

    /// Sets the task name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a required capability.
    pub fn requires(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    /// Sets the earliest start time (ms).
    pub fn with_earliest_start(mut self, earliest_ms: i64) -> Self {
        self.earliest_start_ms = Some(earliest_ms);
        self
    }

    /// Sets the deadline (latest completion time in ms).
    pub fn with_deadline(mut self, deadline_ms: i64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }

    /// Sets both window bounds.
    pub fn with_window(self, earliest_ms: i64, deadline_ms: i64) -> Self {
        self.with_earliest_start(earliest_ms)
            .with_deadline(deadline_ms)
    }

    /// Adds a dependency (must finish before this task starts).
    pub fn after(mut self, task_id: impl Into<String>) -> Self {
        self.dependencies.push(task_id.into());
        self
    }

    /// Sets the scheduling priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Adds a domain-specific attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Whether the task carries an earliest start or a deadline.
    pub fn has_window(&self) -> bool {
        self.earliest_start_ms.is_some() || self.deadline_ms.is_some()
    }

    /// Whether a resource offering `tags` may run this task.
    pub fn is_satisfied_by(&self, tags: &BTreeSet<String>) -> bool {
        self.capabilities.is_subset(tags)
    }
}
