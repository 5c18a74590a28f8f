//! Resource model.
//!
//! Resources are the entities that perform tasks: machines, workers,
//! rooms, vehicles. Each resource has a capacity, capability tags
//! and an availability calendar.
//!
//! # Reference
//! Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 1.2

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use super::Calendar;

/// A resource that can be assigned to tasks.
///
/// Shared read-only across tasks during a solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique resource identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Number of tasks the resource can run simultaneously (default: 1).
    pub capacity: u32,
    /// Availability schedule.
    pub calendar: Calendar,
    /// Capability tags offered by this resource.
    pub capabilities: BTreeSet<String>,
    /// Minimum idle time a unit needs between two consecutive tasks (ms).
    pub min_rest_ms: i64,
    /// Domain-specific metadata.
    pub attributes: HashMap<String, String>,
}

impl Resource {
    /// Creates a unit-capacity resource that is always available.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            calendar: Calendar::always_available(format!("{id}-calendar")),
            id,
            name: String::new(),
            capacity: 1,
            capabilities: BTreeSet::new(),
            min_rest_ms: 0,
            attributes: HashMap::new(),
        }
    }

    /// Sets the resource name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the capacity.
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the availability calendar.
    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    /// Adds a capability tag.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    /// Sets the minimum rest between consecutive tasks.
    pub fn with_min_rest(mut self, rest_ms: i64) -> Self {
        self.min_rest_ms = rest_ms.max(0);
        self
    }

    /// Adds a domain-specific attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Whether this resource offers a given capability.
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.contains(name)
    }

    /// Checks availability at a given time (ms).
    pub fn is_available_at(&self, time_ms: i64) -> bool {
        self.calendar.is_working_time(time_ms)
    }
}
