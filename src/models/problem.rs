//! Problem and incremental delta models.
//!
//! A [`Problem`] is the complete solver input. Restrictions carried by entity
//! data (dependencies, resource capacities, task windows) are surfaced as
//! ordinary [`Constraint`] values by [`Problem::effective_constraints`], so
//! downstream stages see one uniform constraint list.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{Constraint, Resource, SoftConstraint, Task};

/// A scheduling problem: tasks, resources and constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub tasks: Vec<Task>,
    pub resources: Vec<Resource>,
    /// Explicit hard constraints.
    pub constraints: Vec<Constraint>,
    /// Soft preferences.
    pub soft_constraints: Vec<SoftConstraint>,
}

impl Problem {
    pub fn new(tasks: Vec<Task>, resources: Vec<Resource>) -> Self {
        Self {
            tasks,
            resources,
            constraints: Vec::new(),
            soft_constraints: Vec::new(),
        }
    }

    /// Adds a task.
    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Adds a resource.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Adds a hard constraint.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Adds a soft constraint.
    pub fn with_soft_constraint(mut self, soft: SoftConstraint) -> Self {
        self.soft_constraints.push(soft);
        self
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    /// Resources able to run `task`, in declaration order.
    pub fn eligible_resources<'a>(&'a self, task: &'a Task) -> impl Iterator<Item = &'a Resource> {
        self.resources
            .iter()
            .filter(move |r| task.is_satisfied_by(&r.capabilities))
    }

    /// Explicit constraints followed by the ones implied by entity data:
    /// dependencies, then resource capacities, then task windows.
    pub fn effective_constraints(&self) -> Vec<Constraint> {
        let mut all = self.constraints.clone();
        for task in &self.tasks {
            for dep in &task.dependencies {
                all.push(Constraint::precedence(dep.clone(), task.id.clone()));
            }
        }
        for resource in &self.resources {
            all.push(Constraint::capacity(resource.id.clone(), resource.capacity));
        }
        for task in self.tasks.iter().filter(|t| t.has_window()) {
            all.push(Constraint::window(
                task.id.clone(),
                task.earliest_start_ms.unwrap_or(i64::MIN),
                task.deadline_ms.unwrap_or(i64::MAX),
            ));
        }
        all
    }

    /// Total processing time across all tasks (ms).
    pub fn total_work_ms(&self) -> i64 {
        self.tasks.iter().map(|t| t.duration_ms).sum()
    }

    /// Returns a new problem with `delta` merged in.
    ///
    /// Removals run first, then upserts and additions. Removing a task or
    /// resource prunes every constraint, preference and dependency that
    /// mentions it.
    pub fn apply(&self, delta: &ProblemDelta) -> Problem {
        let removed: HashSet<&str> = delta
            .remove_tasks
            .iter()
            .chain(delta.remove_resources.iter())
            .map(String::as_str)
            .collect();

        let mut next = self.clone();
        next.tasks.retain(|t| !removed.contains(t.id.as_str()));
        next.resources.retain(|r| !removed.contains(r.id.as_str()));
        for task in &mut next.tasks {
            task.dependencies.retain(|d| !removed.contains(d.as_str()));
        }
        next.constraints
            .retain(|c| !removed.iter().any(|id| c.mentions(id)) && !delta.remove_constraints.contains(c));
        next.soft_constraints.retain(|s| {
            !removed.iter().any(|id| s.mentions(id)) && !delta.remove_soft_constraints.contains(s)
        });

        for task in &delta.upsert_tasks {
            match next.tasks.iter_mut().find(|t| t.id == task.id) {
                Some(existing) => *existing = task.clone(),
                None => next.tasks.push(task.clone()),
            }
        }
        for resource in &delta.upsert_resources {
            match next.resources.iter_mut().find(|r| r.id == resource.id) {
                Some(existing) => *existing = resource.clone(),
                None => next.resources.push(resource.clone()),
            }
        }
        next.constraints.extend(delta.add_constraints.iter().cloned());
        next.soft_constraints
            .extend(delta.add_soft_constraints.iter().cloned());
        next
    }
}

/// An incremental change to a [`Problem`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemDelta {
    /// Tasks to add, or to replace when the id exists.
    pub upsert_tasks: Vec<Task>,
    pub remove_tasks: Vec<String>,
    /// Resources to add, or to replace when the id exists.
    pub upsert_resources: Vec<Resource>,
    pub remove_resources: Vec<String>,
    pub add_constraints: Vec<Constraint>,
    pub remove_constraints: Vec<Constraint>,
    pub add_soft_constraints: Vec<SoftConstraint>,
    pub remove_soft_constraints: Vec<SoftConstraint>,
}

impl ProblemDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_task(mut self, task: Task) -> Self {
        self.upsert_tasks.push(task);
        self
    }

    pub fn remove_task(mut self, id: impl Into<String>) -> Self {
        self.remove_tasks.push(id.into());
        self
    }

    pub fn upsert_resource(mut self, resource: Resource) -> Self {
        self.upsert_resources.push(resource);
        self
    }

    pub fn remove_resource(mut self, id: impl Into<String>) -> Self {
        self.remove_resources.push(id.into());
        self
    }

    pub fn add_constraint(mut self, constraint: Constraint) -> Self {
        self.add_constraints.push(constraint);
        self
    }

    pub fn remove_constraint(mut self, constraint: Constraint) -> Self {
        self.remove_constraints.push(constraint);
        self
    }

    pub fn add_soft_constraint(mut self, soft: SoftConstraint) -> Self {
        self.add_soft_constraints.push(soft);
        self
    }

    pub fn remove_soft_constraint(mut self, soft: SoftConstraint) -> Self {
        self.remove_soft_constraints.push(soft);
        self
    }

    /// Whether applying this delta changes nothing.
    pub fn is_empty(&self) -> bool {
        self.upsert_tasks.is_empty()
            && self.remove_tasks.is_empty()
            && self.upsert_resources.is_empty()
            && self.remove_resources.is_empty()
            && self.add_constraints.is_empty()
            && self.remove_constraints.is_empty()
            && self.add_soft_constraints.is_empty()
            && self.remove_soft_constraints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Problem {
        Problem::new(
            vec![
                Task::new("A", 100),
                Task::new("B", 200).after("A").with_deadline(1_000),
            ],
            vec![Resource::new("R1").with_capacity(2)],
        )
        .with_constraint(Constraint::exclusion(["A", "B"]))
        .with_soft_constraint(SoftConstraint::prefer("B", "R1", 1))
    }

    #[test]
    fn test_effective_constraints_order() {
        let effective = sample().effective_constraints();
        assert_eq!(
            effective,
            vec![
                Constraint::exclusion(["A", "B"]),
                Constraint::precedence("A", "B"),
                Constraint::capacity("R1", 2),
                Constraint::window("B", i64::MIN, 1_000),
            ]
        );
    }

    #[test]
    fn test_lookup() {
        let p = sample();
        assert_eq!(p.task("B").map(|t| t.duration_ms), Some(200));
        assert!(p.task("Z").is_none());
        assert!(p.resource("R1").is_some());
        assert_eq!(p.total_work_ms(), 300);
    }

    #[test]
    fn test_eligible_resources() {
        let p = Problem::new(
            vec![Task::new("T", 1).requires("x")],
            vec![Resource::new("R1"), Resource::new("R2").with_capability("x")],
        );
        let ids: Vec<&str> = p
            .eligible_resources(&p.tasks[0])
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["R2"]);
    }

    #[test]
    fn test_empty_delta_is_identity() {
        let p = sample();
        let delta = ProblemDelta::new();
        assert!(delta.is_empty());
        assert_eq!(p.apply(&delta), p);
    }

    #[test]
    fn test_remove_task_prunes_references() {
        let p = sample().apply(&ProblemDelta::new().remove_task("A"));
        assert_eq!(p.tasks.len(), 1);
        assert!(p.tasks[0].dependencies.is_empty());
        assert!(p.constraints.is_empty());
        assert_eq!(p.soft_constraints.len(), 1);
    }

    #[test]
    fn test_upsert_replaces_and_appends() {
        let p = sample().apply(
            &ProblemDelta::new()
                .upsert_task(Task::new("A", 999))
                .upsert_task(Task::new("C", 10))
                .remove_soft_constraint(SoftConstraint::prefer("B", "R1", 1))
                .add_constraint(Constraint::window("C", 0, 50)),
        );
        assert_eq!(p.task("A").map(|t| t.duration_ms), Some(999));
        assert_eq!(p.tasks.last().map(|t| t.id.as_str()), Some("C"));
        assert!(p.soft_constraints.is_empty());
        assert_eq!(p.constraints.len(), 2);
    }

    #[test]
    fn test_remove_resource_prunes_capacity() {
        let p = sample()
            .with_constraint(Constraint::capacity("R1", 1))
            .apply(&ProblemDelta::new().remove_resource("R1"));
        assert!(p.resources.is_empty());
        assert_eq!(p.constraints, vec![Constraint::exclusion(["A", "B"])]);
        assert!(p.soft_constraints.is_empty());
    }
}
