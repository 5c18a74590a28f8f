//! Input validation for scheduling problems.
//!
//! Checks structural integrity of tasks, resources and constraints
//! before compiling. Detects:
//! - Duplicate IDs
//! - Non-positive durations and zero capacities
//! - Empty windows (earliest > latest)
//! - References to unknown tasks, resources or capabilities
//! - Tasks whose capabilities no single resource offers
//! - Circular dependencies (task dependencies and precedence constraints)
//!
//! Every issue is collected; the first cycle found is reported with the
//! full path so callers can see which tasks to untangle.
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.4 (Topological Sort)

use std::collections::{BTreeSet, HashSet};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::error::{MalformedProblemError, ProblemIssue};
use crate::models::{Constraint, Problem, SoftConstraint};

/// Validates a problem.
///
/// # Returns
/// `Ok(())` if all checks pass, `Err` carrying every detected issue.
pub fn validate(problem: &Problem) -> Result<(), MalformedProblemError> {
    let mut issues = Vec::new();

    let mut task_ids = HashSet::new();
    for task in &problem.tasks {
        if !task_ids.insert(task.id.as_str()) {
            issues.push(ProblemIssue::DuplicateTask(task.id.clone()));
        }
        if task.duration_ms <= 0 {
            issues.push(ProblemIssue::InvalidDuration {
                task_id: task.id.clone(),
                duration_ms: task.duration_ms,
            });
        }
        if let (Some(earliest), Some(deadline)) = (task.earliest_start_ms, task.deadline_ms) {
            if earliest > deadline {
                issues.push(ProblemIssue::EmptyWindow {
                    task_id: task.id.clone(),
                    earliest_ms: earliest,
                    latest_ms: deadline,
                });
            }
        }
    }

    let mut resource_ids = HashSet::new();
    for resource in &problem.resources {
        if !resource_ids.insert(resource.id.as_str()) {
            issues.push(ProblemIssue::DuplicateResource(resource.id.clone()));
        }
        if resource.capacity == 0 {
            issues.push(ProblemIssue::ZeroCapacity(resource.id.clone()));
        }
    }

    // Capabilities
    let offered: BTreeSet<&str> = problem
        .resources
        .iter()
        .flat_map(|r| r.capabilities.iter().map(String::as_str))
        .collect();
    for task in &problem.tasks {
        let mut all_offered = true;
        for capability in &task.capabilities {
            if !offered.contains(capability.as_str()) {
                all_offered = false;
                issues.push(ProblemIssue::UnknownCapability {
                    task_id: task.id.clone(),
                    capability: capability.clone(),
                });
            }
        }
        // offered somewhere, but split across resources
        if all_offered
            && !task.capabilities.is_empty()
            && !problem.resources.iter().any(|r| task.is_satisfied_by(&r.capabilities))
        {
            issues.push(ProblemIssue::NoEligibleResource {
                task_id: task.id.clone(),
            });
        }
    }

    // Dependencies
    for task in &problem.tasks {
        for dep in &task.dependencies {
            if !task_ids.contains(dep.as_str()) {
                issues.push(ProblemIssue::UnknownTask {
                    referenced_by: format!("task '{}'", task.id),
                    task_id: dep.clone(),
                });
            }
        }
    }

    for constraint in &problem.constraints {
        check_constraint(constraint, &task_ids, &resource_ids, &mut issues);
    }
    for soft in &problem.soft_constraints {
        check_soft_constraint(soft, &task_ids, &resource_ids, &mut issues);
    }

    if let Some(cycle) = detect_cycle(problem, &task_ids) {
        issues.push(ProblemIssue::CyclicDependency { cycle });
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(MalformedProblemError::new(issues))
    }
}

fn check_constraint(
    constraint: &Constraint,
    task_ids: &HashSet<&str>,
    resource_ids: &HashSet<&str>,
    issues: &mut Vec<ProblemIssue>,
) {
    let referenced_by = || format!("constraint `{}`", constraint.describe());

    for task_id in constraint.task_refs() {
        if !task_ids.contains(task_id) {
            issues.push(ProblemIssue::UnknownTask {
                referenced_by: referenced_by(),
                task_id: task_id.to_string(),
            });
        }
    }
    if let Some(resource_id) = constraint.resource_ref() {
        if !resource_ids.contains(resource_id) {
            issues.push(ProblemIssue::UnknownResource {
                referenced_by: referenced_by(),
                resource_id: resource_id.to_string(),
            });
        }
    }

    match constraint {
        Constraint::Exclusion { task_ids: members } => {
            let distinct: HashSet<&String> = members.iter().collect();
            if distinct.len() < 2 {
                issues.push(ProblemIssue::UndersizedExclusion {
                    task_ids: members.clone(),
                });
            }
        }
        Constraint::Window {
            task_id,
            earliest_ms,
            latest_ms,
        } if earliest_ms > latest_ms => {
            issues.push(ProblemIssue::EmptyWindow {
                task_id: task_id.clone(),
                earliest_ms: *earliest_ms,
                latest_ms: *latest_ms,
            });
        }
        Constraint::Capacity {
            resource_id,
            max_concurrent: 0,
        } => {
            issues.push(ProblemIssue::ZeroCapacity(resource_id.clone()));
        }
        _ => {}
    }
}

fn check_soft_constraint(
    soft: &SoftConstraint,
    task_ids: &HashSet<&str>,
    resource_ids: &HashSet<&str>,
    issues: &mut Vec<ProblemIssue>,
) {
    let (task_id, resource_id) = match soft {
        SoftConstraint::Prefer {
            task_id,
            resource_id,
            ..
        } => (Some(task_id), resource_id),
        SoftConstraint::Avoid { resource_id, .. } => (None, resource_id),
        SoftConstraint::Balance { .. } => return,
    };
    if let Some(task_id) = task_id.filter(|t| !task_ids.contains(t.as_str())) {
        issues.push(ProblemIssue::UnknownTask {
            referenced_by: "soft constraint".to_string(),
            task_id: task_id.clone(),
        });
    }
    if !resource_ids.contains(resource_id.as_str()) {
        issues.push(ProblemIssue::UnknownResource {
            referenced_by: "soft constraint".to_string(),
            resource_id: resource_id.clone(),
        });
    }
}

/// Finds a dependency cycle over task dependencies and explicit precedence
/// constraints.
///
/// Edge direction: predecessor -> successor. A topological sort fails iff a
/// cycle exists; the cycle itself is then traced inside the strongly
/// connected component of the node the sort tripped on, and rotated so it
/// starts at its smallest id. The returned path repeats its first id at
/// the end.
fn detect_cycle(problem: &Problem, task_ids: &HashSet<&str>) -> Option<Vec<String>> {
    let mut edges: BTreeSet<(&str, &str)> = BTreeSet::new();
    for task in &problem.tasks {
        for dep in &task.dependencies {
            edges.insert((dep.as_str(), task.id.as_str()));
        }
    }
    for constraint in &problem.constraints {
        if let Constraint::Precedence { before, after, .. } = constraint {
            edges.insert((before.as_str(), after.as_str()));
        }
    }

    let mut nodes: Vec<&str> = task_ids.iter().copied().collect();
    nodes.sort_unstable();

    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for node in nodes {
        graph.add_node(node);
    }
    for (from, to) in edges {
        if task_ids.contains(from) && task_ids.contains(to) {
            graph.add_edge(from, to, ());
        }
    }

    let tripped = match toposort(&graph, None) {
        Ok(_) => return None,
        Err(cycle) => cycle.node_id(),
    };

    let component: HashSet<&str> = tarjan_scc(&graph)
        .into_iter()
        .find(|scc| scc.contains(&tripped))?
        .into_iter()
        .collect();

    let mut path = vec![tripped];
    let mut visited = HashSet::from([tripped]);
    if !trace_cycle(&graph, tripped, tripped, &component, &mut visited, &mut path) {
        return None;
    }

    // `path` ends where it started; rotate the open ring to the smallest id.
    path.pop();
    let pivot = path
        .iter()
        .enumerate()
        .min_by_key(|(_, id)| **id)
        .map(|(i, _)| i)
        .unwrap_or(0);
    path.rotate_left(pivot);
    let first = path[0];
    path.push(first);
    Some(path.into_iter().map(str::to_string).collect())
}

fn trace_cycle<'a>(
    graph: &DiGraphMap<&'a str, ()>,
    node: &'a str,
    target: &'a str,
    component: &HashSet<&'a str>,
    visited: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> bool {
    let mut next: Vec<&str> = graph.neighbors(node).collect();
    next.sort_unstable();
    for succ in next {
        if succ == target {
            path.push(succ);
            return true;
        }
        if component.contains(succ) && visited.insert(succ) {
            path.push(succ);
            if trace_cycle(graph, succ, target, component, visited, path) {
                return true;
            }
            path.pop();
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Resource, Task};

    fn sample_problem() -> Problem {
        Problem::new(
            vec![
                Task::new("J1", 1000).requires("milling"),
                Task::new("J2", 2000).after("J1"),
                Task::new("J3", 1500).with_window(0, 10_000),
            ],
            vec![
                Resource::new("M1").with_capability("milling"),
                Resource::new("M2"),
            ],
        )
    }

    fn issues(problem: &Problem) -> Vec<ProblemIssue> {
        validate(problem).unwrap_err().issues
    }

    #[test]
    fn test_valid_input() {
        assert!(validate(&sample_problem()).is_ok());
    }

    #[test]
    fn test_duplicate_ids() {
        let p = sample_problem()
            .with_task(Task::new("J1", 10))
            .with_resource(Resource::new("M2"));
        let found = issues(&p);
        assert!(found.contains(&ProblemIssue::DuplicateTask("J1".into())));
        assert!(found.contains(&ProblemIssue::DuplicateResource("M2".into())));
    }

    #[test]
    fn test_invalid_duration_and_capacity() {
        let p = Problem::new(
            vec![Task::new("T", 0)],
            vec![Resource::new("R").with_capacity(0)],
        );
        let found = issues(&p);
        assert!(found
            .iter()
            .any(|i| matches!(i, ProblemIssue::InvalidDuration { task_id, .. } if task_id == "T")));
        assert!(found.contains(&ProblemIssue::ZeroCapacity("R".into())));
    }

    #[test]
    fn test_empty_window() {
        let p = sample_problem().with_task(Task::new("late", 10).with_window(500, 100));
        assert_eq!(
            issues(&p),
            vec![ProblemIssue::EmptyWindow {
                task_id: "late".into(),
                earliest_ms: 500,
                latest_ms: 100,
            }]
        );
    }

    #[test]
    fn test_unknown_references() {
        let p = sample_problem()
            .with_task(Task::new("J4", 10).after("ghost").requires("welding"))
            .with_constraint(Constraint::capacity("M9", 1))
            .with_constraint(Constraint::precedence("J1", "nope"))
            .with_soft_constraint(SoftConstraint::avoid("M8", 0, 10, 1));
        let found = issues(&p);

        assert!(found.iter().any(|i| matches!(
            i,
            ProblemIssue::UnknownTask { task_id, .. } if task_id == "ghost"
        )));
        assert!(found.iter().any(|i| matches!(
            i,
            ProblemIssue::UnknownTask { task_id, .. } if task_id == "nope"
        )));
        assert!(found.iter().any(|i| matches!(
            i,
            ProblemIssue::UnknownResource { resource_id, .. } if resource_id == "M9"
        )));
        assert!(found.iter().any(|i| matches!(
            i,
            ProblemIssue::UnknownResource { resource_id, .. } if resource_id == "M8"
        )));
        assert!(found.contains(&ProblemIssue::UnknownCapability {
            task_id: "J4".into(),
            capability: "welding".into(),
        }));
    }

    #[test]
    fn test_capabilities_split_across_resources() {
        let p = Problem::new(
            vec![
                Task::new("split", 10).requires("weld").requires("paint"),
                Task::new("fits", 10).requires("weld"),
            ],
            vec![
                Resource::new("welder").with_capability("weld"),
                Resource::new("painter").with_capability("paint"),
            ],
        );
        assert_eq!(
            issues(&p),
            vec![ProblemIssue::NoEligibleResource {
                task_id: "split".into()
            }]
        );

        let p = p.with_resource(
            Resource::new("both")
                .with_capability("weld")
                .with_capability("paint"),
        );
        assert!(validate(&p).is_ok());
    }

    #[test]
    fn test_undersized_exclusion() {
        let p = sample_problem().with_constraint(Constraint::exclusion(["J1", "J1"]));
        assert!(matches!(
            issues(&p).as_slice(),
            [ProblemIssue::UndersizedExclusion { .. }]
        ));
    }

    #[test]
    fn test_cycle_named_through_dependencies() {
        // A -> B -> C -> A
        let p = Problem::new(
            vec![
                Task::new("B", 10).after("A"),
                Task::new("C", 10).after("B"),
                Task::new("A", 10).after("C"),
                Task::new("D", 10).after("A"),
            ],
            vec![Resource::new("R")],
        );
        let err = validate(&p).unwrap_err();
        assert_eq!(err.cycle().unwrap(), &["A", "B", "C", "A"]);
    }

    #[test]
    fn test_cycle_through_precedence_constraints() {
        let p = Problem::new(
            vec![Task::new("A", 10), Task::new("B", 10), Task::new("C", 10)],
            vec![Resource::new("R")],
        )
        .with_constraint(Constraint::precedence("A", "B"))
        .with_constraint(Constraint::precedence("B", "C"))
        .with_constraint(Constraint::precedence("C", "A"));

        let err = validate(&p).unwrap_err();
        assert_eq!(err.cycle().unwrap(), &["A", "B", "C", "A"]);
        assert!(err.to_string().contains("A -> B -> C -> A"));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let p = Problem::new(vec![Task::new("A", 10).after("A")], vec![Resource::new("R")]);
        assert_eq!(validate(&p).unwrap_err().cycle().unwrap(), &["A", "A"]);
    }

    #[test]
    fn test_no_cycle_in_chain() {
        let p = Problem::new(
            vec![
                Task::new("O1", 100),
                Task::new("O2", 100).after("O1"),
                Task::new("O3", 100).after("O2").after("O1"),
            ],
            vec![Resource::new("R")],
        );
        assert!(validate(&p).is_ok());
    }
}
