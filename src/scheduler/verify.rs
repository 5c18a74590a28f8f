//! Independent re-verification of solver output.
//!
//! Checks a list of assignments against the problem entities and a
//! constraint set without trusting the solver. Every breach becomes a
//! [`Violation`]; an empty result means the assignments are valid.

use std::collections::{HashMap, HashSet};

use crate::models::{Assignment, Constraint, Problem, Violation, ViolationType};

/// Verifies `assignments` against `problem` and `constraints`.
///
/// Entity checks (known ids, durations, capabilities, calendars) run for
/// every assignment; constraint checks only consider assigned tasks.
pub fn verify(problem: &Problem, constraints: &[Constraint], assignments: &[Assignment]) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut by_task: HashMap<&str, &Assignment> = HashMap::new();

    for a in assignments {
        if by_task.insert(a.task_id.as_str(), a).is_some() {
            violations.push(Violation::new(
                ViolationType::MalformedAssignment,
                &a.task_id,
                format!("task '{}' assigned more than once", a.task_id),
            ));
            continue;
        }
        check_entity(problem, a, &mut violations);
    }

    for constraint in constraints {
        match constraint {
            Constraint::Precedence {
                before,
                after,
                min_delay_ms,
            } => check_precedence(&by_task, before, after, *min_delay_ms, &mut violations),
            Constraint::Capacity {
                resource_id,
                max_concurrent,
            } => {
                let rest = problem.resource(resource_id).map_or(0, |r| r.min_rest_ms);
                check_capacity(assignments, resource_id, *max_concurrent, rest, &mut violations);
            }
            Constraint::Exclusion { task_ids } => check_exclusion(&by_task, task_ids, &mut violations),
            Constraint::Window {
                task_id,
                earliest_ms,
                latest_ms,
            } => {
                if let Some(a) = by_task.get(task_id.as_str()) {
                    if a.start_ms < *earliest_ms || a.end_ms > *latest_ms {
                        violations.push(Violation::new(
                            ViolationType::WindowViolation,
                            task_id,
                            format!(
                                "task '{task_id}' runs [{}, {}) outside [{earliest_ms}, {latest_ms}]",
                                a.start_ms, a.end_ms
                            ),
                        ));
                    }
                }
            }
        }
    }

    violations
}

fn check_entity(problem: &Problem, a: &Assignment, out: &mut Vec<Violation>) {
    let Some(task) = problem.task(&a.task_id) else {
        out.push(Violation::new(
            ViolationType::MalformedAssignment,
            &a.task_id,
            format!("unknown task '{}'", a.task_id),
        ));
        return;
    };
    let Some(resource) = problem.resource(&a.resource_id) else {
        out.push(Violation::new(
            ViolationType::MalformedAssignment,
            &a.task_id,
            format!("task '{}' assigned to unknown resource '{}'", a.task_id, a.resource_id),
        ));
        return;
    };

    if a.duration_ms() != task.duration_ms {
        out.push(Violation::new(
            ViolationType::MalformedAssignment,
            &a.task_id,
            format!(
                "task '{}' lasts {}ms, expected {}ms",
                a.task_id,
                a.duration_ms(),
                task.duration_ms
            ),
        ));
    }
    if !task.is_satisfied_by(&resource.capabilities) {
        out.push(Violation::new(
            ViolationType::CapabilityMismatch,
            &a.task_id,
            format!("resource '{}' lacks a capability task '{}' requires", resource.id, task.id),
        ));
    }
    if !resource.calendar.covers(a.start_ms, a.end_ms) {
        out.push(Violation::new(
            ViolationType::ResourceUnavailable,
            &a.resource_id,
            format!(
                "resource '{}' unavailable during [{}, {}) for task '{}'",
                resource.id, a.start_ms, a.end_ms, a.task_id
            ),
        ));
    }
}

fn check_precedence(
    by_task: &HashMap<&str, &Assignment>,
    before: &str,
    after: &str,
    delay: i64,
    out: &mut Vec<Violation>,
) {
    let Some(succ) = by_task.get(after) else {
        return;
    };
    match by_task.get(before) {
        None => out.push(Violation::new(
            ViolationType::PrecedenceViolation,
            after,
            format!("task '{after}' placed while its predecessor '{before}' is not"),
        )),
        Some(pred) if succ.start_ms < pred.end_ms.saturating_add(delay) => {
            out.push(Violation::new(
                ViolationType::PrecedenceViolation,
                after,
                format!(
                    "task '{after}' starts at {} before '{before}' ends at {} (+{delay}ms)",
                    succ.start_ms, pred.end_ms
                ),
            ))
        }
        Some(_) => {}
    }
}

/// Sweeps `[start, end + rest)` intervals on `resource_id`.
fn check_capacity(
    assignments: &[Assignment],
    resource_id: &str,
    max: u32,
    rest: i64,
    out: &mut Vec<Violation>,
) {
    let mut events: Vec<(i64, i32)> = Vec::new();
    for a in assignments.iter().filter(|a| a.resource_id == resource_id) {
        events.push((a.start_ms, 1));
        events.push((a.end_ms.saturating_add(rest), -1));
    }
    // releases sort before acquisitions at the same instant
    events.sort_unstable();

    let mut load: i64 = 0;
    for (time, delta) in events {
        load += i64::from(delta);
        if load > i64::from(max) {
            out.push(Violation::new(
                ViolationType::CapacityExceeded,
                resource_id,
                format!("resource '{resource_id}' runs {load} tasks at {time}ms, capacity {max}"),
            ));
            return;
        }
    }
}

fn check_exclusion(by_task: &HashMap<&str, &Assignment>, task_ids: &[String], out: &mut Vec<Violation>) {
    let members: Vec<&Assignment> = {
        let mut seen = HashSet::new();
        task_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| by_task.get(id.as_str()).copied())
            .collect()
    };
    for (i, a) in members.iter().enumerate() {
        for b in &members[i + 1..] {
            if a.overlaps(b) {
                out.push(Violation::new(
                    ViolationType::ExclusionViolation,
                    &a.task_id,
                    format!("exclusive tasks '{}' and '{}' overlap", a.task_id, b.task_id),
                ));
            }
        }
    }
}
