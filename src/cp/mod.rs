//! Constraint compiler.
//!
//! Lowers a [`Problem`] and its effective constraint set into a
//! solver-neutral [`ConstraintGraph`]: one placement variable per task,
//! one slot per resource, and a generic relation per constraint.
//!
//! | Constraint | Relation |
//! |------------|----------|
//! | Precedence | `Ordering` edge with minimum delay |
//! | Capacity | `Cumulative` limit on a resource |
//! | Exclusion | `Disjunctive` group |
//! | Window | `Bound` on the start domain |
//!
//! Compilation is pure: the same problem always yields the same graph.
//!
//! # Reference
//! Baptiste et al. (2001), "Constraint-Based Scheduling", Ch. 1

mod graph;

pub use graph::{
    ConstraintGraph, PlacementVar, Relation, ResourceIdx, ResourceSlot, SoftTerms, VarId,
};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::error::UnsupportedConstraintError;
use crate::models::{Constraint, Problem, SoftConstraint};

/// Compiles `problem` with its effective constraint set.
pub fn compile(problem: &Problem) -> Result<ConstraintGraph, UnsupportedConstraintError> {
    compile_with(problem, &problem.effective_constraints())
}

/// Compiles `problem` against an explicit constraint list.
///
/// Entity data (dependencies, capacities, windows) is ignored here: only
/// `constraints` bind. Conflict analysis uses this to compile relaxed
/// subsets. A resource without any `Capacity` relation is uncapacitated.
pub fn compile_with(
    problem: &Problem,
    constraints: &[Constraint],
) -> Result<ConstraintGraph, UnsupportedConstraintError> {
    let mut tasks: Vec<_> = problem.tasks.iter().collect();
    tasks.sort_by(|a, b| a.id.cmp(&b.id));
    let mut resources: Vec<_> = problem.resources.iter().collect();
    resources.sort_by(|a, b| a.id.cmp(&b.id));

    let mut slots: Vec<ResourceSlot> = resources
        .iter()
        .enumerate()
        .map(|(index, r)| ResourceSlot {
            index,
            id: r.id.clone(),
            capacity: None,
            rest_ms: 0,
            free: r.calendar.free_windows(),
        })
        .collect();

    let mut vars: Vec<PlacementVar> = tasks
        .iter()
        .enumerate()
        .map(|(id, t)| PlacementVar {
            id,
            task_id: t.id.clone(),
            duration_ms: t.duration_ms,
            candidates: resources
                .iter()
                .enumerate()
                .filter(|(_, r)| t.is_satisfied_by(&r.capabilities))
                .map(|(i, _)| i)
                .collect(),
            start_min: 0,
            start_max: i64::MAX,
            deadline_ms: None,
            priority: t.priority,
            predecessors: Vec::new(),
            successors: Vec::new(),
            groups: Vec::new(),
        })
        .collect();

    let var_of = |task_id: &str, c: &Constraint| {
        tasks
            .binary_search_by(|t| t.id.as_str().cmp(task_id))
            .map_err(|_| UnsupportedConstraintError::for_constraint(format!("unknown task '{task_id}'"), c))
    };
    let slot_of = |resource_id: &str, c: &Constraint| {
        resources
            .binary_search_by(|r| r.id.as_str().cmp(resource_id))
            .map_err(|_| {
                UnsupportedConstraintError::for_constraint(format!("unknown resource '{resource_id}'"), c)
            })
    };

    let mut relations = Vec::with_capacity(constraints.len());
    let mut groups: Vec<Vec<VarId>> = Vec::new();
    let mut earliest: Vec<Option<i64>> = vec![None; vars.len()];

    for (source, c) in constraints.iter().enumerate() {
        match c {
            Constraint::Precedence {
                before,
                after,
                min_delay_ms,
            } => {
                let (before, after) = (var_of(before, c)?, var_of(after, c)?);
                vars[after].predecessors.push((before, *min_delay_ms));
                vars[before].successors.push(after);
                relations.push(Relation::Ordering {
                    before,
                    after,
                    min_delay_ms: *min_delay_ms,
                    source,
                });
            }
            Constraint::Capacity {
                resource_id,
                max_concurrent,
            } => {
                if *max_concurrent == 0 {
                    return Err(UnsupportedConstraintError::for_constraint("zero capacity", c));
                }
                let resource = slot_of(resource_id, c)?;
                let slot = &mut slots[resource];
                slot.capacity = Some(slot.capacity.map_or(*max_concurrent, |cap| cap.min(*max_concurrent)));
                slot.rest_ms = resources[resource].min_rest_ms;
                relations.push(Relation::Cumulative {
                    resource,
                    capacity: *max_concurrent,
                    source,
                });
            }
            Constraint::Exclusion { task_ids } => {
                let mut members = task_ids
                    .iter()
                    .map(|id| var_of(id, c))
                    .collect::<Result<Vec<_>, _>>()?;
                members.sort_unstable();
                members.dedup();
                if members.len() < 2 {
                    return Err(UnsupportedConstraintError::for_constraint(
                        "exclusion needs at least two tasks",
                        c,
                    ));
                }
                let group = groups.len();
                for &m in &members {
                    vars[m].groups.push(group);
                }
                groups.push(members.clone());
                relations.push(Relation::Disjunctive {
                    vars: members,
                    source,
                });
            }
            Constraint::Window {
                task_id,
                earliest_ms,
                latest_ms,
            } => {
                let var = var_of(task_id, c)?;
                let v = &mut vars[var];
                if *earliest_ms != i64::MIN {
                    earliest[var] = Some(earliest[var].map_or(*earliest_ms, |e| e.max(*earliest_ms)));
                }
                if *latest_ms != i64::MAX {
                    v.deadline_ms = Some(v.deadline_ms.map_or(*latest_ms, |d| d.min(*latest_ms)));
                }
                relations.push(Relation::Bound {
                    var,
                    earliest_ms: *earliest_ms,
                    latest_ms: *latest_ms,
                    source,
                });
            }
        }
    }

    for (v, earliest) in vars.iter_mut().zip(earliest) {
        v.start_min = earliest.unwrap_or(0);
        v.start_max = v
            .deadline_ms
            .map_or(i64::MAX, |d| d.saturating_sub(v.duration_ms));
    }

    check_acyclic(&vars, constraints)?;

    let soft = compile_soft(problem, &vars, &slots);

    debug!(
        vars = vars.len(),
        resources = slots.len(),
        relations = relations.len(),
        "compiled constraint graph"
    );

    Ok(ConstraintGraph {
        vars,
        resources: slots,
        relations,
        groups,
        sources: constraints.to_vec(),
        soft,
    })
}

/// Ordering relations must form a DAG or no placement order exists.
fn check_acyclic(
    vars: &[PlacementVar],
    constraints: &[Constraint],
) -> Result<(), UnsupportedConstraintError> {
    let mut graph: DiGraphMap<VarId, ()> = DiGraphMap::with_capacity(vars.len(), 0);
    for v in vars {
        graph.add_node(v.id);
        for &(pred, _) in &v.predecessors {
            graph.add_edge(pred, v.id, ());
        }
    }
    toposort(&graph, None).map(|_| ()).map_err(|cycle| {
        let task_id = &vars[cycle.node_id()].task_id;
        let culprit = constraints.iter().find(|c| {
            matches!(c, Constraint::Precedence { before, after, .. } if before == task_id || after == task_id)
        });
        let reason = format!("ordering cycle through task '{task_id}'");
        match culprit {
            Some(c) => UnsupportedConstraintError::for_constraint(reason, c),
            None => UnsupportedConstraintError::new(reason),
        }
    })
}

/// Soft constraints naming unknown entities contribute nothing.
fn compile_soft(problem: &Problem, vars: &[PlacementVar], slots: &[ResourceSlot]) -> SoftTerms {
    let var_index = |id: &str| vars.binary_search_by(|v| v.task_id.as_str().cmp(id)).ok();
    let slot_index = |id: &str| slots.binary_search_by(|s| s.id.as_str().cmp(id)).ok();

    let mut soft = SoftTerms {
        prefer: vec![Vec::new(); vars.len()],
        avoid: vec![Vec::new(); slots.len()],
        balance: 0,
    };
    for s in &problem.soft_constraints {
        match s {
            SoftConstraint::Prefer {
                task_id,
                resource_id,
                weight,
            } => {
                if let (Some(v), Some(r)) = (var_index(task_id), slot_index(resource_id)) {
                    soft.prefer[v].push((r, *weight));
                }
            }
            SoftConstraint::Avoid {
                resource_id,
                window,
                weight,
            } => {
                if let Some(r) = slot_index(resource_id) {
                    soft.avoid[r].push((*window, *weight));
                }
            }
            SoftConstraint::Balance { weight } => soft.balance += weight,
        }
    }
    soft
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Calendar, Resource, Task};

    fn sample_problem() -> Problem {
        Problem::new(
            vec![
                Task::new("B", 2000).requires("weld"),
                Task::new("A", 1000).after("B"),
                Task::new("C", 500).with_window(100, 5000),
            ],
            vec![
                Resource::new("R2").with_capability("weld").with_min_rest(50),
                Resource::new("R1").with_capacity(2),
            ],
        )
        .with_constraint(Constraint::exclusion(["A", "C"]))
    }

    #[test]
    fn test_compile_sorts_and_indexes() {
        let g = compile(&sample_problem()).unwrap();
        let ids: Vec<_> = g.vars.iter().map(|v| v.task_id.as_str()).collect();
        assert_eq!(ids, ["A", "B", "C"]);
        assert_eq!(g.resources[0].id, "R1");
        assert_eq!(g.var_index("C"), Some(2));
        assert_eq!(g.resource_index("R2"), Some(1));
        assert_eq!(g.var_index("Z"), None);
    }

    #[test]
    fn test_relation_per_constraint() {
        let p = sample_problem();
        let effective = p.effective_constraints();
        let g = compile(&p).unwrap();
        // exclusion + dependency + two capacities + one window
        assert_eq!(effective.len(), 5);
        assert_eq!(g.relation_count(), effective.len());
        assert_eq!(g.sources, effective);
    }

    #[test]
    fn test_candidates_follow_capabilities() {
        let g = compile(&sample_problem()).unwrap();
        assert_eq!(g.vars[1].candidates, vec![1]); // B needs weld -> R2
        assert_eq!(g.vars[0].candidates, vec![0, 1]);
    }

    #[test]
    fn test_window_and_precedence_lowering() {
        let g = compile(&sample_problem()).unwrap();
        let c = &g.vars[2];
        assert_eq!(c.start_min, 100);
        assert_eq!(c.start_max, 4500);
        assert_eq!(c.deadline_ms, Some(5000));
        assert_eq!(g.vars[0].predecessors, vec![(1, 0)]);
        assert_eq!(g.vars[1].successors, vec![0]);
        assert_eq!(g.vars[0].start_min, 0);
        assert_eq!(g.vars[0].start_max, i64::MAX);
    }

    #[test]
    fn test_capacity_and_rest() {
        let g = compile(&sample_problem()).unwrap();
        assert_eq!(g.resources[0].capacity, Some(2));
        assert_eq!(g.resources[1].capacity, Some(1));
        assert_eq!(g.resources[1].rest_ms, 50);
    }

    #[test]
    fn test_relaxed_subset_is_uncapacitated() {
        let p = sample_problem();
        let g = compile_with(&p, &[]).unwrap();
        assert!(g.resources.iter().all(|r| r.capacity.is_none() && r.rest_ms == 0));
        assert!(g.vars.iter().all(|v| v.predecessors.is_empty()));
        assert!(g.groups.is_empty());
    }

    #[test]
    fn test_exclusion_groups() {
        let g = compile(&sample_problem()).unwrap();
        assert_eq!(g.groups, vec![vec![0, 2]]);
        assert_eq!(g.vars[0].groups, vec![0]);
        assert!(g.vars[1].groups.is_empty());
    }

    #[test]
    fn test_too_short_window_is_empty_domain() {
        let p = Problem::new(
            vec![Task::new("T", 100).with_window(0, 50)],
            vec![Resource::new("R")],
        );
        let g = compile(&p).unwrap();
        assert!(g.vars[0].has_empty_domain());
    }

    #[test]
    fn test_calendar_becomes_free_windows() {
        let cal = Calendar::new("cal").with_window(0, 100).with_blocked(40, 60);
        let p = Problem::new(vec![Task::new("T", 10)], vec![Resource::new("R").with_calendar(cal)]);
        let g = compile(&p).unwrap();
        assert_eq!(g.resources[0].free.len(), 2);
    }

    #[test]
    fn test_unknown_reference_is_unsupported() {
        let p = Problem::new(vec![Task::new("A", 10)], vec![Resource::new("R")])
            .with_constraint(Constraint::precedence("A", "GHOST"));
        let err = compile(&p).unwrap_err();
        assert!(err.reason.contains("GHOST"));
        assert_eq!(err.constraint, Some(Constraint::precedence("A", "GHOST")));
    }

    #[test]
    fn test_ordering_cycle_is_unsupported() {
        let p = Problem::new(vec![Task::new("A", 10), Task::new("B", 10)], vec![Resource::new("R")])
            .with_constraint(Constraint::precedence("A", "B"))
            .with_constraint(Constraint::precedence("B", "A"));
        assert!(compile(&p).unwrap_err().reason.contains("cycle"));
    }

    #[test]
    fn test_soft_terms_and_penalty() {
        let p = sample_problem()
            .with_soft_constraint(SoftConstraint::prefer("A", "R2", 3))
            .with_soft_constraint(SoftConstraint::avoid("R1", 0, 1000, 5));
        let g = compile(&p).unwrap();
        assert_eq!(g.soft_penalty(0, 1, 0, 1000), 0);
        assert_eq!(g.soft_penalty(0, 0, 0, 1000), 8);
        assert_eq!(g.soft_penalty(0, 0, 1000, 2000), 3);
        assert_eq!(g.balance_penalty(&[10, 30]), 0);

        let balanced = compile(&p.with_soft_constraint(SoftConstraint::balance(2))).unwrap();
        assert_eq!(balanced.soft.balance, 2);
        assert_eq!(balanced.balance_penalty(&[10, 30, 25]), 40);
        assert_eq!(balanced.soft_penalty(0, 1, 0, 1000), 0);
    }

    #[test]
    fn test_compile_is_deterministic() {
        let p = sample_problem();
        assert_eq!(compile(&p).unwrap(), compile(&p).unwrap());
    }
}
