//! Schedule builder.
//!
//! Turns raw solver output into a [`Schedule`]: maps variables back to task
//! and resource ids, re-verifies every placement against the problem,
//! classifies feasibility, and runs conflict analysis when infeasible.

use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::cp::ConstraintGraph;
use crate::models::{Assignment, Problem, Schedule, ScheduleStatus, Termination};
use crate::solver::{Budget, CancellationToken, FallbackHeuristic, SolveOutcome};

use super::conflict::{ConflictAnalyzer, ConflictReport};
use super::verify::verify;

/// Builds schedules for one compiled problem.
#[derive(Debug, Clone)]
pub struct ScheduleBuilder<'a> {
    problem: &'a Problem,
    graph: &'a ConstraintGraph,
    fallback: &'a FallbackHeuristic,
    conflict_budget: Budget,
    cancel: CancellationToken,
}

impl<'a> ScheduleBuilder<'a> {
    pub fn new(problem: &'a Problem, graph: &'a ConstraintGraph, fallback: &'a FallbackHeuristic) -> Self {
        Self {
            problem,
            graph,
            fallback,
            conflict_budget: Budget::steps(200_000),
            cancel: CancellationToken::new(),
        }
    }

    /// Budget for conflict analysis. Its time bound starts when the
    /// analysis does.
    pub fn with_conflict_budget(mut self, budget: Budget) -> Self {
        self.conflict_budget = budget;
        self
    }

    /// Token that stops conflict analysis early.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Builds the schedule for `outcome`.
    pub fn build(&self, outcome: &SolveOutcome) -> Schedule {
        let solution = &outcome.solution;
        let mut assignments = Vec::with_capacity(solution.placements.len());
        let mut unassigned = Vec::new();
        for (var, placement) in self.graph.vars.iter().zip(&solution.placements) {
            match placement {
                Some(p) => assignments.push(Assignment::new(
                    var.task_id.clone(),
                    self.graph.resources[p.resource].id.clone(),
                    p.start_ms,
                    p.end_ms,
                )),
                None => unassigned.push(var.task_id.clone()),
            }
        }
        assignments.sort_by(assignment_order);
        unassigned.sort();

        let violations = verify(self.problem, &self.graph.sources, &assignments);
        if !violations.is_empty() {
            warn!(count = violations.len(), "solver output failed verification");
        }

        let status = classify(unassigned.is_empty(), violations.is_empty(), outcome.termination);
        let report = if status == ScheduleStatus::Infeasible {
            let analyzer = ConflictAnalyzer::new(
                self.problem,
                self.fallback,
                &self.conflict_budget,
                self.cancel.clone(),
            );
            analyzer.analyze(&self.graph.sources)
        } else {
            ConflictReport::default()
        };

        debug!(
            ?status,
            termination = ?outcome.termination,
            engine = ?outcome.engine,
            assigned = assignments.len(),
            unassigned = unassigned.len(),
            conflicts = report.conflicts.len(),
            conflicts_truncated = report.truncated,
            "schedule built"
        );

        Schedule {
            assignments,
            status,
            termination: outcome.termination,
            engine: outcome.engine,
            unassigned,
            conflicts: report.conflicts,
            conflicts_truncated: report.truncated,
            violations,
            soft_penalty: solution.score.soft_penalty,
        }
    }
}

/// Feasibility from completeness, verification and termination.
///
/// A partial result only counts as partially feasible when the solve was
/// cut short; a completed solve that left tasks out is infeasible.
pub fn classify(all_assigned: bool, verified: bool, termination: Termination) -> ScheduleStatus {
    match (verified, all_assigned) {
        (false, _) => ScheduleStatus::Infeasible,
        (true, true) => ScheduleStatus::Feasible,
        (true, false) if termination != Termination::Completed => ScheduleStatus::PartiallyFeasible,
        (true, false) => ScheduleStatus::Infeasible,
    }
}

fn assignment_order(a: &Assignment, b: &Assignment) -> Ordering {
    (a.start_ms, a.end_ms, &a.resource_id, &a.task_id).cmp(&(b.start_ms, b.end_ms, &b.resource_id, &b.task_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::compile;
    use crate::models::{Constraint, EngineKind, Resource, Task, ViolationType};
    use crate::solver::{Placement, RawSolution, Score};
    use std::time::Duration;

    fn outcome(placements: Vec<Option<Placement>>, termination: Termination) -> SolveOutcome {
        let unassigned = placements.iter().filter(|p| p.is_none()).count();
        SolveOutcome {
            solution: RawSolution {
                order: (0..placements.len()).collect(),
                placements,
                score: Score {
                    unassigned,
                    ..Score::default()
                },
            },
            termination,
            engine: EngineKind::Fallback,
            steps: 0,
            elapsed: Duration::ZERO,
        }
    }

    fn at(resource: usize, start_ms: i64, end_ms: i64) -> Option<Placement> {
        Some(Placement {
            resource,
            start_ms,
            end_ms,
        })
    }

    #[test]
    fn test_classify() {
        use ScheduleStatus::*;
        assert_eq!(classify(true, true, Termination::Completed), Feasible);
        assert_eq!(classify(true, true, Termination::TimedOut), Feasible);
        assert_eq!(classify(false, true, Termination::TimedOut), PartiallyFeasible);
        assert_eq!(classify(false, true, Termination::Cancelled), PartiallyFeasible);
        assert_eq!(classify(false, true, Termination::Completed), Infeasible);
        assert_eq!(classify(true, false, Termination::Completed), Infeasible);
    }

    #[test]
    fn test_build_sorts_and_maps_ids() {
        let p = Problem::new(
            vec![Task::new("A", 10), Task::new("B", 10), Task::new("C", 10)],
            vec![Resource::new("R1"), Resource::new("R2")],
        );
        let g = compile(&p).unwrap();
        let fallback = FallbackHeuristic::new();
        let s = ScheduleBuilder::new(&p, &g, &fallback).build(&outcome(
            vec![at(1, 0, 10), at(0, 10, 20), at(0, 0, 10)],
            Termination::Completed,
        ));
        let ids: Vec<&str> = s.assignments.iter().map(|a| a.task_id.as_str()).collect();
        assert_eq!(ids, vec!["C", "A", "B"]);
        assert_eq!(s.assignments[1].resource_id, "R2");
        assert_eq!(s.status, ScheduleStatus::Feasible);
        assert!(s.conflicts.is_empty());
    }

    #[test]
    fn test_partial_when_cut_short() {
        let p = Problem::new(vec![Task::new("A", 10), Task::new("B", 10)], vec![Resource::new("R")]);
        let g = compile(&p).unwrap();
        let fallback = FallbackHeuristic::new();
        let s = ScheduleBuilder::new(&p, &g, &fallback)
            .build(&outcome(vec![at(0, 0, 10), None], Termination::TimedOut));
        assert_eq!(s.status, ScheduleStatus::PartiallyFeasible);
        assert_eq!(s.unassigned, vec!["B"]);
        assert!(s.conflicts.is_empty());
    }

    #[test]
    fn test_bad_output_is_flagged() {
        let p = Problem::new(vec![Task::new("A", 10), Task::new("B", 10)], vec![Resource::new("R")]);
        let g = compile(&p).unwrap();
        let fallback = FallbackHeuristic::new();
        let s = ScheduleBuilder::new(&p, &g, &fallback)
            .build(&outcome(vec![at(0, 0, 10), at(0, 5, 15)], Termination::Completed));
        assert_eq!(s.status, ScheduleStatus::Infeasible);
        assert_eq!(s.violations[0].violation_type, ViolationType::CapacityExceeded);
    }

    #[test]
    fn test_infeasible_reports_conflict() {
        let p = Problem::new(
            vec![
                Task::new("A", 100).with_deadline(100),
                Task::new("B", 100).with_deadline(100),
            ],
            vec![Resource::new("R")],
        );
        let g = compile(&p).unwrap();
        let fallback = FallbackHeuristic::new();
        let decoded = fallback.run(&g, None);
        let mut out = outcome(decoded.solution.placements.clone(), Termination::Completed);
        out.solution = decoded.solution;

        let s = ScheduleBuilder::new(&p, &g, &fallback).build(&out);
        assert_eq!(s.status, ScheduleStatus::Infeasible);
        assert_eq!(s.unassigned.len(), 1);
        assert_eq!(s.conflicts, vec![Constraint::capacity("R", 1)]);
    }

    #[test]
    fn test_cancelled_analysis_marks_truncation() {
        let p = Problem::new(
            vec![
                Task::new("A", 100).with_deadline(100),
                Task::new("B", 100).with_deadline(100),
            ],
            vec![Resource::new("R")],
        );
        let g = compile(&p).unwrap();
        let fallback = FallbackHeuristic::new();
        let mut out = outcome(Vec::new(), Termination::Completed);
        out.solution = fallback.run(&g, None).solution;

        let token = CancellationToken::new();
        token.cancel();
        let s = ScheduleBuilder::new(&p, &g, &fallback)
            .with_cancellation(token)
            .build(&out);
        assert_eq!(s.status, ScheduleStatus::Infeasible);
        assert!(s.conflicts.is_empty());
        assert!(s.conflicts_truncated);

        let s = ScheduleBuilder::new(&p, &g, &fallback)
            .with_conflict_budget(Budget::steps(100_000))
            .build(&out);
        assert!(!s.conflicts_truncated);
    }
}
