//! Conflict analysis for infeasible problems.
//!
//! Finds a small set of hard constraints whose removal makes the problem
//! schedulable:
//!
//! 1. Relax constraints one at a time, cumulatively, in
//!    [`ConstraintKind::RELAXATION_ORDER`] (declaration order within a
//!    kind), until the fallback heuristic places every task.
//! 2. Shrink the relaxed set: re-add its members, last removed first, and
//!    keep each one whose return still leaves the problem schedulable.
//!
//! Every feasibility check shares one clock, bounded by the caller's
//! remaining time, a step limit and the session's cancellation token. When
//! the clock stops during relaxation nothing is reported; when it stops
//! while shrinking, the still-relaxed set is reported as is. Either way the
//! report is marked truncated.
//!
//! Feasibility here means "the fallback heuristic finds a complete
//! placement", so the result is minimal with respect to that heuristic.

use tracing::debug;

use crate::cp::compile_with;
use crate::models::{Constraint, ConstraintKind, Problem};
use crate::solver::{Budget, BudgetClock, CancellationToken, FallbackHeuristic};

/// Outcome of one analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictReport {
    pub conflicts: Vec<Constraint>,
    /// The clock stopped before the analysis finished.
    pub truncated: bool,
}

/// Greedy relaxation over a constraint list.
#[derive(Debug)]
pub struct ConflictAnalyzer<'a> {
    problem: &'a Problem,
    fallback: &'a FallbackHeuristic,
    clock: BudgetClock,
}

impl<'a> ConflictAnalyzer<'a> {
    /// Starts the analysis clock. The time bound of `budget` starts now.
    pub fn new(
        problem: &'a Problem,
        fallback: &'a FallbackHeuristic,
        budget: &Budget,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            problem,
            fallback,
            clock: BudgetClock::start(budget, cancel, 1),
        }
    }

    /// Conflicting subset of `constraints`, in relaxation order. Empty and
    /// not truncated when no relaxation restores feasibility.
    pub fn analyze(&self, constraints: &[Constraint]) -> ConflictReport {
        let mut active = vec![true; constraints.len()];
        let mut removed: Vec<usize> = Vec::new();
        let mut restored = false;

        'relax: for kind in ConstraintKind::RELAXATION_ORDER {
            for (i, c) in constraints.iter().enumerate() {
                if c.kind() != kind {
                    continue;
                }
                active[i] = false;
                removed.push(i);
                match self.feasible(constraints, &active) {
                    Some(true) => {
                        restored = true;
                        break 'relax;
                    }
                    Some(false) => {}
                    None => return self.give_up(Vec::new()),
                }
            }
        }
        if !restored {
            debug!("no relaxation restores feasibility");
            return ConflictReport::default();
        }

        let mut truncated = false;
        for &i in removed.iter().rev() {
            active[i] = true;
            match self.feasible(constraints, &active) {
                Some(true) => {}
                Some(false) => active[i] = false,
                None => {
                    active[i] = false;
                    truncated = true;
                    break;
                }
            }
        }
        let conflicts: Vec<Constraint> = removed
            .iter()
            .filter(|&&i| !active[i])
            .map(|&i| constraints[i].clone())
            .collect();
        if truncated {
            return self.give_up(conflicts);
        }

        debug!(
            relaxed = removed.len(),
            conflicts = conflicts.len(),
            steps = self.clock.steps_used(),
            "conflict analysis finished"
        );
        ConflictReport {
            conflicts,
            truncated: false,
        }
    }

    /// `None` once the clock has stopped.
    fn feasible(&self, constraints: &[Constraint], active: &[bool]) -> Option<bool> {
        self.clock.check().ok()?;
        let subset: Vec<Constraint> = constraints
            .iter()
            .zip(active)
            .filter(|(_, &on)| on)
            .map(|(c, _)| c.clone())
            .collect();
        let Ok(graph) = compile_with(self.problem, &subset) else {
            return Some(false);
        };
        let decoded = self.fallback.run(&graph, Some(&self.clock));
        match decoded.stopped {
            Some(_) => None,
            None => Some(decoded.solution.is_complete()),
        }
    }

    fn give_up(&self, conflicts: Vec<Constraint>) -> ConflictReport {
        debug!(
            steps = self.clock.steps_used(),
            reason = ?self.clock.stopped(),
            kept = conflicts.len(),
            "conflict analysis stopped early"
        );
        ConflictReport {
            conflicts,
            truncated: true,
        }
    }
}
