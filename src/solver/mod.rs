//! Solver adapter.
//!
//! Runs the deterministic [`FallbackHeuristic`] first, then, when the mode
//! and budget allow it, a [`SearchBackend`] seeded with the fallback result
//! and the previous schedule. Whatever happens inside the backend (error or
//! panic), the adapter returns an answer: a failed search degrades to the
//! fallback result tagged `TimedOut`.
//!
//! # Usage
//!
//! ```
//! use u_planner::config::EngineConfig;
//! use u_planner::cp::compile;
//! use u_planner::models::{Problem, Resource, Task};
//! use u_planner::solver::{Budget, CancellationToken, SolverAdapter};
//!
//! let problem = Problem::new(vec![Task::new("T1", 1000)], vec![Resource::new("R1")]);
//! let graph = compile(&problem).unwrap();
//! let adapter = SolverAdapter::new(EngineConfig::default()).unwrap();
//! let outcome = adapter.solve(&graph, &Budget::millis(50), None, &CancellationToken::new());
//! assert!(outcome.solution.is_complete());
//! ```

mod budget;
mod environment;
mod fallback;
mod placement;
mod search;

pub use budget::{Budget, BudgetClock, CancellationToken, StopReason};
pub use environment::{EnvironmentLease, SolverEnvironment};
pub use fallback::FallbackHeuristic;
pub use placement::{decode, Decoded, Placement, RawSolution, Score, Sequence};
pub use search::{
    insert_move, invert_move, repin_move, swap_move, BackendError, PerturbationSearch,
    SearchBackend, SearchRequest, SearchSettings,
};

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{EngineConfig, SolverMode};
use crate::cp::{ConstraintGraph, VarId};
use crate::error::ConfigError;
use crate::models::{EngineKind, Schedule, Termination};

/// Raw solver output plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveOutcome {
    pub solution: RawSolution,
    pub termination: Termination,
    pub engine: EngineKind,
    /// Placement steps consumed, search included.
    pub steps: u64,
    pub elapsed: Duration,
}

/// Entry point from the orchestrator into solving.
#[derive(Debug, Clone)]
pub struct SolverAdapter {
    config: EngineConfig,
    fallback: FallbackHeuristic,
    backend: Arc<dyn SearchBackend>,
}

impl SolverAdapter {
    /// Validates `config` and builds its fallback rule chain.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let fallback = FallbackHeuristic::with_engine(config.fallback_engine()?);
        Ok(Self {
            config,
            fallback,
            backend: Arc::new(PerturbationSearch),
        })
    }

    /// Replaces the search backend.
    pub fn with_backend(mut self, backend: Arc<dyn SearchBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn fallback(&self) -> &FallbackHeuristic {
        &self.fallback
    }

    /// Solves `graph` within `budget`.
    ///
    /// `hint` only seeds the search; it never constrains placements.
    pub fn solve(
        &self,
        graph: &ConstraintGraph,
        budget: &Budget,
        hint: Option<&Schedule>,
        cancel: &CancellationToken,
    ) -> SolveOutcome {
        let clock = BudgetClock::start(budget, cancel.clone(), self.config.poll_every_steps);
        let fallback = self.fallback.run(graph, Some(&clock));

        if let Some(reason) = fallback.stopped {
            debug!(?reason, steps = clock.steps_used(), "fallback cut short");
            return outcome(fallback.solution, reason.into(), EngineKind::Fallback, &clock);
        }
        let incumbent = fallback.solution;

        if !self.search_enabled(budget) || is_optimal(graph, &incumbent) {
            return outcome(incumbent, Termination::Completed, EngineKind::Fallback, &clock);
        }

        let hint = hint.map(|schedule| hint_sequence(graph, schedule, &incumbent.order));
        let request = SearchRequest {
            graph,
            incumbent: &incumbent,
            hint: hint.as_ref(),
            clock: &clock,
            settings: SearchSettings {
                workers: self.config.workers,
                seed: self.config.seed,
                iterations: self.config.search_iterations,
                stall_iterations: self.config.stall_iterations,
            },
        };

        match panic::catch_unwind(AssertUnwindSafe(|| self.backend.search(&request))) {
            Ok(Ok(found)) => {
                let termination = clock.stopped().map_or(Termination::Completed, Termination::from);
                debug!(
                    backend = self.backend.name(),
                    ?termination,
                    fallback_makespan_ms = incumbent.score.makespan_ms,
                    search_makespan_ms = found.score.makespan_ms,
                    "search finished"
                );
                if found.score < incumbent.score {
                    outcome(found, termination, EngineKind::Search, &clock)
                } else {
                    outcome(incumbent, termination, EngineKind::Fallback, &clock)
                }
            }
            Ok(Err(error)) => {
                warn!(backend = self.backend.name(), %error, "search backend failed, using fallback result");
                outcome(incumbent, Termination::TimedOut, EngineKind::Fallback, &clock)
            }
            Err(_) => {
                warn!(backend = self.backend.name(), "search backend panicked, using fallback result");
                outcome(incumbent, Termination::TimedOut, EngineKind::Fallback, &clock)
            }
        }
    }

    fn search_enabled(&self, budget: &Budget) -> bool {
        self.config.mode == SolverMode::Search
            && budget
                .time
                .map_or(true, |t| t >= Duration::from_millis(self.config.min_search_budget_ms))
    }
}

/// Nothing left to improve.
fn is_optimal(graph: &ConstraintGraph, solution: &RawSolution) -> bool {
    solution.is_complete()
        && solution.score.soft_penalty == 0
        && solution.score.makespan_ms <= graph.makespan_lower_bound()
}

/// Previous assignments in start order, pinned to their old resources;
/// variables the schedule does not know follow in `fallback_order`.
fn hint_sequence(graph: &ConstraintGraph, schedule: &Schedule, fallback_order: &[VarId]) -> Sequence {
    let mut hinted: Vec<(i64, VarId, Option<usize>)> = schedule
        .assignments
        .iter()
        .filter_map(|a| {
            let var = graph.var_index(&a.task_id)?;
            Some((a.start_ms, var, graph.resource_index(&a.resource_id)))
        })
        .collect();
    hinted.sort_unstable();

    let mut pinned = vec![None; graph.var_count()];
    let mut seen = vec![false; graph.var_count()];
    let mut order = Vec::with_capacity(graph.var_count());
    for (_, var, resource) in hinted {
        if !seen[var] {
            seen[var] = true;
            pinned[var] = resource;
            order.push(var);
        }
    }
    order.extend(fallback_order.iter().copied().filter(|&v| !seen[v]));
    Sequence { order, pinned }
}

fn outcome(
    solution: RawSolution,
    termination: Termination,
    engine: EngineKind,
    clock: &BudgetClock,
) -> SolveOutcome {
    SolveOutcome {
        solution,
        termination,
        engine,
        steps: clock.steps_used(),
        elapsed: clock.elapsed(),
    }
}
