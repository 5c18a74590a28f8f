//! Session orchestration.
//!
//! The [`Orchestrator`] owns scheduling sessions. Each submit or resubmit
//! runs the pipeline validate, compile, solve, build, and moves the
//! session through its [`SessionState`] machine. Structural defects stop
//! the pipeline before the solver runs and leave the session `Rejected`.
//!
//! # Usage
//!
//! ```
//! use u_planner::config::EngineConfig;
//! use u_planner::models::{Problem, ProblemDelta, Resource, ScheduleStatus, Task};
//! use u_planner::orchestrator::{Orchestrator, SessionState};
//! use u_planner::solver::Budget;
//!
//! let orchestrator = Orchestrator::new(EngineConfig::default()).unwrap();
//! let problem = Problem::new(
//!     vec![Task::new("T1", 1000), Task::new("T2", 500).after("T1")],
//!     vec![Resource::new("R1")],
//! );
//!
//! let report = orchestrator.submit(problem, Budget::millis(100)).unwrap();
//! assert_eq!(report.schedule.status, ScheduleStatus::Feasible);
//! assert_eq!(orchestrator.state(report.session_id).unwrap(), SessionState::Feasible);
//!
//! let delta = ProblemDelta::new().upsert_task(Task::new("T3", 200));
//! let next = orchestrator.resubmit(report.session_id, &delta, Budget::millis(100)).unwrap();
//! assert_eq!(next.schedule.assignments.len(), 3);
//! ```

mod session;

pub use session::{SessionId, SessionState};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::info;

use crate::config::EngineConfig;
use crate::cp::compile;
use crate::error::{Result, SchedulerError};
use crate::models::{Problem, ProblemDelta, Schedule};
use crate::scheduler::{ScheduleBuilder, ScheduleKpi};
use crate::solver::{Budget, SearchBackend, SolverAdapter};
use crate::validation::validate;

use session::{Session, SolveSlot};

/// Result of a successful submit or resubmit.
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub session_id: SessionId,
    pub schedule: Arc<Schedule>,
    /// Quality metrics of `schedule` against the solved problem.
    pub kpi: ScheduleKpi,
}

/// Owns sessions and drives them through the solve pipeline.
///
/// `Send + Sync`: share it behind an `Arc` and call it from any thread.
/// Solves on one session are serialized; different sessions solve in
/// parallel.
#[derive(Debug)]
pub struct Orchestrator {
    adapter: SolverAdapter,
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    next_id: AtomicU64,
}

impl Orchestrator {
    /// Creates an orchestrator after validating `config`.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Ok(Self {
            adapter: SolverAdapter::new(config)?,
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Replaces the search backend used by every session.
    pub fn with_backend(mut self, backend: Arc<dyn SearchBackend>) -> Self {
        self.adapter = self.adapter.with_backend(backend);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        self.adapter.config()
    }

    /// Opens a session for `problem` and solves it.
    ///
    /// A malformed problem still opens a session, left `Rejected`; the
    /// error names it.
    pub fn submit(&self, problem: Problem, budget: impl Into<Budget>) -> Result<SolveReport> {
        let budget = checked_budget(budget.into())?;
        let id = SessionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let session = Arc::new(Session::new(id, problem));

        // Hold the solve lock before the session becomes visible so no
        // resubmit can overtake the first solve.
        let mut slot = session.lock_solve();
        self.write_sessions().insert(id, Arc::clone(&session));
        info!(session = %id, tasks = slot.problem.tasks.len(), "session opened");

        let problem = slot.problem.clone();
        self.run(&session, &mut slot, problem, &budget)
    }

    /// Merges `delta` into the session's problem and solves again, seeding
    /// the search with the previous schedule.
    pub fn resubmit(
        &self,
        id: SessionId,
        delta: &ProblemDelta,
        budget: impl Into<Budget>,
    ) -> Result<SolveReport> {
        let budget = checked_budget(budget.into())?;
        let session = self.session(id)?;
        // Waiting here until any running solve reaches a terminal state.
        let mut slot = session.lock_solve();
        info!(session = %id, empty_delta = delta.is_empty(), "session resubmitted");

        let problem = slot.problem.apply(delta);
        self.run(&session, &mut slot, problem, &budget)
    }

    /// Signals the session's in-flight solve. Returns whether one was
    /// running. The solve still returns its best schedule so far.
    pub fn cancel(&self, id: SessionId) -> Result<bool> {
        let signaled = self.session(id)?.cancel();
        if signaled {
            info!(session = %id, "cancellation requested");
        }
        Ok(signaled)
    }

    /// Last published schedule. `None` before the first build and after a
    /// rejection.
    pub fn schedule(&self, id: SessionId) -> Result<Option<Arc<Schedule>>> {
        Ok(self.session(id)?.schedule())
    }

    pub fn state(&self, id: SessionId) -> Result<SessionState> {
        Ok(self.session(id)?.state())
    }

    /// States visited by the current or last solve.
    pub fn transitions(&self, id: SessionId) -> Result<Vec<SessionState>> {
        Ok(self.session(id)?.transitions())
    }

    /// Removes the session and cancels its in-flight solve. The solver
    /// environment lease is released once the solve finishes.
    pub fn close(&self, id: SessionId) -> Result<()> {
        let session = self
            .write_sessions()
            .remove(&id)
            .ok_or(SchedulerError::UnknownSession(id))?;
        session.cancel();
        info!(session = %id, "session closed");
        Ok(())
    }

    /// Open sessions.
    pub fn session_ids(&self) -> Vec<SessionId> {
        let sessions = self.sessions.read().unwrap_or_else(|p| p.into_inner());
        let mut ids: Vec<SessionId> = sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn session(&self, id: SessionId) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&id)
            .cloned()
            .ok_or(SchedulerError::UnknownSession(id))
    }

    fn write_sessions(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<SessionId, Arc<Session>>> {
        self.sessions.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Runs the pipeline with the solve lock held.
    fn run(
        &self,
        session: &Session,
        slot: &mut SolveSlot,
        problem: Problem,
        budget: &Budget,
    ) -> Result<SolveReport> {
        let id = session.id();
        let hint = session.schedule();
        slot.problem = problem;

        session.begin_trail();
        session.transition(SessionState::Compiling);

        if let Err(source) = validate(&slot.problem) {
            return Err(reject(session, SchedulerError::Malformed { session: id, source }));
        }
        let graph = match compile(&slot.problem) {
            Ok(graph) => graph,
            Err(source) => {
                return Err(reject(session, SchedulerError::Unsupported { session: id, source }));
            }
        };

        let token = session.arm();
        session.transition(SessionState::Solving);
        let outcome = self
            .adapter
            .solve(&graph, budget, hint.as_deref(), &token);

        // The token stays armed through conflict analysis.
        session.transition(SessionState::Built);
        let schedule = ScheduleBuilder::new(&slot.problem, &graph, self.adapter.fallback())
            .with_conflict_budget(self.conflict_budget(budget, outcome.elapsed))
            .with_cancellation(token)
            .build(&outcome);
        let schedule = Arc::new(schedule);
        session.publish(Some(Arc::clone(&schedule)));
        session.disarm();
        session.transition(schedule.status.into());

        let kpi = ScheduleKpi::calculate(&schedule, &slot.problem);
        info!(
            session = %id,
            status = ?schedule.status,
            termination = ?schedule.termination,
            engine = ?schedule.engine,
            makespan_ms = kpi.makespan_ms,
            load_spread_ms = kpi.load_spread_ms,
            conflicts_truncated = schedule.conflicts_truncated,
            steps = outcome.steps,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "solve finished"
        );
        Ok(SolveReport {
            session_id: id,
            schedule,
            kpi,
        })
    }

    /// Conflict analysis gets the configured step limit and whatever the
    /// solve left of the caller's time limit.
    fn conflict_budget(&self, budget: &Budget, spent: Duration) -> Budget {
        let steps = Budget::steps(self.adapter.config().conflict_step_budget);
        match budget.time {
            Some(limit) => steps.with_time(limit.saturating_sub(spent)),
            None => steps,
        }
    }
}

fn checked_budget(budget: Budget) -> Result<Budget> {
    if budget.is_bounded() {
        Ok(budget)
    } else {
        Err(SchedulerError::InvalidBudget(
            "a time or step limit is required".into(),
        ))
    }
}

fn reject(session: &Session, error: SchedulerError) -> SchedulerError {
    session.publish(None);
    session.transition(SessionState::Rejected);
    info!(session = %session.id(), %error, "session rejected");
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Resource, Task};
    use crate::solver::SolverEnvironment;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_orchestrator_is_send_sync() {
        assert_send_sync::<Orchestrator>();
    }

    #[test]
    fn test_rejects_unbounded_budget() {
        let o = Orchestrator::new(EngineConfig::default()).unwrap();
        let err = o
            .submit(Problem::default(), Budget::default())
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidBudget(_)));
        assert!(o.session_ids().is_empty());
    }

    #[test]
    fn test_invalid_config() {
        let err = Orchestrator::new(EngineConfig::default().with_workers(0)).unwrap_err();
        assert!(matches!(err, SchedulerError::Config(_)));
    }

    #[test]
    fn test_full_trail() {
        let o = Orchestrator::new(EngineConfig::default()).unwrap();
        let problem = Problem::new(vec![Task::new("T", 10)], vec![Resource::new("R")]);
        let report = o.submit(problem, Budget::millis(50)).unwrap();
        assert_eq!(
            o.transitions(report.session_id).unwrap(),
            vec![
                SessionState::Empty,
                SessionState::Compiling,
                SessionState::Solving,
                SessionState::Built,
                SessionState::Feasible,
            ]
        );
        assert!(!o.cancel(report.session_id).unwrap());
    }

    #[test]
    fn test_close_releases_session() {
        let o = Orchestrator::new(EngineConfig::default()).unwrap();
        let problem = Problem::new(vec![Task::new("T", 10)], vec![Resource::new("R")]);
        let id = o.submit(problem, Budget::millis(50)).unwrap().session_id;
        assert!(SolverEnvironment::is_initialized());
        o.close(id).unwrap();
        assert!(matches!(o.state(id), Err(SchedulerError::UnknownSession(_))));
        assert!(matches!(o.close(id), Err(SchedulerError::UnknownSession(_))));
    }

    #[test]
    fn test_conflict_budget_takes_what_the_solve_left() {
        let o = Orchestrator::new(EngineConfig::default().with_conflict_step_budget(500)).unwrap();
        let left = o.conflict_budget(&Budget::millis(100), Duration::from_millis(30));
        assert_eq!(left, Budget::steps(500).with_time(Duration::from_millis(70)));

        let overrun = o.conflict_budget(&Budget::millis(100), Duration::from_millis(250));
        assert_eq!(overrun.time, Some(Duration::ZERO));

        assert_eq!(o.conflict_budget(&Budget::steps(9), Duration::from_secs(1)), Budget::steps(500));
    }

    #[test]
    fn test_report_carries_kpi() {
        let o = Orchestrator::new(EngineConfig::default()).unwrap();
        let problem = Problem::new(
            vec![Task::new("A", 10), Task::new("B", 30)],
            vec![Resource::new("R1"), Resource::new("R2")],
        );
        let report = o.submit(problem, Budget::millis(50)).unwrap();
        assert_eq!(report.kpi.makespan_ms, 30);
        assert_eq!(report.kpi.assigned_ratio, 1.0);
        assert_eq!(report.kpi.load_spread_ms, 20);
    }

    #[test]
    fn test_unknown_session() {
        let o = Orchestrator::new(EngineConfig::default()).unwrap();
        let missing = SessionId::new(99);
        assert!(matches!(o.schedule(missing), Err(SchedulerError::UnknownSession(_))));
        assert!(matches!(
            o.resubmit(missing, &ProblemDelta::new(), Budget::millis(10)),
            Err(SchedulerError::UnknownSession(_))
        ));
    }
}
