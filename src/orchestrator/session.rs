//! Scheduling sessions and their state machine.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{Problem, Schedule, ScheduleStatus};
use crate::solver::{CancellationToken, EnvironmentLease, SolverEnvironment};

/// Opaque session handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Lifecycle of a session.
///
/// ```text
/// Empty -> Compiling -> Solving -> Built -> Feasible | PartiallyFeasible | Infeasible
///              |
///              +-> Rejected
/// ```
/// Any terminal state may re-enter `Compiling` through a resubmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Empty,
    Compiling,
    Solving,
    Built,
    Feasible,
    PartiallyFeasible,
    Infeasible,
    Rejected,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Feasible | Self::PartiallyFeasible | Self::Infeasible | Self::Rejected
        )
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Empty, Compiling) => true,
            (Compiling, Solving | Rejected) => true,
            (Solving, Built) => true,
            (Built, Feasible | PartiallyFeasible | Infeasible) => true,
            (from, Compiling) => from.is_terminal(),
            _ => false,
        }
    }
}

impl From<ScheduleStatus> for SessionState {
    fn from(status: ScheduleStatus) -> Self {
        match status {
            ScheduleStatus::Feasible => Self::Feasible,
            ScheduleStatus::PartiallyFeasible => Self::PartiallyFeasible,
            ScheduleStatus::Infeasible => Self::Infeasible,
        }
    }
}

#[derive(Debug)]
struct Lifecycle {
    state: SessionState,
    /// States visited by the current or last solve, starting state first.
    trail: Vec<SessionState>,
}

/// Data owned by whoever holds the solve lock.
#[derive(Debug)]
pub(crate) struct SolveSlot {
    /// The problem of the last (possibly rejected) solve.
    pub problem: Problem,
}

/// One scheduling session.
///
/// The solve lock serializes solves. The cancellation token and the
/// published schedule sit behind their own short locks so `cancel`,
/// `schedule` and `state` never wait for a running solve.
#[derive(Debug)]
pub(crate) struct Session {
    id: SessionId,
    solve: Mutex<SolveSlot>,
    control: Mutex<Option<CancellationToken>>,
    schedule: RwLock<Option<Arc<Schedule>>>,
    lifecycle: Mutex<Lifecycle>,
    _lease: EnvironmentLease,
}

fn recover<T>(lock: std::sync::LockResult<T>) -> T {
    lock.unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Session {
    pub fn new(id: SessionId, problem: Problem) -> Self {
        Self {
            id,
            solve: Mutex::new(SolveSlot { problem }),
            control: Mutex::new(None),
            schedule: RwLock::new(None),
            lifecycle: Mutex::new(Lifecycle {
                state: SessionState::Empty,
                trail: vec![SessionState::Empty],
            }),
            _lease: SolverEnvironment::acquire(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn lock_solve(&self) -> MutexGuard<'_, SolveSlot> {
        recover(self.solve.lock())
    }

    pub fn state(&self) -> SessionState {
        recover(self.lifecycle.lock()).state
    }

    pub fn transitions(&self) -> Vec<SessionState> {
        recover(self.lifecycle.lock()).trail.clone()
    }

    /// Starts a new trail at the current state.
    pub fn begin_trail(&self) {
        let mut lifecycle = recover(self.lifecycle.lock());
        lifecycle.trail = vec![lifecycle.state];
    }

    pub fn transition(&self, next: SessionState) {
        let mut lifecycle = recover(self.lifecycle.lock());
        let from = lifecycle.state;
        if !from.can_transition_to(next) {
            warn!(session = %self.id, ?from, to = ?next, "unexpected session transition");
        }
        lifecycle.state = next;
        lifecycle.trail.push(next);
        debug!(session = %self.id, ?from, to = ?next, "session transition");
    }

    /// Installs a fresh token for the solve about to start.
    pub fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *recover(self.control.lock()) = Some(token.clone());
        token
    }

    pub fn disarm(&self) {
        *recover(self.control.lock()) = None;
    }

    /// Signals the in-flight solve, if any.
    pub fn cancel(&self) -> bool {
        match recover(self.control.lock()).as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn schedule(&self) -> Option<Arc<Schedule>> {
        recover(self.schedule.read()).clone()
    }

    pub fn publish(&self, schedule: Option<Arc<Schedule>>) {
        *recover(self.schedule.write()) = schedule;
    }
}
