//! Solve budgets and cooperative cancellation.
//!
//! A budget bounds a solve by wall time (monotonic [`Instant`]), by
//! placement steps, or both. [`BudgetClock`] is shared by every search
//! worker: it counts steps atomically, checks the cancellation flag on
//! every step and the wall clock every `poll_every` steps.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::models::Termination;

/// Upper bound on solver effort. At least one bound must be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Budget {
    /// Wall-clock limit.
    pub time: Option<Duration>,
    /// Placement step limit.
    pub steps: Option<u64>,
}

impl Budget {
    pub fn time(limit: Duration) -> Self {
        Self {
            time: Some(limit),
            steps: None,
        }
    }

    pub fn millis(ms: u64) -> Self {
        Self::time(Duration::from_millis(ms))
    }

    pub fn steps(limit: u64) -> Self {
        Self {
            time: None,
            steps: Some(limit),
        }
    }

    pub fn with_time(mut self, limit: Duration) -> Self {
        self.time = Some(limit);
        self
    }

    pub fn with_steps(mut self, limit: u64) -> Self {
        self.steps = Some(limit);
        self
    }

    /// A budget with neither bound cannot be honoured.
    pub fn is_bounded(&self) -> bool {
        self.time.is_some() || self.steps.is_some()
    }
}

impl From<Duration> for Budget {
    fn from(limit: Duration) -> Self {
        Self::time(limit)
    }
}

/// Cloneable cancellation flag shared between a caller and a solve.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Why a clock stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Exhausted,
    Cancelled,
}

impl From<StopReason> for Termination {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::Exhausted => Termination::TimedOut,
            StopReason::Cancelled => Termination::Cancelled,
        }
    }
}

const RUNNING: u8 = 0;
const EXHAUSTED: u8 = 1;
const CANCELLED: u8 = 2;

/// Shared step counter and deadline for one solve.
#[derive(Debug)]
pub struct BudgetClock {
    started: Instant,
    deadline: Option<Instant>,
    max_steps: Option<u64>,
    poll_every: u64,
    steps: AtomicU64,
    state: AtomicU8,
    cancel: CancellationToken,
}

impl BudgetClock {
    pub fn start(budget: &Budget, cancel: CancellationToken, poll_every: u64) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: budget.time.and_then(|t| started.checked_add(t)),
            max_steps: budget.steps,
            poll_every: poll_every.max(1),
            steps: AtomicU64::new(0),
            state: AtomicU8::new(RUNNING),
            cancel,
        }
    }

    /// Records one placement step.
    ///
    /// Called after the step's work, so the first step always completes.
    pub fn tick(&self) -> Result<(), StopReason> {
        let n = self.steps.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(reason) = self.stopped() {
            return Err(reason);
        }
        if self.cancel.is_cancelled() {
            return Err(self.stop(CANCELLED));
        }
        if self.max_steps.is_some_and(|max| n >= max) {
            return Err(self.stop(EXHAUSTED));
        }
        if n % self.poll_every == 0 && self.deadline_passed() {
            return Err(self.stop(EXHAUSTED));
        }
        Ok(())
    }

    /// Full check without consuming a step.
    pub fn check(&self) -> Result<(), StopReason> {
        if let Some(reason) = self.stopped() {
            return Err(reason);
        }
        if self.cancel.is_cancelled() {
            return Err(self.stop(CANCELLED));
        }
        if self.deadline_passed() {
            return Err(self.stop(EXHAUSTED));
        }
        Ok(())
    }

    pub fn stopped(&self) -> Option<StopReason> {
        match self.state.load(Ordering::Acquire) {
            EXHAUSTED => Some(StopReason::Exhausted),
            CANCELLED => Some(StopReason::Cancelled),
            _ => None,
        }
    }

    pub fn steps_used(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left, if the budget has a time bound.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// First stop wins.
    fn stop(&self, reason: u8) -> StopReason {
        let _ = self
            .state
            .compare_exchange(RUNNING, reason, Ordering::AcqRel, Ordering::Acquire);
        self.stopped().unwrap_or(StopReason::Exhausted)
    }
}
