//! Process-wide solver environment.
//!
//! Engine state shared by every session lives here. It is initialized
//! explicitly when the first [`EnvironmentLease`] is acquired and torn down
//! when the last lease drops, instead of living in an implicit global for
//! the whole process.

use std::sync::{Mutex, MutexGuard, OnceLock};

use tracing::{debug, info};

#[derive(Debug, Default)]
struct EnvironmentState {
    leases: usize,
    /// Number of init/teardown cycles so far.
    generation: u64,
}

fn state() -> MutexGuard<'static, EnvironmentState> {
    static STATE: OnceLock<Mutex<EnvironmentState>> = OnceLock::new();
    STATE
        .get_or_init(|| Mutex::new(EnvironmentState::default()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle to the shared solver environment.
pub struct SolverEnvironment;

impl SolverEnvironment {
    /// Takes a lease, initializing the environment if none was held.
    pub fn acquire() -> EnvironmentLease {
        let mut state = state();
        if state.leases == 0 {
            state.generation += 1;
            info!(generation = state.generation, "solver environment initialized");
        }
        state.leases += 1;
        debug!(leases = state.leases, "solver environment lease acquired");
        EnvironmentLease {
            generation: state.generation,
        }
    }

    /// Leases currently held across the process.
    pub fn active_leases() -> usize {
        state().leases
    }

    /// Whether the environment is currently initialized.
    pub fn is_initialized() -> bool {
        state().leases > 0
    }
}

/// Keeps the environment alive; releases it on drop.
#[derive(Debug)]
pub struct EnvironmentLease {
    generation: u64,
}

impl EnvironmentLease {
    /// Init/teardown cycle this lease belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for EnvironmentLease {
    fn drop(&mut self) {
        let mut state = state();
        state.leases = state.leases.saturating_sub(1);
        debug!(leases = state.leases, "solver environment lease released");
        if state.leases == 0 {
            info!(generation = state.generation, "solver environment torn down");
        }
    }
}
