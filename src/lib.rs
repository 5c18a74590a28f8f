//! Constraint-based scheduling engine.
//!
//! Takes a problem (tasks, resources, hard and soft constraints), compiles
//! it into a solver-neutral constraint graph, solves it within a budget,
//! and returns a verified schedule or a diagnosis of why none exists.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Task`, `Resource`, `Calendar`,
//!   `Constraint`, `Problem`, `ProblemDelta`, `Schedule`
//! - **`validation`**: Structural checks (duplicate IDs, unknown refs,
//!   dependency cycles)
//! - **`cp`**: Constraint compiler (problem to `ConstraintGraph`)
//! - **`dispatching`**: Priority rules ordering the fallback heuristic
//! - **`solver`**: Budgets, the fallback heuristic, the search backend and
//!   the adapter that combines them
//! - **`scheduler`**: Schedule building, re-verification, conflict
//!   analysis, KPIs
//! - **`orchestrator`**: Sessions and the submit / resubmit / cancel API
//! - **`config`**, **`logging`**, **`error`**: Ambient plumbing
//!
//! # Pipeline
//!
//! ```text
//! submit -> validate -> compile -> solve (fallback, then search) -> build -> Schedule
//! ```
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Baptiste et al. (2001), "Constraint-Based Scheduling"
//! - Brucker (2007), "Scheduling Algorithms"

pub mod config;
pub mod cp;
pub mod dispatching;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod scheduler;
pub mod solver;
pub mod validation;

pub use config::{EngineConfig, SolverMode};
pub use error::{
    ConfigError, MalformedProblemError, ProblemIssue, SchedulerError, UnsupportedConstraintError,
};
pub use models::{Problem, ProblemDelta, Schedule, ScheduleStatus, Termination};
pub use orchestrator::{Orchestrator, SessionId, SessionState, SolveReport};
pub use scheduler::ScheduleKpi;
pub use solver::Budget;
