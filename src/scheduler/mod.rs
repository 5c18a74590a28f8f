//! Schedule construction, verification and KPI evaluation.
//!
//! # Building
//!
//! [`ScheduleBuilder`] maps raw solver output back to domain ids,
//! re-verifies it with [`verify`], classifies feasibility, and asks
//! [`ConflictAnalyzer`] for a minimal conflicting constraint set when the
//! problem turns out infeasible.
//!
//! # KPI
//!
//! `ScheduleKpi` computes standard scheduling metrics: makespan, tardiness,
//! on-time rate, utilization, load spread, and flow time.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 3-4
//! - Junker (2004), "QUICKXPLAIN: Preferred explanations and relaxations
//!   for over-constrained problems"

mod builder;
mod conflict;
mod kpi;
mod verify;

pub use builder::{classify, ScheduleBuilder};
pub use conflict::{ConflictAnalyzer, ConflictReport};
pub use kpi::ScheduleKpi;
pub use verify::verify;
