//! Scheduling domain models.
//!
//! Provides the data types for representing scheduling problems and
//! their solutions.
//!
//! # Domain Mappings
//!
//! | u-planner | Rostering | Manufacturing | Logistics |
//! |-----------|-----------|---------------|-----------|
//! | Task | Shift | Job | Shipment |
//! | Resource | Staff member | Machine | Truck |
//! | Calendar | Leave days | Maintenance | Driver hours |
//! | SoftConstraint | Day-off request | Preferred line | Preferred depot |

mod calendar;
mod constraint;
mod problem;
mod resource;
mod schedule;
mod task;

pub(crate) use calendar::earliest_fit_in;
pub use calendar::{Calendar, TimeWindow};
pub use constraint::{Constraint, ConstraintKind, SoftConstraint};
pub use problem::{Problem, ProblemDelta};
pub use resource::Resource;
pub use schedule::{
    Assignment, EngineKind, Schedule, ScheduleStatus, Termination, Violation, ViolationType,
};
pub use task::Task;
