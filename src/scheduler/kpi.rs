//! Schedule quality metrics (KPIs).
//!
//! Computes standard scheduling performance indicators from a schedule and
//! the problem it solves.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Makespan (C_max) | Latest completion time |
//! | Total Tardiness | Sum of max(0, completion - deadline) |
//! | Maximum Tardiness | Largest single delay |
//! | On-Time Rate | Fraction meeting deadlines |
//! | Avg Utilization | Mean resource busyness over the makespan |
//! | Load Spread | Busiest minus idlest resource busy time |
//! | Assigned Ratio | Fraction of tasks with an assignment |
//! | Avg Flow Time | Mean time from earliest start to completion |
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use std::collections::BTreeMap;

use crate::models::{Problem, Schedule};

/// Schedule performance indicators.
///
/// All time values are in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleKpi {
    pub makespan_ms: i64,
    pub total_tardiness_ms: i64,
    pub max_tardiness_ms: i64,
    /// Fraction of assigned tasks completing on time (0.0..1.0).
    pub on_time_rate: f64,
    pub avg_utilization: f64,
    /// Busy time of every resource in the problem, idle ones included.
    pub busy_by_resource: BTreeMap<String, i64>,
    pub utilization_by_resource: BTreeMap<String, f64>,
    /// Workload imbalance: max - min busy time across resources.
    pub load_spread_ms: i64,
    pub assigned_ratio: f64,
    pub soft_penalty: i64,
    pub avg_flow_time_ms: f64,
}

impl ScheduleKpi {
    /// Computes KPIs from a schedule and its problem.
    pub fn calculate(schedule: &Schedule, problem: &Problem) -> Self {
        let makespan = schedule.makespan_ms();
        let mut total_tardiness: i64 = 0;
        let mut max_tardiness: i64 = 0;
        let mut on_time_count: usize = 0;
        let mut total_flow_time: f64 = 0.0;
        let mut counted_tasks: usize = 0;

        for task in &problem.tasks {
            let Some(assignment) = schedule.assignment_for_task(&task.id) else {
                continue;
            };
            let completion = assignment.end_ms;
            counted_tasks += 1;

            let release = task.earliest_start_ms.unwrap_or(0);
            total_flow_time += (completion - release) as f64;

            match task.deadline_ms {
                Some(deadline) if completion > deadline => {
                    let tardiness = completion - deadline;
                    total_tardiness += tardiness;
                    max_tardiness = max_tardiness.max(tardiness);
                }
                _ => on_time_count += 1,
            }
        }

        let mut busy_by_resource: BTreeMap<String, i64> =
            problem.resources.iter().map(|r| (r.id.clone(), 0)).collect();
        for (id, busy) in schedule.busy_time_by_resource() {
            busy_by_resource.insert(id, busy);
        }

        let utilization_by_resource: BTreeMap<String, f64> = busy_by_resource
            .keys()
            .map(|id| {
                let u = schedule.resource_utilization(id, makespan).unwrap_or(0.0);
                (id.clone(), u)
            })
            .collect();
        let avg_utilization = if utilization_by_resource.is_empty() {
            0.0
        } else {
            utilization_by_resource.values().sum::<f64>() / utilization_by_resource.len() as f64
        };

        let load_spread_ms = match (busy_by_resource.values().max(), busy_by_resource.values().min()) {
            (Some(max), Some(min)) => max - min,
            _ => 0,
        };

        let on_time_rate = if counted_tasks == 0 {
            1.0
        } else {
            on_time_count as f64 / counted_tasks as f64
        };
        let avg_flow_time_ms = if counted_tasks == 0 {
            0.0
        } else {
            total_flow_time / counted_tasks as f64
        };
        let assigned_ratio = if problem.tasks.is_empty() {
            1.0
        } else {
            counted_tasks as f64 / problem.tasks.len() as f64
        };

        Self {
            makespan_ms: makespan,
            total_tardiness_ms: total_tardiness,
            max_tardiness_ms: max_tardiness,
            on_time_rate,
            avg_utilization,
            busy_by_resource,
            utilization_by_resource,
            load_spread_ms,
            assigned_ratio,
            soft_penalty: schedule.soft_penalty,
            avg_flow_time_ms,
        }
    }

    /// Whether the schedule meets the given quality thresholds.
    pub fn meets_thresholds(&self, max_tardiness: i64, min_utilization: f64) -> bool {
        self.max_tardiness_ms <= max_tardiness && self.avg_utilization >= min_utilization
    }
}
