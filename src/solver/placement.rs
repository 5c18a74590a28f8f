//! Serial schedule generation over a [`ConstraintGraph`].
//!
//! A [`Sequence`] (priority order plus optional pinned resources) is decoded
//! into placements: repeatedly take the eligible variable (every ordering
//! predecessor decided) with the best rank and put it at its earliest
//! feasible start. Both the fallback heuristic and the search backend use
//! this decoder, so every placement it emits satisfies calendars, windows,
//! precedence, capacity with rest gaps, and exclusion by construction.
//!
//! # Reference
//! Kolisch (1996), "Serial and parallel resource-constrained project
//! scheduling methods revisited"

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::cp::{ConstraintGraph, ResourceIdx, VarId};
use crate::models::{earliest_fit_in, TimeWindow};

use super::budget::{BudgetClock, StopReason};

/// Where and when a variable was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub resource: ResourceIdx,
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Lexicographic solution quality; lower is better.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Score {
    pub unassigned: usize,
    pub soft_penalty: i64,
    pub makespan_ms: i64,
    pub total_end_ms: i64,
}

/// Decoder input: priority order and per-variable resource pins.
///
/// Variables missing from `order` rank after every listed one. A pin that
/// is not a feasible candidate is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub order: Vec<VarId>,
    pub pinned: Vec<Option<ResourceIdx>>,
}

impl Sequence {
    /// Unpinned sequence.
    pub fn from_order(order: Vec<VarId>) -> Self {
        let pinned = vec![None; order.len()];
        Self { order, pinned }
    }
}

/// Decoder output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSolution {
    /// Indexed by [`VarId`]. `None` = unplaced.
    pub placements: Vec<Option<Placement>>,
    /// Variables in the order they were decided.
    pub order: Vec<VarId>,
    pub score: Score,
}

impl RawSolution {
    pub fn is_complete(&self) -> bool {
        self.score.unassigned == 0
    }

    /// The sequence that reproduces this solution when decoded.
    pub fn to_sequence(&self) -> Sequence {
        let mut order = self.order.clone();
        let mut seen = vec![false; self.placements.len()];
        for &v in &order {
            seen[v] = true;
        }
        order.extend((0..self.placements.len()).filter(|&v| !seen[v]));
        Sequence {
            order,
            pinned: self.placements.iter().map(|p| p.map(|p| p.resource)).collect(),
        }
    }
}

/// A decode result; `stopped` is set when the clock ran out mid-decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub solution: RawSolution,
    pub stopped: Option<StopReason>,
}

/// Decodes `sequence`, ticking `clock` once per decided variable.
pub fn decode(graph: &ConstraintGraph, sequence: &Sequence, clock: Option<&BudgetClock>) -> Decoded {
    let n = graph.var_count();
    let mut rank = vec![usize::MAX; n];
    for (position, &v) in sequence.order.iter().enumerate() {
        if v < n && rank[v] == usize::MAX {
            rank[v] = position;
        }
    }

    let mut pending: Vec<usize> = graph.vars.iter().map(|v| v.predecessors.len()).collect();
    let mut ready: BinaryHeap<Reverse<(usize, VarId)>> = pending
        .iter()
        .enumerate()
        .filter(|(_, &p)| p == 0)
        .map(|(v, _)| Reverse((rank[v], v)))
        .collect();

    let mut state = PlacementState::new(graph);
    let mut decided = Vec::with_capacity(n);
    let mut stopped = None;

    while let Some(Reverse((_, var))) = ready.pop() {
        let pin = sequence.pinned.get(var).copied().flatten();
        state.decide(var, pin);
        decided.push(var);
        for &succ in &graph.vars[var].successors {
            pending[succ] -= 1;
            if pending[succ] == 0 {
                ready.push(Reverse((rank[succ], succ)));
            }
        }
        if let Some(clock) = clock {
            if let Err(reason) = clock.tick() {
                // an empty queue here means every variable was decided
                if !ready.is_empty() {
                    stopped = Some(reason);
                }
                break;
            }
        }
    }

    Decoded {
        solution: state.finish(decided),
        stopped,
    }
}

/// Incremental occupancy while decoding.
struct PlacementState<'g> {
    graph: &'g ConstraintGraph,
    placements: Vec<Option<Placement>>,
    /// Per resource, busy intervals padded by the rest gap.
    usage: Vec<Vec<TimeWindow>>,
    /// Per disjunctive group.
    group_busy: Vec<Vec<TimeWindow>>,
    soft_penalty: i64,
}

impl<'g> PlacementState<'g> {
    fn new(graph: &'g ConstraintGraph) -> Self {
        Self {
            graph,
            placements: vec![None; graph.var_count()],
            usage: vec![Vec::new(); graph.resources.len()],
            group_busy: vec![Vec::new(); graph.groups.len()],
            soft_penalty: 0,
        }
    }

    /// Places `var` or leaves it unplaced.
    fn decide(&mut self, var: VarId, pin: Option<ResourceIdx>) {
        let graph = self.graph;
        let v = &graph.vars[var];
        if v.has_empty_domain() {
            return;
        }

        let mut lb = v.start_min;
        for &(pred, delay) in &v.predecessors {
            match self.placements[pred] {
                Some(p) => lb = lb.max(p.end_ms.saturating_add(delay)),
                None => return,
            }
        }

        let pinned = pin
            .filter(|r| v.candidates.contains(r))
            .and_then(|r| self.earliest_start(var, r, lb).map(|t| (r, t)));

        let choice = pinned.or_else(|| {
            v.candidates
                .iter()
                .filter_map(|&r| self.earliest_start(var, r, lb).map(|t| (r, t)))
                .min_by_key(|&(r, t)| {
                    let end = t.saturating_add(v.duration_ms);
                    (end, graph.soft_penalty(var, r, t, end), r)
                })
        });

        if let Some((resource, start_ms)) = choice {
            self.place(var, resource, start_ms);
        }
    }

    /// Earliest start of `var` on `resource` at or after `lb`.
    fn earliest_start(&self, var: VarId, resource: ResourceIdx, lb: i64) -> Option<i64> {
        let v = &self.graph.vars[var];
        let slot = &self.graph.resources[resource];
        let mut t = lb;
        loop {
            if t > v.start_max {
                return None;
            }
            let fit = earliest_fit_in(&slot.free, t, v.duration_ms)?;
            if fit != t {
                t = fit;
                continue;
            }
            if let Some(capacity) = slot.capacity {
                let occupied = TimeWindow::new(
                    t,
                    t.saturating_add(v.duration_ms).saturating_add(slot.rest_ms),
                );
                if let Some(next) = capacity_conflict(&self.usage[resource], occupied, capacity) {
                    t = next;
                    continue;
                }
            }
            let span = TimeWindow::new(t, t.saturating_add(v.duration_ms));
            if let Some(next) = self.exclusion_conflict(var, span) {
                t = next;
                continue;
            }
            return Some(t);
        }
    }

    /// Smallest start that clears every overlapping group member.
    fn exclusion_conflict(&self, var: VarId, span: TimeWindow) -> Option<i64> {
        self.graph.vars[var]
            .groups
            .iter()
            .flat_map(|&g| self.group_busy[g].iter())
            .filter(|w| w.overlaps(&span))
            .map(|w| w.end_ms)
            .max()
    }

    fn place(&mut self, var: VarId, resource: ResourceIdx, start_ms: i64) {
        let graph = self.graph;
        let v = &graph.vars[var];
        let slot = &graph.resources[resource];
        let end_ms = start_ms.saturating_add(v.duration_ms);
        if slot.capacity.is_some() {
            self.usage[resource].push(TimeWindow::new(start_ms, end_ms.saturating_add(slot.rest_ms)));
        }
        for &g in &v.groups {
            self.group_busy[g].push(TimeWindow::new(start_ms, end_ms));
        }
        self.soft_penalty += graph.soft_penalty(var, resource, start_ms, end_ms);
        self.placements[var] = Some(Placement {
            resource,
            start_ms,
            end_ms,
        });
    }

    fn finish(self, order: Vec<VarId>) -> RawSolution {
        let mut busy = vec![0i64; self.graph.resources.len()];
        for p in self.placements.iter().flatten() {
            busy[p.resource] += p.end_ms - p.start_ms;
        }
        let placed = self.placements.iter().flatten();
        let score = Score {
            unassigned: self.placements.iter().filter(|p| p.is_none()).count(),
            soft_penalty: self.soft_penalty + self.graph.balance_penalty(&busy),
            makespan_ms: placed.clone().map(|p| p.end_ms).max().unwrap_or(0),
            total_end_ms: placed.map(|p| p.end_ms).sum(),
        };
        RawSolution {
            placements: self.placements,
            order,
            score,
        }
    }
}

/// If adding `occupied` to `usage` would exceed `capacity` somewhere, the
/// earliest time at which one of the blocking intervals releases a unit.
///
/// No start before that time can succeed: every interval overlapping
/// `occupied` still overlaps any shifted copy that starts earlier.
fn capacity_conflict(usage: &[TimeWindow], occupied: TimeWindow, capacity: u32) -> Option<i64> {
    let overlapping: Vec<&TimeWindow> = usage.iter().filter(|w| w.overlaps(&occupied)).collect();
    if overlapping.len() < capacity as usize {
        return None;
    }

    // (time, delta); releases sort before acquisitions at the same instant
    let mut events: Vec<(i64, i32)> = Vec::with_capacity(overlapping.len() * 2);
    for w in &overlapping {
        events.push((w.start_ms.max(occupied.start_ms), 1));
        events.push((w.end_ms.min(occupied.end_ms), -1));
    }
    events.sort_unstable();

    let mut load = 0i64;
    let mut peak = 0i64;
    for (_, delta) in events {
        load += i64::from(delta);
        peak = peak.max(load);
    }

    (peak >= i64::from(capacity)).then(|| {
        overlapping
            .iter()
            .map(|w| w.end_ms)
            .min()
            .unwrap_or(occupied.end_ms)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::compile;
    use crate::models::{Calendar, Constraint, Problem, Resource, SoftConstraint, Task};

    fn run(problem: &Problem) -> RawSolution {
        let graph = compile(problem).unwrap();
        let order = (0..graph.var_count()).collect();
        decode(&graph, &Sequence::from_order(order), None).solution
    }

    fn place_of(problem: &Problem, sol: &RawSolution, task: &str) -> Option<Placement> {
        let graph = compile(problem).unwrap();
        sol.placements[graph.var_index(task).unwrap()]
    }

    #[test]
    fn test_unit_capacity_serializes() {
        let p = Problem::new(
            vec![Task::new("A", 100), Task::new("B", 50)],
            vec![Resource::new("R")],
        );
        let sol = run(&p);
        assert!(sol.is_complete());
        assert_eq!(place_of(&p, &sol, "A").unwrap().start_ms, 0);
        assert_eq!(place_of(&p, &sol, "B").unwrap().start_ms, 100);
        assert_eq!(sol.score.makespan_ms, 150);
        assert_eq!(sol.score.total_end_ms, 250);
    }

    #[test]
    fn test_capacity_two_runs_in_parallel() {
        let p = Problem::new(
            vec![Task::new("A", 100), Task::new("B", 100), Task::new("C", 100)],
            vec![Resource::new("R").with_capacity(2)],
        );
        let sol = run(&p);
        assert_eq!(sol.score.makespan_ms, 200);
    }

    #[test]
    fn test_rest_gap() {
        let p = Problem::new(
            vec![Task::new("A", 100), Task::new("B", 100)],
            vec![Resource::new("R").with_min_rest(30)],
        );
        let sol = run(&p);
        assert_eq!(place_of(&p, &sol, "B").unwrap().start_ms, 130);
    }

    #[test]
    fn test_precedence_with_delay() {
        let p = Problem::new(
            vec![Task::new("A", 100), Task::new("B", 10)],
            vec![Resource::new("R1"), Resource::new("R2")],
        )
        .with_constraint(Constraint::precedence_with_delay("A", "B", 25));
        let sol = run(&p);
        assert_eq!(place_of(&p, &sol, "B").unwrap().start_ms, 125);
    }

    #[test]
    fn test_calendar_gaps_are_skipped() {
        let cal = Calendar::new("c").with_window(0, 1000).with_blocked(50, 200);
        let p = Problem::new(vec![Task::new("A", 100)], vec![Resource::new("R").with_calendar(cal)]);
        let sol = run(&p);
        assert_eq!(place_of(&p, &sol, "A").unwrap().start_ms, 200);
    }

    #[test]
    fn test_exclusion_across_resources() {
        let p = Problem::new(
            vec![Task::new("A", 100), Task::new("B", 100)],
            vec![Resource::new("R1"), Resource::new("R2")],
        )
        .with_constraint(Constraint::exclusion(["A", "B"]));
        let sol = run(&p);
        let a = place_of(&p, &sol, "A").unwrap();
        let b = place_of(&p, &sol, "B").unwrap();
        assert!(a.end_ms <= b.start_ms || b.end_ms <= a.start_ms);
    }

    #[test]
    fn test_window_too_tight_leaves_unplaced() {
        let p = Problem::new(
            vec![Task::new("A", 100).with_deadline(100), Task::new("B", 100).with_deadline(150)],
            vec![Resource::new("R")],
        );
        let sol = run(&p);
        assert_eq!(sol.score.unassigned, 1);
        assert!(place_of(&p, &sol, "B").is_none());
    }

    #[test]
    fn test_unplaced_predecessor_blocks_successor() {
        let p = Problem::new(
            vec![Task::new("A", 100).with_deadline(50), Task::new("B", 10).after("A")],
            vec![Resource::new("R")],
        );
        let sol = run(&p);
        assert_eq!(sol.score.unassigned, 2);
    }

    #[test]
    fn test_earliest_end_then_penalty_chooses_resource() {
        let p = Problem::new(vec![Task::new("A", 100)], vec![Resource::new("R1"), Resource::new("R2")])
            .with_soft_constraint(SoftConstraint::prefer("A", "R2", 5));
        let sol = run(&p);
        assert_eq!(place_of(&p, &sol, "A").unwrap().resource, 1);
        assert_eq!(sol.score.soft_penalty, 0);
    }

    #[test]
    fn test_balance_penalty_counts_busy_spread() {
        let p = Problem::new(
            vec![Task::new("A", 10), Task::new("B", 10).after("A")],
            vec![Resource::new("R1"), Resource::new("R2")],
        )
        .with_soft_constraint(SoftConstraint::balance(3));
        let graph = compile(&p).unwrap();

        // both on R1: spread 20
        let sol = run(&p);
        assert_eq!(sol.score.soft_penalty, 60);

        let split = Sequence {
            order: vec![0, 1],
            pinned: vec![Some(0), Some(1)],
        };
        let sol = decode(&graph, &split, None).solution;
        assert_eq!(sol.score.soft_penalty, 0);
        assert_eq!(sol.score.makespan_ms, 20);
    }

    #[test]
    fn test_pin_is_honoured_when_feasible() {
        let p = Problem::new(vec![Task::new("A", 100)], vec![Resource::new("R1"), Resource::new("R2")]);
        let graph = compile(&p).unwrap();
        let seq = Sequence {
            order: vec![0],
            pinned: vec![Some(1)],
        };
        let sol = decode(&graph, &seq, None).solution;
        assert_eq!(sol.placements[0].unwrap().resource, 1);
    }

    #[test]
    fn test_to_sequence_reproduces_solution() {
        let p = Problem::new(
            vec![Task::new("A", 30), Task::new("B", 20).after("A"), Task::new("C", 10)],
            vec![Resource::new("R1"), Resource::new("R2")],
        );
        let graph = compile(&p).unwrap();
        let first = decode(&graph, &Sequence::from_order(vec![2, 0, 1]), None).solution;
        let again = decode(&graph, &first.to_sequence(), None).solution;
        assert_eq!(first, again);
    }

    #[test]
    fn test_clock_stops_decode() {
        use crate::solver::{Budget, CancellationToken};
        let p = Problem::new(
            vec![Task::new("A", 10), Task::new("B", 10), Task::new("C", 10)],
            vec![Resource::new("R")],
        );
        let graph = compile(&p).unwrap();
        let clock = BudgetClock::start(&Budget::steps(1), CancellationToken::new(), 1);
        let out = decode(&graph, &Sequence::from_order(vec![0, 1, 2]), Some(&clock));
        assert_eq!(out.stopped, Some(StopReason::Exhausted));
        assert_eq!(out.solution.score.unassigned, 2);
        assert_eq!(out.solution.order, vec![0]);
    }

    #[test]
    fn test_capacity_conflict_jump() {
        let usage = vec![TimeWindow::new(0, 100), TimeWindow::new(50, 80)];
        assert_eq!(capacity_conflict(&usage, TimeWindow::new(60, 70), 2), Some(80));
        assert_eq!(capacity_conflict(&usage, TimeWindow::new(80, 90), 2), None);
        assert_eq!(capacity_conflict(&usage, TimeWindow::new(10, 20), 2), None);
    }
}
