//! Budgeted search backends.
//!
//! [`PerturbationSearch`] is an iterated greedy over decoder sequences:
//! each worker perturbs its current sequence (swap, insert or invert of the
//! priority order, or re-pinning one variable's resource), decodes it, and
//! keeps the result when the [`Score`](super::placement::Score) does not
//! get worse. Workers run on scoped threads and share one budget clock.
//!
//! # Reference
//! Ruiz & Stützle (2007), "A simple and effective iterated greedy algorithm
//! for the permutation flowshop scheduling problem"

use std::fmt::Debug;
use std::thread;

use rand::prelude::IndexedRandom;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::debug;

use crate::cp::ConstraintGraph;

use super::budget::BudgetClock;
use super::placement::{decode, RawSolution, Sequence};

/// Search backend failures. The adapter turns them into a timed-out
/// fallback result.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("search worker {0} panicked")]
    WorkerPanicked(usize),

    #[error("search backend failed: {0}")]
    Failed(String),
}

/// Per-solve search tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    pub workers: usize,
    pub seed: u64,
    pub iterations: u32,
    pub stall_iterations: u32,
}

/// Everything a backend may read during one solve.
#[derive(Debug)]
pub struct SearchRequest<'a> {
    pub graph: &'a ConstraintGraph,
    /// Fallback result; the backend must not return anything worse.
    pub incumbent: &'a RawSolution,
    /// Sequence derived from the previous schedule, if any.
    pub hint: Option<&'a Sequence>,
    pub clock: &'a BudgetClock,
    pub settings: SearchSettings,
}

/// A pluggable optimizer behind the solver adapter.
pub trait SearchBackend: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Returns the best solution found within the request's clock.
    fn search(&self, request: &SearchRequest<'_>) -> Result<RawSolution, BackendError>;
}

/// Multi-start iterated greedy over decoder sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerturbationSearch;

impl SearchBackend for PerturbationSearch {
    fn name(&self) -> &'static str {
        "perturbation"
    }

    fn search(&self, request: &SearchRequest<'_>) -> Result<RawSolution, BackendError> {
        // Unpinned: the decoder's own resource choice reproduces the incumbent.
        let mut starts = vec![Sequence::from_order(request.incumbent.to_sequence().order)];
        if let Some(hint) = request.hint {
            starts.push(hint.clone());
        }
        let workers = request.settings.workers.max(1);

        let results: Vec<Result<RawSolution, usize>> = thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|w| {
                    let start = &starts[w % starts.len()];
                    s.spawn(move || run_worker(w, request, start))
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(w, h)| h.join().map_err(|_| w))
                .collect()
        });

        let mut best = request.incumbent.clone();
        for result in results {
            let found = result.map_err(BackendError::WorkerPanicked)?;
            if found.score < best.score {
                best = found;
            }
        }
        Ok(best)
    }
}

fn run_worker(worker: usize, request: &SearchRequest<'_>, start: &Sequence) -> RawSolution {
    let settings = request.settings;
    let mut rng = StdRng::seed_from_u64(settings.seed.wrapping_add(worker as u64));

    let mut best = request.incumbent.clone();
    let mut current = start.clone();
    let decoded = decode(request.graph, &current, Some(request.clock));
    if decoded.stopped.is_some() {
        return best;
    }
    if decoded.solution.score < best.score {
        best = decoded.solution;
    }

    let mut stall = 0;
    let mut iterations = 0;
    while iterations < settings.iterations && stall < settings.stall_iterations {
        if request.clock.check().is_err() {
            break;
        }
        iterations += 1;

        let mut candidate = current.clone();
        perturb(&mut candidate, request.graph, &mut rng);
        let decoded = decode(request.graph, &candidate, Some(request.clock));
        if decoded.stopped.is_some() {
            break;
        }

        let found = decoded.solution;
        if found.score < best.score {
            best = found;
            current = candidate;
            stall = 0;
        } else {
            if found.score == best.score {
                // sideways move
                current = candidate;
            }
            stall += 1;
        }
    }

    debug!(
        worker,
        iterations,
        makespan_ms = best.score.makespan_ms,
        unassigned = best.score.unassigned,
        "search worker finished"
    );
    best
}

fn perturb<R: Rng>(sequence: &mut Sequence, graph: &ConstraintGraph, rng: &mut R) {
    match rng.random_range(0..4) {
        0 => swap_move(&mut sequence.order, rng),
        1 => insert_move(&mut sequence.order, rng),
        2 => invert_move(&mut sequence.order, rng),
        _ => repin_move(sequence, graph, rng),
    }
}

/// Exchanges two random positions.
pub fn swap_move<R: Rng>(order: &mut [usize], rng: &mut R) {
    let len = order.len();
    if len < 2 {
        return;
    }
    let i = rng.random_range(0..len);
    let j = rng.random_range(0..len);
    order.swap(i, j);
}

/// Removes an element and reinserts it at a random position.
pub fn insert_move<R: Rng>(order: &mut Vec<usize>, rng: &mut R) {
    let len = order.len();
    if len < 2 {
        return;
    }
    let from = rng.random_range(0..len);
    let to = rng.random_range(0..len);
    let item = order.remove(from);
    order.insert(to, item);
}

/// Reverses a random segment.
pub fn invert_move<R: Rng>(order: &mut [usize], rng: &mut R) {
    let len = order.len();
    if len < 2 {
        return;
    }
    let mut i = rng.random_range(0..len);
    let mut j = rng.random_range(0..len);
    if i > j {
        std::mem::swap(&mut i, &mut j);
    }
    order[i..=j].reverse();
}

/// Pins one random variable to a random candidate, or unpins it.
pub fn repin_move<R: Rng>(sequence: &mut Sequence, graph: &ConstraintGraph, rng: &mut R) {
    if graph.vars.is_empty() {
        return;
    }
    sequence.pinned.resize(graph.var_count(), None);
    let var = rng.random_range(0..graph.var_count());
    sequence.pinned[var] = if rng.random_bool(0.25) {
        None
    } else {
        graph.vars[var].candidates.choose(rng).copied()
    };
}
