//! Deterministic fallback heuristic.
//!
//! Serial list scheduling in dispatching-rule order, by default earliest
//! deadline, then longest duration, then task id. Always available, never
//! fails, and bit-for-bit reproducible for the same graph and budget.

use crate::cp::{ConstraintGraph, VarId};
use crate::dispatching::{fallback_engine, RuleEngine};

use super::budget::BudgetClock;
use super::placement::{decode, Decoded, Sequence};

/// List scheduler driven by a [`RuleEngine`].
#[derive(Debug, Clone)]
pub struct FallbackHeuristic {
    engine: RuleEngine,
}

impl FallbackHeuristic {
    pub fn new() -> Self {
        Self {
            engine: fallback_engine(),
        }
    }

    /// Uses a custom rule chain. Keep a `ById` final tie-breaker for
    /// reproducible output.
    pub fn with_engine(engine: RuleEngine) -> Self {
        Self { engine }
    }

    /// Priority order of every variable.
    pub fn order(&self, graph: &ConstraintGraph) -> Vec<VarId> {
        self.engine.sort_indices(&graph.vars)
    }

    pub fn run(&self, graph: &ConstraintGraph, clock: Option<&BudgetClock>) -> Decoded {
        decode(graph, &Sequence::from_order(self.order(graph)), clock)
    }
}

impl Default for FallbackHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::compile;
    use crate::models::{Problem, Resource, Task};

    fn sample() -> Problem {
        Problem::new(
            vec![
                Task::new("short", 100),
                Task::new("long", 300),
                Task::new("urgent", 200).with_deadline(1000),
            ],
            vec![Resource::new("R")],
        )
    }

    #[test]
    fn test_edd_then_lpt_order() {
        let g = compile(&sample()).unwrap();
        let ids: Vec<_> = FallbackHeuristic::new()
            .order(&g)
            .into_iter()
            .map(|v| g.vars[v].task_id.as_str())
            .collect();
        assert_eq!(ids, ["urgent", "long", "short"]);
    }

    #[test]
    fn test_run_places_in_order() {
        let g = compile(&sample()).unwrap();
        let out = FallbackHeuristic::new().run(&g, None);
        assert!(out.stopped.is_none());
        let sol = out.solution;
        assert!(sol.is_complete());
        let urgent = sol.placements[g.var_index("urgent").unwrap()].unwrap();
        let short = sol.placements[g.var_index("short").unwrap()].unwrap();
        assert_eq!(urgent.start_ms, 0);
        assert_eq!(short.start_ms, 500);
        assert_eq!(sol.score.makespan_ms, 600);
    }

    #[test]
    fn test_deterministic() {
        let g = compile(&sample()).unwrap();
        let h = FallbackHeuristic::default();
        assert_eq!(h.run(&g, None), h.run(&g, None));
    }

    #[test]
    fn test_custom_engine() {
        use crate::dispatching::{rules, TieBreaker};
        let g = compile(&sample()).unwrap();
        let spt = RuleEngine::new()
            .with_rule(rules::Spt)
            .with_final_tie_breaker(TieBreaker::ById);
        let first = FallbackHeuristic::with_engine(spt).order(&g)[0];
        assert_eq!(g.vars[first].task_id, "short");
    }
}
