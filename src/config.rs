//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! mode = "search"          # or "fallback"
//! workers = 2
//! seed = 24301
//! search_iterations = 400
//! stall_iterations = 80
//! min_search_budget_ms = 5
//! poll_every_steps = 16
//! conflict_step_budget = 200000
//! fallback_rules = ["edd", "lpt"]   # task id always breaks the last tie
//! log_level = "debug"      # optional
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::dispatching::RuleEngine;
use crate::error::ConfigError;
use crate::logging::parse_level_str;

/// Which solver path a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverMode {
    /// Fallback heuristic first, then the search backend within budget.
    #[default]
    Search,
    /// Deterministic fallback heuristic only.
    Fallback,
}

/// Tunables for compilation, solving and conflict analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: SolverMode,

    /// Search worker threads.
    pub workers: usize,

    /// Base seed; worker `i` uses a seed derived from `seed` and `i`.
    pub seed: u64,

    /// Perturbation iterations per worker.
    pub search_iterations: u32,

    /// A worker stops after this many iterations without improvement.
    pub stall_iterations: u32,

    /// Time budgets below this skip the search backend.
    pub min_search_budget_ms: u64,

    /// Steps between wall-clock polls.
    pub poll_every_steps: u64,

    /// Total placement steps conflict analysis may spend.
    pub conflict_step_budget: u64,

    /// Dispatching rules ordering the fallback heuristic, most significant
    /// first. Names from [`rules::NAMES`](crate::dispatching::rules::NAMES).
    pub fallback_rules: Vec<String>,

    /// Level for [`init_logging`](crate::logging::init_logging).
    pub log_level: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: SolverMode::Search,
            workers: 2,
            seed: 0x5EED,
            search_iterations: 400,
            stall_iterations: 80,
            min_search_budget_ms: 5,
            poll_every_steps: 16,
            conflict_step_budget: 200_000,
            fallback_rules: vec!["edd".into(), "lpt".into()],
            log_level: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: SolverMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_search_iterations(mut self, iterations: u32) -> Self {
        self.search_iterations = iterations;
        self
    }

    pub fn with_stall_iterations(mut self, iterations: u32) -> Self {
        self.stall_iterations = iterations;
        self
    }

    pub fn with_min_search_budget_ms(mut self, ms: u64) -> Self {
        self.min_search_budget_ms = ms;
        self
    }

    pub fn with_poll_every_steps(mut self, steps: u64) -> Self {
        self.poll_every_steps = steps;
        self
    }

    pub fn with_conflict_step_budget(mut self, steps: u64) -> Self {
        self.conflict_step_budget = steps;
        self
    }

    pub fn with_fallback_rules<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_rules = rules.into_iter().map(Into::into).collect();
        self
    }

    /// Rule engine for the fallback heuristic.
    pub fn fallback_engine(&self) -> Result<RuleEngine, ConfigError> {
        RuleEngine::from_names(self.fallback_rules.as_slice())
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// Parsed `log_level`, if set and valid.
    pub fn log_level(&self) -> Option<Level> {
        self.log_level.as_deref().and_then(parse_level_str)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.poll_every_steps == 0 {
            return Err(ConfigError::Invalid("poll_every_steps must be at least 1".into()));
        }
        if self.conflict_step_budget == 0 {
            return Err(ConfigError::Invalid("conflict_step_budget must be at least 1".into()));
        }
        self.fallback_engine()?;
        if let Some(level) = &self.log_level {
            if parse_level_str(level).is_none() {
                return Err(ConfigError::Invalid(format!("unknown log level '{level}'")));
            }
        }
        Ok(())
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }
}
