//! Error taxonomy.
//!
//! Structural problems are rejected before any solving happens
//! ([`MalformedProblemError`]). [`UnsupportedConstraintError`] signals a
//! mismatch between the model and the compiler and is fatal.
//!
//! Budget exhaustion, cancellation and proven infeasibility are *outcomes*
//! carried by [`Schedule`](crate::models::Schedule), never errors.

use std::fmt;

use thiserror::Error;

use crate::models::Constraint;
use crate::orchestrator::SessionId;

/// A single structural defect in a problem, naming the offending entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProblemIssue {
    #[error("duplicate task id '{0}'")]
    DuplicateTask(String),

    #[error("duplicate resource id '{0}'")]
    DuplicateResource(String),

    #[error("task '{task_id}' has non-positive duration {duration_ms}ms")]
    InvalidDuration { task_id: String, duration_ms: i64 },

    #[error("resource '{0}' has zero capacity")]
    ZeroCapacity(String),

    #[error("task '{task_id}' has an empty window [{earliest_ms}, {latest_ms}]")]
    EmptyWindow {
        task_id: String,
        earliest_ms: i64,
        latest_ms: i64,
    },

    #[error("{referenced_by} references unknown task '{task_id}'")]
    UnknownTask {
        referenced_by: String,
        task_id: String,
    },

    #[error("{referenced_by} references unknown resource '{resource_id}'")]
    UnknownResource {
        referenced_by: String,
        resource_id: String,
    },

    #[error("task '{task_id}' requires capability '{capability}' that no resource offers")]
    UnknownCapability { task_id: String, capability: String },

    #[error("no single resource offers every capability task '{task_id}' requires")]
    NoEligibleResource { task_id: String },

    #[error("exclusion over {task_ids:?} needs at least two tasks")]
    UndersizedExclusion { task_ids: Vec<String> },

    #[error("cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency {
        /// Task ids along the cycle; the first id is repeated at the end.
        cycle: Vec<String>,
    },
}

/// The problem failed validation. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed problem: {}", IssueList(.issues))]
pub struct MalformedProblemError {
    /// Every issue found, in detection order.
    pub issues: Vec<ProblemIssue>,
}

impl MalformedProblemError {
    /// Wraps a non-empty issue list.
    pub fn new(issues: Vec<ProblemIssue>) -> Self {
        Self { issues }
    }

    /// The first reported dependency cycle, if any.
    pub fn cycle(&self) -> Option<&[String]> {
        self.issues.iter().find_map(|issue| match issue {
            ProblemIssue::CyclicDependency { cycle } => Some(cycle.as_slice()),
            _ => None,
        })
    }
}

struct IssueList<'a>(&'a [ProblemIssue]);

impl fmt::Display for IssueList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

/// The compiler met a constraint it cannot express.
///
/// Validation should make this unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported constraint: {reason}")]
pub struct UnsupportedConstraintError {
    pub reason: String,
    /// The offending constraint, when one can be named.
    pub constraint: Option<Constraint>,
}

impl UnsupportedConstraintError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            constraint: None,
        }
    }

    pub fn for_constraint(reason: impl Into<String>, constraint: &Constraint) -> Self {
        Self {
            reason: reason.into(),
            constraint: Some(constraint.clone()),
        }
    }
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors surfaced by the [`Orchestrator`](crate::orchestrator::Orchestrator).
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("{session} rejected: {source}")]
    Malformed {
        session: SessionId,
        source: MalformedProblemError,
    },

    #[error("{session} rejected: {source}")]
    Unsupported {
        session: SessionId,
        source: UnsupportedConstraintError,
    },

    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    #[error("invalid budget: {0}")]
    InvalidBudget(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SchedulerError {
    /// The session that was moved to `Rejected`, if this is a rejection.
    pub fn rejected_session(&self) -> Option<SessionId> {
        match self {
            Self::Malformed { session, .. } | Self::Unsupported { session, .. } => Some(*session),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
