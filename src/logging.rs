//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. the `level` argument (if provided)
//! 2. `U_PLANNER_LOG` environment variable (e.g. "info", "u_planner=debug")
//! 3. default to `info`
//!
//! The library itself only emits events; embedding applications that
//! already install a subscriber should not call this.

use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::ConfigError;

/// Environment variable consulted when no explicit level is given.
pub const LOG_ENV: &str = "U_PLANNER_LOG";

/// Installs the global fmt subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(level: Option<Level>) -> Result<(), ConfigError> {
    fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init()
        .map_err(|e| ConfigError::Invalid(format!("cannot install log subscriber: {e}")))
}

/// Filter for `level`, else `U_PLANNER_LOG`, else `info`.
pub fn env_filter(level: Option<Level>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::new(level.as_str().to_lowercase()),
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

/// Parses a level name as accepted in config files and `U_PLANNER_LOG`.
pub fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_str() {
        assert_eq!(parse_level_str(" Debug "), Some(Level::DEBUG));
        assert_eq!(parse_level_str("warning"), Some(Level::WARN));
        assert_eq!(parse_level_str("loud"), None);
    }

    #[test]
    fn test_explicit_level_filter() {
        let filter = env_filter(Some(Level::WARN));
        assert_eq!(filter.to_string(), "warn");

        // scoped to this thread; the global dispatcher stays untouched
        let subscriber = fmt().with_env_filter(filter).finish();
        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(Level::WARN));
            assert!(!tracing::enabled!(Level::INFO));
        });
    }
}
