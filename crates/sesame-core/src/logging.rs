//! Logging initialisation.
//!
//! `RUST_LOG` takes precedence over the configured level. Dependency modules
//! that log every request or actor start are capped so session progress
//! stays readable.

use crate::error::CoreError;
use log::LevelFilter;

/// Modules whose output is capped regardless of the configured level.
pub const QUIET_MODULES: &[(&str, LevelFilter)] = &[
    ("hyper", LevelFilter::Info),
    ("reqwest", LevelFilter::Info),
    ("rustls", LevelFilter::Info),
    ("actix", LevelFilter::Warn),
    ("actix_rt", LevelFilter::Warn),
];

/// Parses `global.log_level`, falling back to `info` for unknown names.
pub fn parse_level(log_level: &str) -> LevelFilter {
    log_level.trim().parse().unwrap_or(LevelFilter::Info)
}

#[cfg(feature = "env_logger")]
pub fn setup_logging(log_level: &str) -> Result<(), CoreError> {
    use env_logger::{Builder, Env};

    let level = parse_level(log_level);
    let mut builder = Builder::from_env(Env::default().default_filter_or(level.to_string()));
    for (module, cap) in QUIET_MODULES {
        builder.filter_module(module, (*cap).min(level));
    }
    builder
        .format_timestamp_millis()
        .try_init()
        .map_err(|e| CoreError::LoggingSetup(e.to_string()))
}

#[cfg(not(feature = "env_logger"))]
pub fn setup_logging(log_level: &str) -> Result<(), CoreError> {
    log::debug!(
        "Logging left to the host application (requested level: {})",
        parse_level(log_level)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_levels_fall_back_to_info() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level(" WARN "), LevelFilter::Warn);
        assert_eq!(parse_level("chatty"), LevelFilter::Info);
    }
}
