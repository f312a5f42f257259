//! Tracing subscriber setup shared by the service and the CLI

use crate::config::LoggingConfig;
use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Crate targets enabled when `RUST_LOG` is unset; dependencies stay quiet
const TARGETS: [&str; 2] = ["loan_acceptance_pipeline", "loan_cli"];

fn default_directives(level: &str) -> String {
    TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level; `format = "json"` selects
/// structured output, anything else the human-readable formatter. Logs go to
/// stderr so command output on stdout stays clean.
pub fn init(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(&logging.level))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if logging.format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_cover_binaries() {
        let directives = default_directives("debug");
        assert_eq!(directives, "loan_acceptance_pipeline=debug,loan_cli=debug");
        assert!(EnvFilter::try_new(&directives).is_ok());
    }
}
