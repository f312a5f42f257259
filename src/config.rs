//! Configuration management for the loan acceptance pipeline

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Serialized form of the fitted scaler + classifier
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// Versioned JSON document with scaler statistics and forest trees
    #[default]
    Native,
    /// ONNX export of the fitted pipeline (requires the `onnx` feature)
    Onnx,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub model: ModelConfig,
    pub results: ResultsConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming single applications
    pub application_subject: String,
    /// Subject for outgoing decisions
    pub decision_subject: String,
    /// Subject for bulk CSV uploads (request/reply)
    pub bulk_subject: String,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Path to the fitted scaler + classifier artifact
    pub artifact_path: PathBuf,
    /// Artifact encoding
    #[serde(default)]
    pub format: ArtifactFormat,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Bulk result storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ResultsConfig {
    /// Directory holding `predictions_<id>.csv` files
    pub dir: PathBuf,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum messages processed concurrently
    pub workers: usize,
    /// Seconds between metrics summaries
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path, with `LOAN__` environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("LOAN").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                application_subject: "loan.applications".to_string(),
                decision_subject: "loan.decisions".to_string(),
                bulk_subject: "loan.bulk".to_string(),
            },
            model: ModelConfig {
                artifact_path: PathBuf::from("models/rf_pipeline.json"),
                format: ArtifactFormat::Native,
                onnx_threads: 1,
            },
            results: ResultsConfig {
                dir: PathBuf::from("results"),
            },
            pipeline: PipelineConfig {
                workers: 4,
                metrics_interval_secs: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.nats.application_subject, "loan.applications");
        assert_eq!(config.model.format, ArtifactFormat::Native);
        assert_eq!(config.model.onnx_threads, 1);
        assert_eq!(config.pipeline.workers, 4);
    }

    #[test]
    fn test_load_from_path_applies_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[nats]
url = "nats://nats:4222"
application_subject = "a"
decision_subject = "d"
bulk_subject = "b"

[model]
artifact_path = "models/custom.onnx"
format = "onnx"

[results]
dir = "/tmp/results"

[pipeline]
workers = 2

[logging]
level = "debug"
format = "pretty"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.model.format, ArtifactFormat::Onnx);
        assert_eq!(config.model.onnx_threads, 1);
        assert_eq!(config.pipeline.metrics_interval_secs, 30);
        assert_eq!(config.results.dir, PathBuf::from("/tmp/results"));
        assert_eq!(config.logging.format, "pretty");
    }
}
