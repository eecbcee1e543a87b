//! Configuration management for the deposit predictor

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub artifact: ArtifactConfig,
    pub nats: NatsConfig,
    pub logging: LoggingConfig,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactConfig {
    /// Path of the model artifact (bundle JSON, bare model JSON or ONNX)
    pub path: PathBuf,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming prediction requests
    pub request_subject: String,
    /// Subject for predictions when a request carries no reply subject
    pub result_subject: String,
    /// Queue group shared by service instances
    #[serde(default)]
    pub queue_group: Option<String>,
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
    /// Load configuration from a specific path, then `DEPOSIT_` environment overrides
    /// (for example `DEPOSIT_ARTIFACT__PATH`).
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::build(path.as_ref(), true)
    }

    /// Like [`AppConfig::load_from_path`], but a missing file leaves the
    /// built-in defaults in place. Environment overrides apply either way.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::build(path.as_ref(), false)
    }

    fn build(path: &Path, required: bool) -> Result<Self> {
        let defaults = Self::default();

        let config = Config::builder()
            .set_default("artifact.path", defaults.artifact.path.to_string_lossy().as_ref())?
            .set_default("artifact.onnx_threads", defaults.artifact.onnx_threads as i64)?
            .set_default("nats.url", defaults.nats.url)?
            .set_default("nats.request_subject", defaults.nats.request_subject)?
            .set_default("nats.result_subject", defaults.nats.result_subject)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            .add_source(File::from(path).required(required))
            .add_source(
                Environment::with_prefix("DEPOSIT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context(format!("Failed to build configuration from {:?}", path))?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            artifact: ArtifactConfig {
                path: PathBuf::from("models/final_logreg_threshold.json"),
                onnx_threads: 1,
            },
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                request_subject: "deposit.predict".to_string(),
                result_subject: "deposit.predictions".to_string(),
                queue_group: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
