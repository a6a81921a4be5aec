//! Configuration System
//!
//! Layered engine configuration: built-in defaults, a global file, a workspace file and
//! `OPSPEC__*` environment overrides, validated once after merging.

use crate::envelope::OutputMode;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::{ConfigLoader, ENV_PREFIX};
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-invocation defaults the CLI applies when flags are absent
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub idempotency: IdempotencyConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub output: OutputMode,

    /// Time budget for the executing phase, in seconds. Unset means unbounded.
    #[serde(default)]
    pub timeout_secs: Option<f64>,

    /// Attach raw failure detail to unclassified errors.
    #[serde(default)]
    pub verbose_errors: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Defaults(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Defaults(msg) => write!(f, "defaults: {}", msg),
            ValidationError::Logging(msg) => write!(f, "logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Parse a timeout in seconds; rejects zero, negative and non-finite values.
pub fn parse_timeout_secs(secs: f64) -> Result<Duration, String> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("timeout must be a positive number of seconds, got {}", secs));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("timeout {} is out of range: {}", secs, e))
}

impl EngineConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Some(secs) = self.defaults.timeout_secs {
            if let Err(e) = parse_timeout_secs(secs) {
                errors.push(ValidationError::Defaults(e));
            }
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            errors.push(ValidationError::Logging(format!(
                "format must be 'text' or 'json', got '{}'",
                self.logging.format
            )));
        }
        if !matches!(self.logging.output.as_str(), "stderr" | "file") {
            errors.push(ValidationError::Logging(format!(
                "output must be 'stderr' or 'file', got '{}'",
                self.logging.output
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Default executing-phase budget, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.defaults
            .timeout_secs
            .and_then(|secs| parse_timeout_secs(secs).ok())
    }
}
