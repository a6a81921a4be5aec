//! Config loader facade: assembles the layered sources into one [`EngineConfig`].

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::EngineConfig;
use crate::error::EngineError;
use config::{ConfigBuilder, Environment, File};
use std::path::Path;
use tracing::debug;

/// Environment prefix; `OPSPEC__DEFAULTS__TIMEOUT_SECS=5` sets `defaults.timeout_secs`.
pub const ENV_PREFIX: &str = "OPSPEC";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load defaults, global file, workspace file, then environment overrides.
    pub fn load(workspace_root: &Path) -> Result<EngineConfig, EngineError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        Self::finish(builder)
    }

    /// Load one explicit file in place of the global and workspace files.
    pub fn load_from_file(path: &Path) -> Result<EngineConfig, EngineError> {
        if !path.exists() {
            return Err(EngineError::ConfigError(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        let builder = merge_policy::builder_with_defaults()?.add_source(File::from(path).required(true));
        Self::finish(builder)
    }

    fn finish(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<EngineConfig, EngineError> {
        let builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.validate().map_err(|errors| {
            EngineError::ConfigError(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
        debug!(
            output = %config.defaults.output,
            timeout_secs = config.defaults.timeout_secs,
            idempotency = config.idempotency.enabled,
            "Configuration loaded"
        );
        Ok(config)
    }
}
