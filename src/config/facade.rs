//! Loading entry point: defaults, then file, then environment.

use super::merge::merge_policy;
use super::sources::{environment, file};
use super::SyncConfig;
use crate::error::SyncError;
use config::ConfigBuilder;
use std::path::Path;

/// Loads and validates [`SyncConfig`].
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration. A missing `config_file` is skipped with a warning;
    /// `CONTEXT_SYNC__*` environment variables override both file and defaults.
    pub fn load(config_file: Option<&Path>) -> Result<SyncConfig, SyncError> {
        let mut builder = merge_policy::builder_with_defaults()?;
        if let Some(path) = config_file {
            builder = file::add_to_builder(builder, path, false)?;
        }
        builder = environment::add_to_builder(builder);
        Self::finish(builder)
    }

    /// Load exactly one file on top of the defaults, ignoring the environment.
    pub fn load_from_file(path: &Path) -> Result<SyncConfig, SyncError> {
        let builder = file::add_to_builder(merge_policy::builder_with_defaults()?, path, true)?;
        Self::finish(builder)
    }

    fn finish(
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<SyncConfig, SyncError> {
        let config: SyncConfig = builder.build()?.try_deserialize()?;
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            SyncError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(config)
    }
}
