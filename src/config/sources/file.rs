//! TOML config file source.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use std::path::Path;
use tracing::warn;

/// Add the config file at `path`. When `required` is false a missing file is skipped.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
    required: bool,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    if !path.exists() && !required {
        warn!(
            config_path = %path.display(),
            "Configuration file not found, continuing with defaults"
        );
        return Ok(builder);
    }
    Ok(builder.add_source(File::from(path).required(required)))
}
