//! Environment source: `CONTEXT_SYNC__CLONE_BACKEND=ponyfill`, `CONTEXT_SYNC__LOGGING__LEVEL=debug`,
//! `CONTEXT_SYNC__PROTECTED_CONFIG_KEYS=browser,port`.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub const ENV_PREFIX: &str = "CONTEXT_SYNC";

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("protected_config_keys"),
    )
}
