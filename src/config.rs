//! Configuration System
//!
//! Session configuration: which structured-clone backend the probe emulates, which
//! `config` options are read-only, the initial primary store contents, and logging.
//! Loaded through the `config` crate with defaults, an optional TOML file, and
//! `CONTEXT_SYNC__*` environment overrides, in that order of precedence.

use crate::logging::LoggingConfig;
use crate::probe::{CloneBackend, SerializationProbe};
use crate::store::{ReadOnlyPolicy, StoreKind};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Structured-clone implementation the probe follows
    #[serde(default)]
    pub clone_backend: CloneBackend,

    /// Whether the native backend clones `Error` values (engine dependent)
    #[serde(default = "default_true")]
    pub native_clones_errors: bool,

    /// `config` options the public API may not change
    #[serde(default = "default_protected_config_keys")]
    pub protected_config_keys: Vec<String>,

    /// Primary store contents at session start
    #[serde(default)]
    pub initial: InitialValues,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Initial entries for the primary stores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitialValues {
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub env: HashMap<String, serde_json::Value>,
}

impl InitialValues {
    pub fn values(&self, kind: StoreKind) -> &HashMap<String, serde_json::Value> {
        match kind {
            StoreKind::Config => &self.config,
            StoreKind::Env => &self.env,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_protected_config_keys() -> Vec<String> {
    [
        "chromeWebSecurity",
        "experimentalSessionSupport",
        "experimentalMultiDomain",
        "browser",
        "port",
    ]
    .iter()
    .map(|key| key.to_string())
    .collect()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            clone_backend: CloneBackend::default(),
            native_clones_errors: default_true(),
            protected_config_keys: default_protected_config_keys(),
            initial: InitialValues::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    ProtectedKey(String),
    InitialValue(StoreKind, String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::ProtectedKey(msg) => write!(f, "Protected key: {}", msg),
            ValidationError::InitialValue(kind, msg) => {
                write!(f, "Initial {} value: {}", kind, msg)
            }
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl SyncConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let mut seen = HashSet::new();
        for key in &self.protected_config_keys {
            if key.trim().is_empty() {
                errors.push(ValidationError::ProtectedKey(
                    "Protected key cannot be empty".to_string(),
                ));
            } else if !seen.insert(key.as_str()) {
                errors.push(ValidationError::ProtectedKey(format!(
                    "Duplicate protected key '{}'",
                    key
                )));
            }
        }

        for kind in StoreKind::ALL {
            if self.initial.values(kind).keys().any(|key| key.is_empty()) {
                errors.push(ValidationError::InitialValue(
                    kind,
                    "Key cannot be empty".to_string(),
                ));
            }
        }

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn probe(&self) -> SerializationProbe {
        SerializationProbe::new(self.clone_backend, self.native_clones_errors)
    }

    pub fn read_only_policy(&self) -> ReadOnlyPolicy {
        ReadOnlyPolicy::new(self.protected_config_keys.iter().cloned())
    }
}
