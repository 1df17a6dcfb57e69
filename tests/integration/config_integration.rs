//! Configuration loading feeding a coordinator.

use std::fs;
use std::sync::Arc;

use context_sync::bridge::local::{LocalHost, Transport};
use context_sync::config::{ConfigLoader, SyncConfig};
use context_sync::{CloneBackend, StoreKind, StoreSelection, SyncCoordinator, SyncError, Value};
use serde_json::json;
use tempfile::TempDir;

use crate::integration::test_utils::ORIGIN;

#[tokio::test]
async fn test_initial_values_seed_primary_and_secondary() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("context-sync.toml");
    fs::write(
        &config_file,
        r#"
[initial.config]
foo = "bar"

[initial.env]
token = "abc"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    let coordinator =
        SyncCoordinator::from_config(&config, Arc::new(LocalHost::new(Transport::Encoded)));
    assert_eq!(coordinator.primary().config("foo"), Some(Value::from("bar")));

    let (foo, token) = coordinator
        .run_in_secondary_context(ORIGIN, StoreSelection::All, |scope| {
            (scope.get(StoreKind::Config, "foo"), scope.get(StoreKind::Env, "token"))
        })
        .await
        .unwrap();

    assert_eq!(foo, Some(Value::from("bar")));
    assert_eq!(token, Some(Value::from("abc")));
}

#[tokio::test]
async fn test_protected_initial_value_is_seeded_but_locked() {
    let mut config = SyncConfig::default();
    config
        .initial
        .config
        .insert("chromeWebSecurity".to_string(), json!(false));

    let coordinator =
        SyncCoordinator::from_config(&config, Arc::new(LocalHost::new(Transport::Direct)));
    assert_eq!(
        coordinator.primary().config("chromeWebSecurity"),
        Some(Value::Bool(false))
    );
    assert!(matches!(
        coordinator.primary().set_config("chromeWebSecurity", true),
        Err(SyncError::ReadOnlyViolation { .. })
    ));

    let seen = coordinator
        .run_in_secondary_context(ORIGIN, StoreSelection::All, |scope| {
            scope.stores().config("chromeWebSecurity")
        })
        .await
        .unwrap();
    assert_eq!(seen, Some(Value::Bool(false)));
}

#[tokio::test]
async fn test_ponyfill_backend_keeps_errors_home() {
    let config = SyncConfig {
        clone_backend: CloneBackend::Ponyfill,
        ..SyncConfig::default()
    };
    let coordinator =
        SyncCoordinator::from_config(&config, Arc::new(LocalHost::new(Transport::Direct)));
    let failure = Value::error("RangeError", "out of range");
    coordinator.primary().set_env("failure", failure.clone()).unwrap();

    coordinator
        .run_in_secondary_context(ORIGIN, StoreSelection::All, |scope| {
            assert_eq!(scope.stores().env("failure"), None);
        })
        .await
        .unwrap();

    assert_eq!(coordinator.primary().env("failure"), Some(failure));
}

#[test]
fn test_invalid_file_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("context-sync.toml");
    fs::write(&config_file, "[logging]\nformat = \"yaml\"\n").unwrap();

    let err = ConfigLoader::load_from_file(&config_file).unwrap_err();
    assert!(matches!(err, SyncError::ConfigError(_)));
}
