//! Entry and exit sync of serializable values, for both stores.

use context_sync::{StoreKind, StoreSelection, Value};
use tokio::sync::oneshot;

use crate::integration::test_utils::{local_coordinator, ORIGIN};

fn only(kind: StoreKind) -> StoreSelection {
    StoreSelection::only([kind])
}

#[tokio::test]
async fn test_primary_values_available_on_entry() {
    for kind in StoreKind::ALL {
        let (coordinator, _host) = local_coordinator();
        coordinator.primary().set(kind, "foo", "bar").unwrap();

        let seen = coordinator
            .run_in_secondary_context(ORIGIN, only(kind), |scope| scope.get(kind, "foo"))
            .await
            .unwrap();

        assert_eq!(seen, Some(Value::from("bar")), "store {}", kind);
    }
}

#[tokio::test]
async fn test_each_entry_reseeds_from_current_primary() {
    for kind in StoreKind::ALL {
        let (coordinator, _host) = local_coordinator();
        coordinator.primary().set(kind, "foo", "bar").unwrap();
        coordinator
            .run_in_secondary_context(ORIGIN, only(kind), |_| ())
            .await
            .unwrap();

        coordinator.primary().set(kind, "foo", "baz").unwrap();
        let seen = coordinator
            .run_in_secondary_context(ORIGIN, only(kind), |scope| scope.get(kind, "foo"))
            .await
            .unwrap();

        assert_eq!(seen, Some(Value::from("baz")), "store {}", kind);
    }
}

#[tokio::test]
async fn test_secondary_writes_propagate_outward() {
    for kind in StoreKind::ALL {
        let (coordinator, _host) = local_coordinator();
        coordinator.primary().set(kind, "bar", "foo").unwrap();

        coordinator
            .run_in_secondary_context(ORIGIN, only(kind), |scope| {
                scope.set(kind, "bar", "baz").unwrap();
            })
            .await
            .unwrap();

        assert_eq!(coordinator.primary().get(kind, "bar"), Some(Value::from("baz")));
    }
}

#[tokio::test]
async fn test_writes_after_exit_are_lost() {
    for kind in StoreKind::ALL {
        let (coordinator, _host) = local_coordinator();
        let (trigger_tx, trigger_rx) = oneshot::channel::<()>();

        let deferred = coordinator
            .run_in_secondary_context(ORIGIN, only(kind), move |scope| {
                scope.set(kind, "baz", "quux").unwrap();
                let orphan = scope.clone();
                tokio::spawn(async move {
                    let _ = trigger_rx.await;
                    orphan.set(kind, "baz", "qux").unwrap();
                    orphan.get(kind, "baz")
                })
            })
            .await
            .unwrap();

        assert_eq!(coordinator.primary().get(kind, "baz"), Some(Value::from("quux")));

        trigger_tx.send(()).unwrap();
        let late = deferred.await.unwrap();

        assert_eq!(late, Some(Value::from("qux")));
        assert_eq!(coordinator.primary().get(kind, "baz"), Some(Value::from("quux")));

        let reentered = coordinator
            .run_in_secondary_context(ORIGIN, only(kind), |scope| scope.get(kind, "baz"))
            .await
            .unwrap();
        assert_eq!(reentered, Some(Value::from("quux")));
    }
}

#[tokio::test]
async fn test_undefined_in_primary_reaches_secondary() {
    for kind in StoreKind::ALL {
        let (coordinator, _host) = local_coordinator();
        coordinator
            .run_in_secondary_context(ORIGIN, only(kind), |scope| {
                scope.set(kind, "baz", "qux").unwrap();
            })
            .await
            .unwrap();
        coordinator.primary().set(kind, "baz", Value::Undefined).unwrap();

        let seen = coordinator
            .run_in_secondary_context(ORIGIN, only(kind), |scope| scope.get(kind, "baz"))
            .await
            .unwrap();

        assert_eq!(seen, Some(Value::Undefined));
    }
}

#[tokio::test]
async fn test_unselected_store_is_not_synced() {
    let (coordinator, _host) = local_coordinator();
    coordinator.primary().set_config("foo", "bar").unwrap();
    coordinator.primary().set_env("foo", "bar").unwrap();

    let (config_seen, env_seen) = coordinator
        .run_in_secondary_context(ORIGIN, only(StoreKind::Env), |scope| {
            scope.set(StoreKind::Config, "written", 1).unwrap();
            scope.set(StoreKind::Env, "written", 1).unwrap();
            (scope.get(StoreKind::Config, "foo"), scope.get(StoreKind::Env, "foo"))
        })
        .await
        .unwrap();

    assert_eq!(config_seen, None);
    assert_eq!(env_seen, Some(Value::from("bar")));
    assert_eq!(coordinator.primary().config("written"), None);
    assert_eq!(coordinator.primary().env("written"), Some(Value::from(1)));
}

#[tokio::test]
async fn test_read_only_option_rejected_in_secondary() {
    let (coordinator, _host) = local_coordinator();

    let result = coordinator
        .run_in_secondary_context(ORIGIN, StoreSelection::All, |scope| {
            scope.set(StoreKind::Config, "chromeWebSecurity", false)
        })
        .await
        .unwrap();

    let err = result.unwrap_err();
    assert!(err
        .to_string()
        .contains("cannot mutate option `chromeWebSecurity` because it is a read-only property"));
    assert_eq!(coordinator.primary().config("chromeWebSecurity"), None);
}
