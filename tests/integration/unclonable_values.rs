//! Values that cannot cross the bridge stay in the context that holds them.

use context_sync::bridge::local::Transport;
use context_sync::{SerializationProbe, StoreKind, StoreSelection, Value};

use crate::integration::test_utils::{coordinator_with, local_coordinator, ORIGIN};

fn only(kind: StoreKind) -> StoreSelection {
    StoreSelection::only([kind])
}

#[tokio::test]
async fn test_function_not_sent_to_secondary() {
    for kind in StoreKind::ALL {
        let (coordinator, _host) = local_coordinator();
        coordinator
            .primary()
            .set(kind, "unserializable", Value::function("noop"))
            .unwrap();

        let seen = coordinator
            .run_in_secondary_context(ORIGIN, only(kind), |scope| {
                scope.get(kind, "unserializable")
            })
            .await
            .unwrap();

        assert_eq!(seen, None);
    }
}

#[tokio::test]
async fn test_primary_function_kept_when_secondary_lacks_key() {
    for kind in StoreKind::ALL {
        let (coordinator, _host) = local_coordinator();
        let original = Value::function("noop");
        coordinator.primary().set(kind, "unserializable", original.clone()).unwrap();

        coordinator
            .run_in_secondary_context(ORIGIN, only(kind), |_| ())
            .await
            .unwrap();

        let after = coordinator.primary().get(kind, "unserializable").unwrap();
        match (&after, &original) {
            (Value::Function(after), Value::Function(original)) => {
                assert!(after.ptr_eq(original))
            }
            other => panic!("expected the same function back, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_serializable_secondary_value_replaces_primary_function() {
    for kind in StoreKind::ALL {
        let (coordinator, _host) = local_coordinator();
        coordinator
            .primary()
            .set(kind, "unserializable", Value::function("noop"))
            .unwrap();

        coordinator
            .run_in_secondary_context(ORIGIN, only(kind), |scope| {
                scope.set(kind, "unserializable", Value::Undefined).unwrap();
            })
            .await
            .unwrap();

        assert_eq!(
            coordinator.primary().get(kind, "unserializable"),
            Some(Value::Undefined)
        );
    }
}

#[tokio::test]
async fn test_serializable_primary_value_replaces_secondary_function() {
    for kind in StoreKind::ALL {
        let (coordinator, _host) = local_coordinator();
        coordinator
            .run_in_secondary_context(ORIGIN, only(kind), |scope| {
                scope
                    .set(kind, "unserializable", Value::function("noop"))
                    .unwrap();
            })
            .await
            .unwrap();
        assert_eq!(coordinator.primary().get(kind, "unserializable"), None);

        coordinator
            .primary()
            .set(kind, "unserializable", Value::Undefined)
            .unwrap();
        let seen = coordinator
            .run_in_secondary_context(ORIGIN, only(kind), |scope| {
                scope.get(kind, "unserializable")
            })
            .await
            .unwrap();

        assert_eq!(seen, Some(Value::Undefined));
        assert_eq!(
            coordinator.primary().get(kind, "unserializable"),
            Some(Value::Undefined)
        );
    }
}

#[tokio::test]
async fn test_function_on_both_sides_keeps_primary() {
    for kind in StoreKind::ALL {
        let (coordinator, _host) = local_coordinator();
        let original = Value::function("primary");
        coordinator.primary().set(kind, "unserializable", original.clone()).unwrap();

        coordinator
            .run_in_secondary_context(ORIGIN, only(kind), |scope| {
                scope
                    .set(kind, "unserializable", Value::function("secondary"))
                    .unwrap();
            })
            .await
            .unwrap();

        assert_eq!(coordinator.primary().get(kind, "unserializable"), Some(original));
    }
}

#[tokio::test]
async fn test_objects_with_handles_are_not_partially_merged() {
    for kind in StoreKind::ALL {
        let (coordinator, _host) = local_coordinator();
        coordinator
            .primary()
            .set(
                kind,
                "unserializable",
                Value::object([("a", Value::from(1)), ("b", Value::handle("document"))]),
            )
            .unwrap();

        let seen = coordinator
            .run_in_secondary_context(ORIGIN, only(kind), |scope| {
                let seen = scope.get(kind, "unserializable");
                scope
                    .set(
                        kind,
                        "unserializable",
                        Value::object([("a", Value::from(3)), ("c", Value::handle("document"))]),
                    )
                    .unwrap();
                seen
            })
            .await
            .unwrap();

        assert_eq!(seen, None);
        let primary = coordinator.primary().get(kind, "unserializable").unwrap();
        assert_eq!(primary.field("a"), Some(&Value::from(1)));
        assert!(primary.field("c").is_none());
    }
}

#[tokio::test]
async fn test_error_values_follow_the_clone_backend() {
    let cases = [
        (SerializationProbe::native(true), true),
        (SerializationProbe::native(false), false),
        (SerializationProbe::ponyfill(), false),
    ];
    for (probe, crosses) in cases {
        let (coordinator, _host) = coordinator_with(probe, Transport::Encoded);
        coordinator
            .primary()
            .set_env("failure", Value::error("TypeError", "boom"))
            .unwrap();

        let seen = coordinator
            .run_in_secondary_context(ORIGIN, StoreSelection::All, |scope| scope.stores().env("failure"))
            .await
            .unwrap();

        if crosses {
            assert_eq!(seen, Some(Value::error("TypeError", "boom")));
        } else {
            assert_eq!(seen, None);
        }
    }
}

#[tokio::test]
async fn test_custom_error_names_stay_in_their_context() {
    let (coordinator, _host) = coordinator_with(SerializationProbe::native(true), Transport::Direct);
    let custom = Value::error("ValidationError", "bad input");
    coordinator.primary().set_env("failure", custom.clone()).unwrap();

    let seen = coordinator
        .run_in_secondary_context(ORIGIN, StoreSelection::All, |scope| {
            let seen = scope.stores().env("failure");
            scope
                .stores()
                .set_env("thrown", Value::error("ValidationError", "from secondary"))
                .unwrap();
            seen
        })
        .await
        .unwrap();

    assert_eq!(seen, None);
    assert_eq!(coordinator.primary().env("failure"), Some(custom));
    assert_eq!(coordinator.primary().env("thrown"), None);
}
