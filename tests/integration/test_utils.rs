//! Shared test utilities for integration tests

use std::sync::Arc;

use context_sync::bridge::local::{LocalHost, Transport};
use context_sync::{ReadOnlyPolicy, SerializationProbe, SyncCoordinator};

pub const ORIGIN: &str = "foobar.com";

/// Coordinator over an in-process host with the default probe and read-only keys.
pub fn local_coordinator() -> (SyncCoordinator, Arc<LocalHost>) {
    coordinator_with(SerializationProbe::default(), Transport::Direct)
}

pub fn coordinator_with(
    probe: SerializationProbe,
    transport: Transport,
) -> (SyncCoordinator, Arc<LocalHost>) {
    let host = Arc::new(LocalHost::new(transport));
    let policy = ReadOnlyPolicy::new(["chromeWebSecurity", "experimentalSessionSupport"]);
    let coordinator = SyncCoordinator::new(host.clone(), probe, policy);
    (coordinator, host)
}
