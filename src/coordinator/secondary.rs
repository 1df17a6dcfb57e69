//! Secondary side of a context channel.
//!
//! Owns the fresh stores of one secondary context incarnation. Seeds them when the `Seed`
//! message arrives, acknowledges with `Ready`, and sends exactly one `Return` snapshot when
//! the context finishes. Writes after that stay local.

use crate::bridge::{ContextBridge, Origin};
use crate::error::{BridgeError, SyncError};
use crate::probe::SerializationProbe;
use crate::snapshot::{StoreSnapshots, SyncMessage};
use crate::store::{ReadOnlyPolicy, StoreHandle, StoreKind, StoreSelection};
use crate::value::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) struct SecondaryContext {
    origin: Origin,
    cycle: u64,
    stores: StoreHandle,
    selection: StoreSelection,
    probe: SerializationProbe,
    bridge: Arc<dyn ContextBridge>,
    finished: AtomicBool,
}

impl SecondaryContext {
    /// Create the context's stores and start listening for the seed.
    pub(crate) fn attach(
        bridge: Arc<dyn ContextBridge>,
        cycle: u64,
        policy: ReadOnlyPolicy,
        selection: StoreSelection,
        probe: SerializationProbe,
    ) -> Self {
        let stores = StoreHandle::new(policy);
        let seed_target = stores.clone();
        let reply = Arc::downgrade(&bridge);
        bridge.on_receive(Arc::new(move |message: SyncMessage| match message {
            SyncMessage::Seed {
                cycle: seed_cycle,
                stores: snapshots,
            } if seed_cycle == cycle => {
                snapshots.apply_to(&seed_target);
                debug!(cycle, entries = snapshots.entry_count(), "Secondary stores seeded");
                if let Some(bridge) = reply.upgrade() {
                    if let Err(e) = bridge.send(SyncMessage::Ready { cycle }) {
                        warn!(cycle, error = %e, "Failed to acknowledge seed");
                    }
                }
            }
            other => debug!(
                cycle,
                message = other.kind(),
                message_cycle = other.cycle(),
                "Secondary ignoring message"
            ),
        }));

        Self {
            origin: bridge.origin().clone(),
            cycle,
            stores,
            selection,
            probe,
            bridge,
            finished: AtomicBool::new(false),
        }
    }

    pub(crate) fn scope(&self) -> SecondaryScope {
        SecondaryScope {
            origin: self.origin.clone(),
            stores: self.stores.clone(),
        }
    }

    /// Send the final snapshot. Returns `Ok(false)` when it was already sent.
    pub(crate) fn finish(&self) -> Result<bool, BridgeError> {
        if self.finished.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        let stores = StoreSnapshots::capture(&self.stores, &self.selection, &self.probe);
        debug!(
            origin = %self.origin,
            cycle = self.cycle,
            entries = stores.entry_count(),
            "Sending final snapshot"
        );
        self.bridge.send(SyncMessage::Return {
            cycle: self.cycle,
            stores,
        })?;
        Ok(true)
    }
}

/// What code running inside a secondary context sees.
///
/// Clones share the same stores; a clone kept past exit still reads and writes them, but
/// nothing written after exit reaches the primary context.
#[derive(Debug, Clone)]
pub struct SecondaryScope {
    origin: Origin,
    stores: StoreHandle,
}

impl SecondaryScope {
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn stores(&self) -> &StoreHandle {
        &self.stores
    }

    pub fn get(&self, kind: StoreKind, key: &str) -> Option<Value> {
        self.stores.get(kind, key)
    }

    pub fn set(
        &self,
        kind: StoreKind,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), SyncError> {
        self.stores.set(kind, key, value)
    }
}
