//! Snapshot codec
//!
//! `take_snapshot` filters a store through the serialization probe; `merge_into` applies a
//! received snapshot to a destination store. Merge rules:
//!
//! - every key in the snapshot overwrites the destination entry (last snapshot wins)
//! - a key missing from the snapshot leaves the destination entry untouched, including
//!   destination values that are themselves unclonable
//! - values are replaced whole, never combined field by field

use crate::error::BridgeError;
use crate::probe::{Classification, SerializationProbe};
use crate::store::{KeyValueStore, StoreHandle, StoreKind, StoreSelection};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Immutable, fully clonable copy of one store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    entries: BTreeMap<String, Value>,
}

impl Snapshot {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Snapshot a store, keeping only entries the probe can clone.
pub fn take_snapshot(store: &KeyValueStore, probe: &SerializationProbe) -> Snapshot {
    let mut entries = BTreeMap::new();
    let mut skipped = 0usize;
    for (key, value) in store.entries() {
        match probe.classify(value) {
            Classification::Clonable(copy) => {
                entries.insert(key.clone(), copy);
            }
            Classification::Unclonable(reason) => {
                skipped += 1;
                debug!(
                    store = %store.kind(),
                    key = %key,
                    value_type = value.type_name(),
                    reason = reason.as_str(),
                    "Leaving unserializable entry in its context"
                );
            }
        }
    }
    debug!(store = %store.kind(), included = entries.len(), skipped, "Snapshot taken");
    Snapshot { entries }
}

/// Apply a snapshot to a destination store.
pub fn merge_into(destination: &mut KeyValueStore, snapshot: &Snapshot) {
    for (key, value) in &snapshot.entries {
        destination.insert(key.clone(), value.clone());
    }
    debug!(
        store = %destination.kind(),
        merged = snapshot.len(),
        "Snapshot merged"
    );
}

/// Snapshots of every participating store in one context.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StoreSnapshots {
    stores: BTreeMap<StoreKind, Snapshot>,
}

impl StoreSnapshots {
    /// Snapshot the selected stores behind `handle`.
    pub fn capture(
        handle: &StoreHandle,
        selection: &StoreSelection,
        probe: &SerializationProbe,
    ) -> Self {
        let stores = selection
            .kinds()
            .map(|kind| (kind, handle.with_store(kind, |store| take_snapshot(store, probe))))
            .collect();
        Self { stores }
    }

    /// Merge every carried snapshot into the matching store behind `handle`.
    pub fn apply_to(&self, handle: &StoreHandle) {
        for (kind, snapshot) in &self.stores {
            handle.with_store_mut(*kind, |store| merge_into(store, snapshot));
        }
    }

    pub fn get(&self, kind: StoreKind) -> Option<&Snapshot> {
        self.stores.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = StoreKind> + '_ {
        self.stores.keys().copied()
    }

    pub fn entry_count(&self) -> usize {
        self.stores.values().map(Snapshot::len).sum()
    }
}

/// Messages exchanged over a context bridge. `cycle` identifies one context incarnation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncMessage {
    /// Primary to secondary: initial state.
    Seed { cycle: u64, stores: StoreSnapshots },
    /// Secondary to primary: seeding finished.
    Ready { cycle: u64 },
    /// Secondary to primary: final state at exit.
    Return { cycle: u64, stores: StoreSnapshots },
}

impl SyncMessage {
    pub fn cycle(&self) -> u64 {
        match self {
            SyncMessage::Seed { cycle, .. }
            | SyncMessage::Ready { cycle }
            | SyncMessage::Return { cycle, .. } => *cycle,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::Seed { .. } => "seed",
            SyncMessage::Ready { .. } => "ready",
            SyncMessage::Return { .. } => "return",
        }
    }
}

/// Encode a message for transports that cross a process boundary.
pub fn encode_message(message: &SyncMessage) -> Result<Vec<u8>, BridgeError> {
    Ok(bincode::serialize(message)?)
}

pub fn decode_message(bytes: &[u8]) -> Result<SyncMessage, BridgeError> {
    bincode::deserialize(bytes).map_err(|e| BridgeError::Decode(e.to_string()))
}
