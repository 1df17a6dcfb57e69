//! Context Sync: config/env store synchronization across isolated contexts
//!
//! A primary execution context owns long-lived `config` and `env` stores. Secondary
//! contexts, each running as a different origin behind a restricted messaging channel,
//! get fresh stores seeded from a snapshot of the primary on entry, and hand a snapshot
//! back on exit. Only values that survive a structured clone ever cross the channel.

pub mod bridge;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod probe;
pub mod snapshot;
pub mod store;
pub mod value;

pub use bridge::{ContextBridge, ContextChannel, ContextHost, Origin};
pub use coordinator::{SecondaryScope, SecondarySession, SyncCoordinator, SyncPhase};
pub use error::{BridgeError, SyncError};
pub use probe::{Classification, CloneBackend, SerializationProbe};
pub use snapshot::{merge_into, take_snapshot, Snapshot, StoreSnapshots, SyncMessage};
pub use store::{KeyValueStore, ReadOnlyPolicy, StoreHandle, StoreKind, StoreSelection};
pub use value::Value;
