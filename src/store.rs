//! Key/value stores
//!
//! Each execution context owns one `config` store and one `env` store. Stores are plain
//! in-memory maps: they never merge on their own, that is the snapshot codec's job.

use crate::error::SyncError;
use crate::value::Value;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// The two logical stores every context carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Config,
    Env,
}

impl StoreKind {
    pub const ALL: [StoreKind; 2] = [StoreKind::Config, StoreKind::Env];

    pub fn as_str(self) -> &'static str {
        match self {
            StoreKind::Config => "config",
            StoreKind::Env => "env",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stores take part in a secondary context.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoreSelection {
    #[default]
    All,
    Only(BTreeSet<StoreKind>),
}

impl StoreSelection {
    pub fn only(kinds: impl IntoIterator<Item = StoreKind>) -> Self {
        StoreSelection::Only(kinds.into_iter().collect())
    }

    pub fn includes(&self, kind: StoreKind) -> bool {
        match self {
            StoreSelection::All => true,
            StoreSelection::Only(kinds) => kinds.contains(&kind),
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = StoreKind> + '_ {
        StoreKind::ALL.into_iter().filter(|kind| self.includes(*kind))
    }
}

/// Keys of the `config` store that the public API refuses to change.
#[derive(Debug, Clone, Default)]
pub struct ReadOnlyPolicy {
    protected_config_keys: Arc<BTreeSet<String>>,
}

impl ReadOnlyPolicy {
    pub fn new(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            protected_config_keys: Arc::new(keys.into_iter().map(Into::into).collect()),
        }
    }

    pub fn is_protected(&self, kind: StoreKind, key: &str) -> bool {
        kind == StoreKind::Config && self.protected_config_keys.contains(key)
    }
}

/// A single store: string keys to arbitrary values.
#[derive(Debug, Clone)]
pub struct KeyValueStore {
    kind: StoreKind,
    entries: HashMap<String, Value>,
    policy: ReadOnlyPolicy,
}

impl KeyValueStore {
    pub fn new(kind: StoreKind, policy: ReadOnlyPolicy) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
            policy,
        }
    }

    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Set a value through the public API. Protected keys are rejected.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Result<(), SyncError> {
        let key = key.into();
        if self.policy.is_protected(self.kind, &key) {
            warn!(store = %self.kind, key = %key, "Rejected write to read-only option");
            return Err(SyncError::ReadOnlyViolation {
                store: self.kind,
                key,
            });
        }
        self.entries.insert(key, value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write that bypasses the read-only policy; used by merges and session seeding.
    pub(crate) fn insert(&mut self, key: String, value: Value) {
        self.entries.insert(key, value);
    }
}

/// The `config` and `env` stores of one context.
#[derive(Debug, Clone)]
pub struct ContextStores {
    config: KeyValueStore,
    env: KeyValueStore,
}

impl ContextStores {
    pub fn new(policy: ReadOnlyPolicy) -> Self {
        Self {
            config: KeyValueStore::new(StoreKind::Config, policy.clone()),
            env: KeyValueStore::new(StoreKind::Env, policy),
        }
    }

    pub fn store(&self, kind: StoreKind) -> &KeyValueStore {
        match kind {
            StoreKind::Config => &self.config,
            StoreKind::Env => &self.env,
        }
    }

    pub fn store_mut(&mut self, kind: StoreKind) -> &mut KeyValueStore {
        match kind {
            StoreKind::Config => &mut self.config,
            StoreKind::Env => &mut self.env,
        }
    }
}

/// Shared handle to one context's stores.
///
/// Bridge handlers need `Send + Sync` access, hence the mutex; contexts never mutate the
/// same stores concurrently.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    inner: Arc<Mutex<ContextStores>>,
}

impl StoreHandle {
    pub fn new(policy: ReadOnlyPolicy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ContextStores::new(policy))),
        }
    }

    pub fn get(&self, kind: StoreKind, key: &str) -> Option<Value> {
        self.inner.lock().store(kind).get(key).cloned()
    }

    pub fn set(
        &self,
        kind: StoreKind,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), SyncError> {
        self.inner.lock().store_mut(kind).set(key, value.into())
    }

    pub fn remove(&self, kind: StoreKind, key: &str) -> Option<Value> {
        self.inner.lock().store_mut(kind).remove(key)
    }

    pub fn config(&self, key: &str) -> Option<Value> {
        self.get(StoreKind::Config, key)
    }

    pub fn env(&self, key: &str) -> Option<Value> {
        self.get(StoreKind::Env, key)
    }

    pub fn set_config(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), SyncError> {
        self.set(StoreKind::Config, key, value)
    }

    pub fn set_env(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), SyncError> {
        self.set(StoreKind::Env, key, value)
    }

    /// Run `f` against one store while holding the lock.
    pub fn with_store<R>(&self, kind: StoreKind, f: impl FnOnce(&KeyValueStore) -> R) -> R {
        f(self.inner.lock().store(kind))
    }

    pub(crate) fn with_store_mut<R>(
        &self,
        kind: StoreKind,
        f: impl FnOnce(&mut KeyValueStore) -> R,
    ) -> R {
        f(self.inner.lock().store_mut(kind))
    }
}
