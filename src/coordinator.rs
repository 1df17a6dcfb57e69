//! Sync Coordinator
//!
//! Drives the store synchronization around every secondary context:
//!
//! 1. **Entering**: snapshot the primary stores, send them as a `Seed`, and wait for the
//!    secondary's `Ready` before any caller code runs in the context.
//! 2. **Active**: both sides mutate their own stores freely; nothing is synchronized.
//! 3. **Exiting**: on callback return or when the bridge reports the context closing,
//!    the secondary stores are snapshotted once and merged into the primary stores.
//!
//! Anything the secondary writes after step 3 stays in that orphaned context. Entering
//! the same origin again starts from fresh stores seeded from the current primary state.

mod secondary;
mod session;

pub use secondary::SecondaryScope;
pub use session::{ExitTrigger, SecondarySession, SyncPhase};

use crate::bridge::{ContextHost, Origin};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::probe::SerializationProbe;
use crate::snapshot::{StoreSnapshots, SyncMessage};
use crate::store::{ReadOnlyPolicy, StoreHandle, StoreKind, StoreSelection};
use crate::value::Value;
use parking_lot::Mutex;
use secondary::SecondaryContext;
use session::{ActiveContexts, ActiveGuard, SessionShared, Waiters};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Owns the primary stores of one test session and synchronizes them with secondary
/// contexts opened through a [`ContextHost`].
pub struct SyncCoordinator {
    primary: StoreHandle,
    policy: ReadOnlyPolicy,
    probe: SerializationProbe,
    host: Arc<dyn ContextHost>,
    active: ActiveContexts,
    next_cycle: AtomicU64,
}

impl SyncCoordinator {
    pub fn new(host: Arc<dyn ContextHost>, probe: SerializationProbe, policy: ReadOnlyPolicy) -> Self {
        Self {
            primary: StoreHandle::new(policy.clone()),
            policy,
            probe,
            host,
            active: Arc::new(Mutex::new(HashMap::new())),
            next_cycle: AtomicU64::new(1),
        }
    }

    /// Build a coordinator from loaded configuration, seeding the primary stores with the
    /// configured initial values. Initial values may include read-only options.
    pub fn from_config(config: &SyncConfig, host: Arc<dyn ContextHost>) -> Self {
        let coordinator = Self::new(host, config.probe(), config.read_only_policy());
        for kind in StoreKind::ALL {
            let initial = config.initial.values(kind);
            coordinator.primary.with_store_mut(kind, |store| {
                for (key, value) in initial {
                    store.insert(key.clone(), Value::from(value.clone()));
                }
            });
            debug!(store = %kind, entries = initial.len(), "Seeded primary store from config");
        }
        coordinator
    }

    /// The long-lived primary stores.
    pub fn primary(&self) -> &StoreHandle {
        &self.primary
    }

    pub fn probe(&self) -> &SerializationProbe {
        &self.probe
    }

    pub fn is_active(&self, origin: impl Into<Origin>) -> bool {
        self.active.lock().contains_key(&origin.into())
    }

    /// Enter a secondary context. Resolves once the secondary stores are seeded.
    pub async fn enter(
        &self,
        origin: impl Into<Origin>,
        selection: StoreSelection,
    ) -> Result<SecondarySession, SyncError> {
        let origin = origin.into();
        let cycle = self.next_cycle.fetch_add(1, Ordering::SeqCst);
        let reservation = ActiveGuard::reserve(&self.active, &origin, cycle)?;

        info!(origin = %origin, cycle, "Entering secondary context");
        match self.open_session(&origin, cycle, selection).await {
            Ok(session) => {
                reservation.disarm();
                Ok(session)
            }
            Err(e) => {
                warn!(origin = %origin, cycle, error = %e, "Failed to enter secondary context");
                Err(e)
            }
        }
    }

    /// Run `callback` inside a secondary context, syncing stores on the way in and out.
    ///
    /// Only the stores in `selection` take part; the others start empty in the secondary
    /// context and are never merged back.
    pub async fn run_in_secondary_context<F, R>(
        &self,
        origin: impl Into<Origin>,
        selection: StoreSelection,
        callback: F,
    ) -> Result<R, SyncError>
    where
        F: FnOnce(&SecondaryScope) -> R,
    {
        let session = self.enter(origin, selection).await?;
        let output = callback(&session.scope());
        session.exit().await?;
        Ok(output)
    }

    async fn open_session(
        &self,
        origin: &Origin,
        cycle: u64,
        selection: StoreSelection,
    ) -> Result<SecondarySession, SyncError> {
        let channel = self
            .host
            .open(origin)
            .await?
            .ok_or_else(|| SyncError::BridgeUnavailable(origin.to_string()))?;

        let (ready_tx, ready_rx) = oneshot::channel();
        let (merged_tx, merged_rx) = oneshot::channel();
        let waiters = Arc::new(Waiters {
            ready: Mutex::new(Some(ready_tx)),
        });
        let merged = Mutex::new(Some(merged_tx));

        let secondary = SecondaryContext::attach(
            channel.secondary.clone(),
            cycle,
            self.policy.clone(),
            selection.clone(),
            self.probe,
        );
        let shared = Arc::new(SessionShared::new(
            origin.clone(),
            cycle,
            secondary,
            channel.primary.clone(),
            waiters.clone(),
            self.active.clone(),
        ));

        let primary = self.primary.clone();
        let signals = waiters.clone();
        channel.primary.on_receive(Arc::new(move |message: SyncMessage| match message {
            SyncMessage::Ready { cycle: ready } if ready == cycle => signals.fire_ready(),
            SyncMessage::Return {
                cycle: returned,
                stores,
            } if returned == cycle => {
                stores.apply_to(&primary);
                info!(cycle, entries = stores.entry_count(), "Merged secondary snapshot into primary");
                if let Some(tx) = merged.lock().take() {
                    let _ = tx.send(());
                }
            }
            other => debug!(
                cycle,
                message = other.kind(),
                message_cycle = other.cycle(),
                "Primary ignoring message"
            ),
        }));

        let closing = Arc::downgrade(&shared);
        channel.primary.on_closing(Arc::new(move || {
            if let Some(shared) = closing.upgrade() {
                if let Err(e) = shared.exit(ExitTrigger::ContextClosing) {
                    warn!(cycle, error = %e, "Final sync on close failed");
                }
            }
        }));

        let seed = StoreSnapshots::capture(&self.primary, &selection, &self.probe);
        debug!(origin = %origin, cycle, entries = seed.entry_count(), "Seeding secondary context");
        channel.primary.send(SyncMessage::Seed { cycle, stores: seed })?;

        let aborted = || SyncError::EntryAborted {
            origin: origin.to_string(),
            reason: "context closed before seeding completed".to_string(),
        };
        ready_rx.await.map_err(|_| aborted())?;
        if !shared.activate() {
            return Err(aborted());
        }
        Ok(SecondarySession::new(shared, merged_rx))
    }
}
