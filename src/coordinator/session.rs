//! Lifecycle of one secondary context incarnation.

use crate::bridge::{ContextBridge, Origin};
use crate::coordinator::secondary::{SecondaryContext, SecondaryScope};
use crate::error::{BridgeError, SyncError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Origin to the cycle currently active for it.
pub(crate) type ActiveContexts = Arc<Mutex<HashMap<Origin, u64>>>;

/// Synchronization phase of a context incarnation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    EnteringContext,
    ContextActive,
    ExitingContext,
}

/// What ended a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTrigger {
    CallbackReturned,
    ContextClosing,
    Dropped,
}

impl ExitTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitTrigger::CallbackReturned => "callback_returned",
            ExitTrigger::ContextClosing => "context_closing",
            ExitTrigger::Dropped => "dropped",
        }
    }
}

/// Entry signal shared by the primary-side receive handler and the session.
#[derive(Default)]
pub(crate) struct Waiters {
    pub(crate) ready: Mutex<Option<oneshot::Sender<()>>>,
}

impl Waiters {
    pub(crate) fn fire_ready(&self) {
        if let Some(tx) = self.ready.lock().take() {
            let _ = tx.send(());
        }
    }
}

/// Releases an origin reservation unless disarmed, so a cancelled `enter` frees it too.
pub(crate) struct ActiveGuard {
    active: ActiveContexts,
    origin: Origin,
    cycle: u64,
    armed: bool,
}

impl ActiveGuard {
    /// Reserve `origin` for `cycle`. Fails when another cycle holds it.
    pub(crate) fn reserve(
        active: &ActiveContexts,
        origin: &Origin,
        cycle: u64,
    ) -> Result<Self, SyncError> {
        let mut contexts = active.lock();
        if contexts.contains_key(origin) {
            return Err(SyncError::ContextAlreadyActive(origin.to_string()));
        }
        contexts.insert(origin.clone(), cycle);
        Ok(Self {
            active: active.clone(),
            origin: origin.clone(),
            cycle,
            armed: true,
        })
    }

    /// Hand the reservation over to the session.
    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if self.armed {
            release(&self.active, &self.origin, self.cycle);
            debug!(origin = %self.origin, cycle = self.cycle, "Released origin after failed entry");
        }
    }
}

fn release(active: &ActiveContexts, origin: &Origin, cycle: u64) {
    let mut contexts = active.lock();
    if contexts.get(origin) == Some(&cycle) {
        contexts.remove(origin);
    }
}

pub(crate) struct SessionShared {
    origin: Origin,
    cycle: u64,
    phase: Mutex<SyncPhase>,
    secondary: SecondaryContext,
    // Kept for the session's lifetime so the primary-side handlers stay registered.
    _primary: Arc<dyn ContextBridge>,
    waiters: Arc<Waiters>,
    active: ActiveContexts,
    return_sent: AtomicBool,
}

impl SessionShared {
    pub(crate) fn new(
        origin: Origin,
        cycle: u64,
        secondary: SecondaryContext,
        primary: Arc<dyn ContextBridge>,
        waiters: Arc<Waiters>,
        active: ActiveContexts,
    ) -> Self {
        Self {
            origin,
            cycle,
            phase: Mutex::new(SyncPhase::EnteringContext),
            secondary,
            _primary: primary,
            waiters,
            active,
            return_sent: AtomicBool::new(false),
        }
    }

    pub(crate) fn phase(&self) -> SyncPhase {
        *self.phase.lock()
    }

    /// EnteringContext -> ContextActive. False if the context closed during entry.
    pub(crate) fn activate(&self) -> bool {
        let mut phase = self.phase.lock();
        if *phase == SyncPhase::EnteringContext {
            *phase = SyncPhase::ContextActive;
            info!(origin = %self.origin, cycle = self.cycle, "Secondary context active");
            true
        } else {
            false
        }
    }

    /// Run the final sync. Only the first call from `ContextActive` does any work; later
    /// calls are no-ops returning `Ok(false)`.
    pub(crate) fn exit(&self, trigger: ExitTrigger) -> Result<bool, SyncError> {
        {
            let mut phase = self.phase.lock();
            let current = *phase;
            match current {
                SyncPhase::ContextActive => *phase = SyncPhase::ExitingContext,
                SyncPhase::EnteringContext => {
                    *phase = SyncPhase::Idle;
                    drop(phase);
                    debug!(
                        origin = %self.origin,
                        cycle = self.cycle,
                        trigger = trigger.as_str(),
                        "Context ended before seeding completed"
                    );
                    // Dropping the sender wakes the entering caller with an error.
                    self.waiters.ready.lock().take();
                    self.release();
                    return Ok(false);
                }
                SyncPhase::ExitingContext | SyncPhase::Idle => {
                    debug!(
                        origin = %self.origin,
                        cycle = self.cycle,
                        trigger = trigger.as_str(),
                        "Exit already handled"
                    );
                    return Ok(false);
                }
            }
        }

        info!(
            origin = %self.origin,
            cycle = self.cycle,
            trigger = trigger.as_str(),
            "Exiting secondary context"
        );
        let result = self.secondary.finish();
        *self.phase.lock() = SyncPhase::Idle;
        self.release();

        match result {
            Ok(sent) => {
                self.return_sent.store(sent, Ordering::SeqCst);
                Ok(sent)
            }
            Err(e) => {
                warn!(origin = %self.origin, cycle = self.cycle, error = %e, "Final sync failed");
                Err(e.into())
            }
        }
    }

    fn release(&self) {
        release(&self.active, &self.origin, self.cycle);
    }
}

/// An entered secondary context.
///
/// Dropping the session without calling [`SecondarySession::exit`] still runs the final
/// sync, but without waiting for the primary to merge it.
pub struct SecondarySession {
    shared: Arc<SessionShared>,
    merged: Option<oneshot::Receiver<()>>,
}

impl SecondarySession {
    pub(crate) fn new(shared: Arc<SessionShared>, merged: oneshot::Receiver<()>) -> Self {
        Self {
            shared,
            merged: Some(merged),
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.shared.origin
    }

    pub fn cycle(&self) -> u64 {
        self.shared.cycle
    }

    pub fn phase(&self) -> SyncPhase {
        self.shared.phase()
    }

    /// Handle for code running inside the context.
    pub fn scope(&self) -> SecondaryScope {
        self.shared.secondary.scope()
    }

    /// Snapshot the secondary stores and wait until the primary has merged them.
    pub async fn exit(mut self) -> Result<(), SyncError> {
        self.shared.exit(ExitTrigger::CallbackReturned)?;
        if self.shared.return_sent.load(Ordering::SeqCst) {
            if let Some(merged) = self.merged.take() {
                // The sender lives in the primary receive handler; losing it loses the merge.
                merged.await.map_err(|_| {
                    warn!(
                        origin = %self.shared.origin,
                        cycle = self.shared.cycle,
                        "Primary handler dropped before merging"
                    );
                    BridgeError::Disconnected(self.shared.origin.to_string())
                })?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for SecondarySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondarySession")
            .field("origin", &self.shared.origin)
            .field("cycle", &self.shared.cycle)
            .field("phase", &self.shared.phase())
            .finish()
    }
}

impl Drop for SecondarySession {
    fn drop(&mut self) {
        if let Err(e) = self.shared.exit(ExitTrigger::Dropped) {
            warn!(origin = %self.shared.origin, error = %e, "Final sync on drop failed");
        }
    }
}
