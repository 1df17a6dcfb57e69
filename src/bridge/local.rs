//! In-process bridge.
//!
//! Both endpoints share one channel; a send on one endpoint runs the peer's receive
//! handlers synchronously, in registration order. `Transport::Encoded` pushes every message
//! through the wire encoding first, so anything that would not survive a process boundary
//! fails here too.

use crate::bridge::{ClosingHandler, ContextBridge, ContextChannel, ContextHost, Origin, ReceiveHandler};
use crate::error::{BridgeError, SyncError};
use crate::snapshot::{decode_message, encode_message, SyncMessage};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// How messages travel between the two endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// Messages are handed over as values.
    #[default]
    Direct,
    /// Messages are encoded and decoded on every send.
    Encoded,
}

const PRIMARY: usize = 0;
const SECONDARY: usize = 1;

#[derive(Default)]
struct Endpoint {
    receive: Mutex<Vec<ReceiveHandler>>,
    closing: Mutex<Vec<ClosingHandler>>,
}

struct Channel {
    origin: Origin,
    transport: Transport,
    closed: AtomicBool,
    endpoints: [Endpoint; 2],
}

/// One endpoint of an in-process channel. Clones refer to the same endpoint.
#[derive(Clone)]
pub struct LocalBridge {
    channel: Arc<Channel>,
    side: usize,
}

impl LocalBridge {
    /// Create a connected (primary, secondary) pair.
    pub fn pair(origin: Origin, transport: Transport) -> (LocalBridge, LocalBridge) {
        let channel = Arc::new(Channel {
            origin,
            transport,
            closed: AtomicBool::new(false),
            endpoints: [Endpoint::default(), Endpoint::default()],
        });
        (
            LocalBridge {
                channel: channel.clone(),
                side: PRIMARY,
            },
            LocalBridge {
                channel,
                side: SECONDARY,
            },
        )
    }

    pub fn is_closed(&self) -> bool {
        self.channel.closed.load(Ordering::SeqCst)
    }

    /// Deliver the closing signal to both endpoints without tearing the channel down.
    /// May be called repeatedly; every call delivers the signal again.
    pub fn signal_closing(&self) {
        debug!(origin = %self.channel.origin, "Context closing");
        for endpoint in &self.channel.endpoints {
            let handlers = endpoint.closing.lock().clone();
            for handler in handlers {
                handler();
            }
        }
    }

    /// Signal closing, then refuse further sends.
    pub fn close(&self) {
        self.signal_closing();
        self.channel.closed.store(true, Ordering::SeqCst);
    }

    fn peer(&self) -> &Endpoint {
        &self.channel.endpoints[1 - self.side]
    }

    fn own(&self) -> &Endpoint {
        &self.channel.endpoints[self.side]
    }
}

impl ContextBridge for LocalBridge {
    fn origin(&self) -> &Origin {
        &self.channel.origin
    }

    fn send(&self, message: SyncMessage) -> Result<(), BridgeError> {
        if self.is_closed() {
            return Err(BridgeError::Closed(self.channel.origin.to_string()));
        }
        let message = match self.channel.transport {
            Transport::Direct => message,
            Transport::Encoded => decode_message(&encode_message(&message)?)?,
        };
        trace!(
            origin = %self.channel.origin,
            message = message.kind(),
            cycle = message.cycle(),
            "Delivering sync message"
        );
        // Handlers may send from inside the callback, so the lock is released first.
        let handlers = self.peer().receive.lock().clone();
        for handler in handlers {
            handler(message.clone());
        }
        Ok(())
    }

    fn on_receive(&self, handler: ReceiveHandler) {
        self.own().receive.lock().push(handler);
    }

    fn on_closing(&self, handler: ClosingHandler) {
        self.own().closing.lock().push(handler);
    }
}

/// [`ContextHost`] backed by [`LocalBridge`] pairs.
#[derive(Default)]
pub struct LocalHost {
    transport: Transport,
    unavailable: Mutex<HashSet<Origin>>,
    opened: Mutex<HashMap<Origin, LocalBridge>>,
}

impl LocalHost {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            ..Self::default()
        }
    }

    /// Make `open` report no bridge for this origin.
    pub fn mark_unavailable(&self, origin: impl Into<Origin>) {
        self.unavailable.lock().insert(origin.into());
    }

    /// Primary endpoint of the most recently opened context for `origin`.
    pub fn bridge_for(&self, origin: impl Into<Origin>) -> Option<LocalBridge> {
        self.opened.lock().get(&origin.into()).cloned()
    }
}

#[async_trait]
impl ContextHost for LocalHost {
    async fn open(&self, origin: &Origin) -> Result<Option<ContextChannel>, SyncError> {
        if self.unavailable.lock().contains(origin) {
            return Ok(None);
        }
        let (primary, secondary) = LocalBridge::pair(origin.clone(), self.transport);
        self.opened.lock().insert(origin.clone(), primary.clone());
        Ok(Some(ContextChannel {
            primary: Arc::new(primary),
            secondary: Arc::new(secondary),
        }))
    }
}
