//! Context bridge interfaces
//!
//! A bridge is one endpoint of the messaging channel between the primary context and a
//! secondary context. The automation layer that actually creates secondary contexts plugs in
//! through [`ContextHost`]; this crate only consumes these traits. [`local`] provides an
//! in-process implementation.

pub mod local;

use crate::error::{BridgeError, SyncError};
use crate::snapshot::SyncMessage;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub type ReceiveHandler = Arc<dyn Fn(SyncMessage) + Send + Sync>;
pub type ClosingHandler = Arc<dyn Fn() + Send + Sync>;

/// Origin a secondary context runs as, e.g. `foobar.com`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Origin(String);

impl Origin {
    /// Origins are matched case-insensitively.
    pub fn new(origin: impl AsRef<str>) -> Self {
        Origin(origin.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Origin {
    fn from(origin: &str) -> Self {
        Origin::new(origin)
    }
}

impl From<String> for Origin {
    fn from(origin: String) -> Self {
        Origin::new(origin)
    }
}

/// One endpoint of a primary/secondary channel.
///
/// Implementations deliver messages in send order, deliver each sent message exactly once,
/// and deliver the closing signal at least once.
pub trait ContextBridge: Send + Sync {
    fn origin(&self) -> &Origin;

    fn send(&self, message: SyncMessage) -> Result<(), BridgeError>;

    fn on_receive(&self, handler: ReceiveHandler);

    fn on_closing(&self, handler: ClosingHandler);
}

/// Both endpoints of a freshly opened secondary context.
pub struct ContextChannel {
    pub primary: Arc<dyn ContextBridge>,
    pub secondary: Arc<dyn ContextBridge>,
}

/// Creates secondary contexts. `Ok(None)` means no bridge could be established.
#[async_trait]
pub trait ContextHost: Send + Sync {
    async fn open(&self, origin: &Origin) -> Result<Option<ContextChannel>, SyncError>;
}
