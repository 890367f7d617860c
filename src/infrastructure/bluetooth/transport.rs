//! Transport Abstraction
//!
//! The session never talks to a BLE stack directly. It drives a
//! [`BleTransport`] and receives link-loss notifications as [`LinkEvent`]
//! messages instead of callbacks into its own state.

use crate::domain::models::DeviceHandle;
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Messages sent from a transport to the session that owns the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The link identified by `generation` dropped
    Lost { generation: u64 },
}

/// Handed to [`BleTransport::connect`] so the transport can report that the
/// connection it produced has gone away.
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    generation: u64,
    sender: mpsc::UnboundedSender<LinkEvent>,
}

impl LinkMonitor {
    pub fn new(generation: u64, sender: mpsc::UnboundedSender<LinkEvent>) -> Self {
        Self { generation, sender }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report link loss. Returns false once the session is gone.
    pub fn link_lost(&self) -> bool {
        self.sender
            .send(LinkEvent::Lost {
                generation: self.generation,
            })
            .is_ok()
    }

    /// True when the receiving session has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Platform BLE access used by the session.
///
/// Implementations own retry/backoff for connection establishment and must
/// call [`LinkMonitor::link_lost`] when an established link drops.
#[async_trait]
pub trait BleTransport: Send + Sync + 'static {
    /// A located peripheral, as produced by discovery
    type Device: AsRef<DeviceHandle> + Clone + fmt::Debug + Send + Sync + 'static;
    /// A live GATT connection
    type Connection: Send + Sync + 'static;

    async fn connect(
        &self,
        device: &Self::Device,
        name: &str,
        monitor: LinkMonitor,
    ) -> Result<Self::Connection>;

    async fn read_characteristic(
        &self,
        connection: &Self::Connection,
        characteristic: Uuid,
    ) -> Result<Vec<u8>>;

    /// Close a connection the session no longer wants.
    async fn disconnect(&self, connection: &Self::Connection) -> Result<()>;
}
