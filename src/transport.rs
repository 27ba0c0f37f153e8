//! Transport boundary: the core treats the radio link as an opaque
//! byte-duplex channel with peer identifiers and connect/disconnect
//! events. Framing (length-delimiting) is the transport's job, not
//! ours.
//!
//! Grounded on `mesh/service.rs`'s `MeshTransport`-shaped callbacks,
//! narrowed to the four operations the core actually consumes.

use crate::error::Result;
use crate::protocol::PeerId;
use async_trait::async_trait;

/// Whatever the transport hands back once a send attempt resolves: did
/// the peer's link layer accept delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Acknowledged,
    Failed,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Hand a length-delimited frame to the transport for `peer_id`.
    /// Resolves once the transport layer itself confirms (or gives up
    /// on) delivery; this is not the same as an application-level ACK.
    async fn send(&self, peer_id: PeerId, bytes: Vec<u8>) -> Result<SendOutcome>;
}

/// Callbacks the transport drives into the core. A real mobile runtime
/// wires these to its BLE scan/GATT event loop; tests wire them to a
/// harness that feeds scripted frames.
#[async_trait]
pub trait TransportEvents: Send + Sync {
    async fn on_receive(&self, peer_id: PeerId, bytes: Vec<u8>);
    async fn on_peer_connected(&self, peer_id: PeerId);
    async fn on_peer_disconnected(&self, peer_id: PeerId);
}
