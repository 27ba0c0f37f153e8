//! Wire-level protocol types shared across subsystems: peer identifiers,
//! the message kind taxonomy (with relay eligibility), and the bit-exact
//! discovery advertisement codec.

pub mod discovery;

use serde::{Deserialize, Serialize};

/// Stable peer identifier — the Noise/signing static public key.
pub type PeerId = [u8; 32];

/// Enumerated protocol message kinds. Only the relay-eligible kinds may be
/// wrapped by the mesh relay engine; everything else is handshake/control
/// traffic handled point-to-point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    ConnectionReady,
    Identity,
    NoiseHandshake1,
    NoiseHandshake2,
    NoiseHandshake3,
    PairingRequest,
    PairingAccept,
    PairingCode,
    PairingCancel,
    ContactRequest,
    ContactAccept,
    ContactReject,
    Ping,
    Ack,
    TextMessage,
    MeshRelay,
    QueueSync,
    RelayAck,
}

impl MessageKind {
    /// Only these four kinds may be wrapped and forwarded by the mesh
    /// relay engine; everything else is terminated at the receiving peer.
    pub fn is_relay_eligible(&self) -> bool {
        matches!(
            self,
            MessageKind::TextMessage
                | MessageKind::MeshRelay
                | MessageKind::QueueSync
                | MessageKind::RelayAck
        )
    }
}

/// Rejection codes surfaced by the relay engine and routing gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionReason {
    MessageTypeNotEligible,
    NoRecipient,
    TtlExceeded,
    Spam,
    Duplicate,
    LoopDetected,
    SelfOriginated,
    NoRoute,
}
