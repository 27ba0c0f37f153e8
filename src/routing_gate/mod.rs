//! Message Routing Gate: the small inbound filter that discards
//! own-echoed and mis-addressed frames before anything downstream (the
//! relay engine, the session manager) sees them.
//!
//! Grounded on `mesh/service.rs`'s inbound packet dispatch, which
//! performs the same self-echo/addressee checks before routing a packet
//! to a handler.

use crate::protocol::PeerId;

/// The minimal shape of an inbound frame the gate needs to decide on.
/// `intended_recipient` is `None` for frames with no addressee field at
/// all (a direct encrypted message addressed purely by transport-level
/// peer connection, not by an embedded recipient key).
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub sender_public_key: PeerId,
    pub intended_recipient: Option<PeerId>,
    pub is_encrypted_direct_message: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Step 3: an encrypted direct message with no named recipient,
    /// accepted and treated as addressed to us by the connection itself.
    AcceptDirect,
    /// Step 4: every other frame that clears steps 1-2 is delivered
    /// upward unchanged (this covers frames explicitly addressed to us
    /// as well as broadcast/gossip frames).
    Accept,
    DropSelfEcho,
    DropMisaddressed,
}

pub struct RoutingGate {
    self_public_key: PeerId,
}

impl RoutingGate {
    pub fn new(self_public_key: PeerId) -> Self {
        Self { self_public_key }
    }

    /// 1. Drop frames we apparently sent ourselves.
    /// 2. Drop frames naming a recipient that isn't us.
    /// 3. Accept direct encrypted messages with no named recipient.
    /// 4. Otherwise deliver upward.
    pub fn evaluate(&self, frame: &InboundFrame) -> GateDecision {
        if frame.sender_public_key == self.self_public_key {
            return GateDecision::DropSelfEcho;
        }

        match frame.intended_recipient {
            Some(recipient) if recipient != self.self_public_key => GateDecision::DropMisaddressed,
            None if frame.is_encrypted_direct_message => GateDecision::AcceptDirect,
            _ => GateDecision::Accept,
        }
    }
}
