//! meshtalk-core: a peer-to-peer, end-to-end-encrypted mobile messaging
//! core that delivers messages over an intermittently-connected mesh of
//! short-range radio links.
//!
//! The crate composes: pairing/handshake ([`session`], [`handshake`]), an
//! offline outbound queue with priority and retry ([`queue`]), multi-hop
//! relay with routing-path tracking and ACK propagation ([`relay`]),
//! gossip-based queue reconciliation ([`gossip`]), and the supporting
//! identity, contact, spam, and configuration layers around them.

pub mod config;
pub mod contact;
pub mod error;
pub mod gossip;
pub mod handshake;
pub mod identity;
pub mod protocol;
pub mod queue;
pub mod relay;
pub mod routing_gate;
pub mod session;
pub mod spam;
pub mod store;
pub mod transport;

pub use error::{Error, Result};
