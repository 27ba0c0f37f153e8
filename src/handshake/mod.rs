//! Handshake Coordinator: drives the three-message Noise_XX exchange for
//! each peer through its phases and installs the resulting transport
//! session into the [`SessionManager`] on success.
//!
//! Grounded on `mesh/service.rs`'s actor shape (an event broadcast
//! channel callers subscribe to) and `crypto/noise.rs`'s handshake
//! driving style (`read_message`/`write_message` pairs, remote static
//! key recovered from the finished driver).

use crate::error::{Error, Result};
use crate::protocol::PeerId;
use crate::session::noise::{HandshakeDriver, NoiseRole};
use crate::session::SessionManager;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Sent1,
    Sent2,
    Established,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeFailureReason {
    HandshakeMismatch,
}

#[derive(Debug, Clone)]
pub enum HandshakeEvent {
    Success {
        peer_id: PeerId,
        display_name: String,
        noise_public_key: [u8; 32],
    },
    Failed {
        peer_id: PeerId,
        reason: HandshakeFailureReason,
    },
}

/// The frame (if any) this step produced for the transport to send, plus
/// whether this step completed the handshake.
pub struct HandshakeStep {
    pub frame: Option<Vec<u8>>,
    pub established: bool,
}

struct PendingHandshake {
    role: NoiseRole,
    phase: Phase,
    driver: HandshakeDriver,
    peer_display_name: Option<String>,
}

pub struct HandshakeCoordinator {
    local_static_secret: [u8; 32],
    local_display_name: String,
    sessions: Arc<SessionManager>,
    pending: RwLock<HashMap<PeerId, PendingHandshake>>,
    events: broadcast::Sender<HandshakeEvent>,
}

impl HandshakeCoordinator {
    pub fn new(
        local_static_secret: [u8; 32],
        local_display_name: impl Into<String>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            local_static_secret,
            local_display_name: local_display_name.into(),
            sessions,
            pending: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HandshakeEvent> {
        self.events.subscribe()
    }

    /// Begin a handshake as initiator. Returns the first wire frame to
    /// send to `peer_id`.
    pub async fn start(&self, peer_id: PeerId) -> Result<Vec<u8>> {
        let mut driver = HandshakeDriver::new_initiator(&self.local_static_secret)?;
        let frame = driver.write_message(self.local_display_name.as_bytes())?;

        self.pending.write().await.insert(
            peer_id,
            PendingHandshake {
                role: NoiseRole::Initiator,
                phase: Phase::Sent1,
                driver,
                peer_display_name: None,
            },
        );
        Ok(frame)
    }

    /// Feed a received wire frame into the handshake for `peer_id`. A
    /// peer with no in-flight handshake is treated as a fresh responder
    /// start. Frames that arrive out of phase order drop the session to
    /// idle and emit `Failed { HandshakeMismatch }`.
    pub async fn on_received(&self, peer_id: PeerId, frame: &[u8]) -> Result<HandshakeStep> {
        let mut pending = self.pending.write().await;

        if !pending.contains_key(&peer_id) {
            let mut driver = HandshakeDriver::new_responder(&self.local_static_secret)?;
            let payload = driver.read_message(frame)?;
            let peer_display_name = String::from_utf8_lossy(&payload).into_owned();
            let reply = driver.write_message(self.local_display_name.as_bytes())?;

            pending.insert(
                peer_id,
                PendingHandshake {
                    role: NoiseRole::Responder,
                    phase: Phase::Sent2,
                    driver,
                    peer_display_name: Some(peer_display_name),
                },
            );
            return Ok(HandshakeStep {
                frame: Some(reply),
                established: false,
            });
        }

        let entry = pending.get_mut(&peer_id).expect("checked contains_key above");

        let expected_next = match (entry.role, entry.phase) {
            (NoiseRole::Initiator, Phase::Sent1) => true,
            (NoiseRole::Responder, Phase::Sent2) => true,
            _ => false,
        };
        if !expected_next {
            pending.remove(&peer_id);
            warn!(?peer_id, "handshake frame arrived out of phase order");
            let _ = self.events.send(HandshakeEvent::Failed {
                peer_id,
                reason: HandshakeFailureReason::HandshakeMismatch,
            });
            return Ok(HandshakeStep {
                frame: None,
                established: false,
            });
        }

        match entry.role {
            NoiseRole::Initiator => {
                let payload = entry.driver.read_message(frame)?;
                let peer_display_name = String::from_utf8_lossy(&payload).into_owned();
                let reply = entry.driver.write_message(&[])?;

                let mut entry = pending.remove(&peer_id).expect("entry present");
                let (transport, remote_static) = entry.driver.into_transport()?;
                self.sessions.install(peer_id, transport).await;
                entry.phase = Phase::Established;
                debug!(?peer_id, "handshake established (initiator)");

                let _ = self.events.send(HandshakeEvent::Success {
                    peer_id,
                    display_name: peer_display_name,
                    noise_public_key: remote_static,
                });

                Ok(HandshakeStep {
                    frame: Some(reply),
                    established: true,
                })
            }
            NoiseRole::Responder => {
                entry.driver.read_message(frame)?;
                let mut entry = pending.remove(&peer_id).expect("entry present");
                let (transport, remote_static) = entry.driver.into_transport()?;
                self.sessions.install(peer_id, transport).await;
                entry.phase = Phase::Established;
                debug!(?peer_id, "handshake established (responder)");

                let _ = self.events.send(HandshakeEvent::Success {
                    peer_id,
                    display_name: entry.peer_display_name.clone().unwrap_or_default(),
                    noise_public_key: remote_static,
                });

                Ok(HandshakeStep {
                    frame: None,
                    established: true,
                })
            }
        }
    }

    /// Abort any in-flight handshake with `peer_id` without firing
    /// success or failure events.
    pub async fn on_peer_disconnected(&self, peer_id: &PeerId) {
        self.pending.write().await.remove(peer_id);
    }

    pub async fn is_in_flight(&self, peer_id: &PeerId) -> bool {
        self.pending.read().await.contains_key(peer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(byte: u8) -> [u8; 32] {
        [byte; 32]
    }

    #[tokio::test]
    async fn full_handshake_reaches_established_both_sides() {
        let alice_sessions = Arc::new(SessionManager::new());
        let bob_sessions = Arc::new(SessionManager::new());
        let alice = HandshakeCoordinator::new(secret(1), "alice", alice_sessions.clone());
        let bob = HandshakeCoordinator::new(secret(2), "bob", bob_sessions.clone());

        let msg1 = alice.start([0u8; 32]).await.unwrap();
        let step2 = bob.on_received([0u8; 32], &msg1).await.unwrap();
        assert!(!step2.established);
        let msg2 = step2.frame.unwrap();

        let step3 = alice.on_received([0u8; 32], &msg2).await.unwrap();
        assert!(step3.established);
        let msg3 = step3.frame.unwrap();

        let step4 = bob.on_received([0u8; 32], &msg3).await.unwrap();
        assert!(step4.established);
        assert!(step4.frame.is_none());
    }

    #[tokio::test]
    async fn out_of_phase_frame_drops_to_idle_and_signals_mismatch() {
        let bob_sessions = Arc::new(SessionManager::new());
        let bob = HandshakeCoordinator::new(secret(2), "bob", bob_sessions);
        let mut events = bob.subscribe();
        let peer_id = [5u8; 32];

        // Manufacture a state no legitimate exchange reaches: a Responder
        // entry sitting in Sent1, which is only ever an Initiator phase.
        {
            let driver = HandshakeDriver::new_responder(&secret(9)).unwrap();
            bob.pending.write().await.insert(
                peer_id,
                PendingHandshake {
                    role: NoiseRole::Responder,
                    phase: Phase::Sent1,
                    driver,
                    peer_display_name: None,
                },
            );
        }

        let msg1 = {
            let alice_sessions = Arc::new(SessionManager::new());
            let alice = HandshakeCoordinator::new(secret(1), "alice", alice_sessions);
            alice.start(peer_id).await.unwrap()
        };

        let step = bob.on_received(peer_id, &msg1).await.unwrap();
        assert!(!step.established);
        assert!(step.frame.is_none());
        assert!(!bob.is_in_flight(&peer_id).await);

        let event = events.try_recv().unwrap();
        assert!(matches!(
            event,
            HandshakeEvent::Failed {
                reason: HandshakeFailureReason::HandshakeMismatch,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn disconnect_aborts_without_success_event() {
        let alice_sessions = Arc::new(SessionManager::new());
        let alice = HandshakeCoordinator::new(secret(1), "alice", alice_sessions);
        let mut events = alice.subscribe();

        alice.start([7u8; 32]).await.unwrap();
        assert!(alice.is_in_flight(&[7u8; 32]).await);

        alice.on_peer_disconnected(&[7u8; 32]).await;
        assert!(!alice.is_in_flight(&[7u8; 32]).await);
        assert!(events.try_recv().is_err());
    }
}
