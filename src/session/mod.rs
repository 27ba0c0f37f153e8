//! Noise Session Manager: per-peer established transport sessions plus
//! the handshake driver factory.
//!
//! This module owns only the *established* side of a session. Driving
//! the handshake messages through their phases is the handshake
//! coordinator's job (`crate::handshake`); once it finishes a handshake
//! it calls [`SessionManager::install`] to hand the resulting transport
//! over to this manager, which is what `encrypt`/`decrypt` read from.

pub mod noise;

use crate::protocol::PeerId;
use noise::{HandshakeDriver, NoiseRole, NoiseTransport};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

enum PeerSession {
    Established {
        transport: NoiseTransport,
        established_at: u64,
    },
    Expired,
}

/// Coordinates Noise_XX sessions for every known peer.
pub struct SessionManager {
    sessions: RwLock<HashMap<PeerId, PeerSession>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Begin a handshake with `peer_id` in the given role. Returns the
    /// driver the handshake coordinator feeds wire frames through; this
    /// manager doesn't see the peer again until [`Self::install`] is
    /// called with the finished result.
    pub fn initiate(
        &self,
        role: NoiseRole,
        local_static_secret: &[u8; 32],
    ) -> crate::error::Result<HandshakeDriver> {
        match role {
            NoiseRole::Initiator => HandshakeDriver::new_initiator(local_static_secret),
            NoiseRole::Responder => HandshakeDriver::new_responder(local_static_secret),
        }
    }

    /// Install a freshly completed handshake's transport as the
    /// established session for `peer_id`, replacing anything prior.
    pub async fn install(&self, peer_id: PeerId, transport: NoiseTransport) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            peer_id,
            PeerSession::Established {
                transport,
                established_at: now_secs(),
            },
        );
    }

    /// Encrypt `plaintext` for `peer_id`. Returns `None` if there is no
    /// established (non-expired) session.
    pub async fn encrypt(&self, peer_id: &PeerId, plaintext: &[u8]) -> Option<Vec<u8>> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(peer_id) {
            Some(PeerSession::Established { transport, .. }) => transport.encrypt(plaintext).ok(),
            _ => None,
        }
    }

    /// Decrypt `ciphertext` from `peer_id`. Returns `None` on unknown
    /// peer, no session, expired session, tag mismatch, or replay.
    pub async fn decrypt(&self, peer_id: &PeerId, ciphertext: &[u8]) -> Option<Vec<u8>> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(peer_id) {
            Some(PeerSession::Established { transport, .. }) => transport.decrypt(ciphertext),
            _ => None,
        }
    }

    pub async fn has_established(&self, peer_id: &PeerId) -> bool {
        matches!(
            self.sessions.read().await.get(peer_id),
            Some(PeerSession::Established { .. })
        )
    }

    /// Mark a session expired in place; it refuses encrypt/decrypt until
    /// replaced by a fresh [`Self::install`] (a rekey).
    pub async fn expire(&self, peer_id: &PeerId) {
        if let Some(session) = self.sessions.write().await.get_mut(peer_id) {
            *session = PeerSession::Expired;
        }
    }

    pub async fn clear(&self, peer_id: &PeerId) {
        self.sessions.write().await.remove(peer_id);
    }

    pub async fn clear_all(&self) {
        self.sessions.write().await.clear();
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
