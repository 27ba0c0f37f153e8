//! Low-level Noise_XX handshake driver and post-handshake AEAD transport.
//!
//! `snow` drives the three handshake messages only. Once the handshake
//! finishes we derive two directional keys from the handshake transcript
//! hash ourselves and hand-roll the transport envelope, rather than
//! handing the session to `snow`'s own transport mode: `snow` doesn't
//! prepend the nonce to the ciphertext the way the fixed wire layout
//! here requires, and its replay check is strict monotonic rather than
//! window-based.

use crate::error::{Error, Result};
use chacha20poly1305::{AeadInPlace, ChaCha20Poly1305, Key, KeyInit, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;
use snow::{Builder, HandshakeState};

const NOISE_PARAMS: &str = "Noise_XX_25519_ChaChaPoly_SHA256";
const SEND_INFO: &[u8] = b"meshtalk-noise-send";
const RECV_INFO: &[u8] = b"meshtalk-noise-recv";

/// Trailing replay window, WireGuard-style: a highest accepted counter
/// plus a bitmap of the 64 counters below it. Accepts any nonce above
/// the floor that hasn't already been marked seen; rejects everything
/// at or below the floor that falls outside the bitmap, and anything
/// already marked.
#[derive(Debug, Clone, Default)]
pub struct ReplayWindow {
    highest: Option<u64>,
    bitmap: u64,
}

impl ReplayWindow {
    /// Returns `true` and marks `nonce` seen if it is acceptable;
    /// `false` (no mutation) if it's a replay or below the window floor.
    pub fn check_and_mark(&mut self, nonce: u64) -> bool {
        match self.highest {
            None => {
                self.highest = Some(nonce);
                self.bitmap = 1;
                true
            }
            Some(highest) if nonce > highest => {
                let shift = nonce - highest;
                self.bitmap = if shift >= 64 { 1 } else { (self.bitmap << shift) | 1 };
                self.highest = Some(nonce);
                true
            }
            Some(highest) => {
                let distance = highest - nonce;
                if distance >= 64 {
                    return false;
                }
                let mask = 1u64 << distance;
                if self.bitmap & mask != 0 {
                    false
                } else {
                    self.bitmap |= mask;
                    true
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseRole {
    Initiator,
    Responder,
}

struct SendKey {
    key: [u8; 32],
    counter: u64,
}

struct RecvKey {
    key: [u8; 32],
    window: ReplayWindow,
}

/// An established post-handshake session: directional keys plus the
/// sending nonce counter and receiving replay window.
pub struct NoiseTransport {
    send: SendKey,
    recv: RecvKey,
    pub remote_static: [u8; 32],
}

impl NoiseTransport {
    fn from_handshake_hash(hash: &[u8], role: NoiseRole, remote_static: [u8; 32]) -> Self {
        let hk = Hkdf::<Sha256>::new(None, hash);
        let (initiator_info, responder_info) = (SEND_INFO, RECV_INFO);
        let (send_info, recv_info) = match role {
            NoiseRole::Initiator => (initiator_info, responder_info),
            NoiseRole::Responder => (responder_info, initiator_info),
        };

        let mut send_key = [0u8; 32];
        hk.expand(send_info, &mut send_key)
            .expect("32 bytes is a valid HKDF output length for SHA-256");
        let mut recv_key = [0u8; 32];
        hk.expand(recv_info, &mut recv_key)
            .expect("32 bytes is a valid HKDF output length for SHA-256");

        Self {
            send: SendKey {
                key: send_key,
                counter: 0,
            },
            recv: RecvKey {
                key: recv_key,
                window: ReplayWindow::default(),
            },
            remote_static,
        }
    }

    /// Encrypt `plaintext`, returning `nonce(12) || ciphertext || tag(16)`.
    /// The send nonce is a strictly monotonic 64-bit counter.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.send.counter = self
            .send
            .counter
            .checked_add(1)
            .ok_or_else(|| Error::CryptoError("send nonce counter exhausted".into()))?;

        let mut nonce_bytes = [0u8; 12];
        nonce_bytes[4..].copy_from_slice(&self.send.counter.to_be_bytes());

        let key = Key::from_slice(&self.send.key);
        let cipher = ChaCha20Poly1305::new(key);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(nonce, b"", &mut buffer)
            .map_err(|e| Error::CryptoError(format!("encrypt failed: {e}")))?;

        let mut out = Vec::with_capacity(12 + buffer.len() + 16);
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&buffer);
        out.extend_from_slice(&tag);
        Ok(out)
    }

    /// Decrypt a `nonce(12) || ciphertext || tag(16)` frame. Returns
    /// `None` (rather than an error) on tag mismatch or replay, matching
    /// the "fail silently, don't distinguish the attacker's probe"
    /// contract expected of the transport layer.
    pub fn decrypt(&mut self, frame: &[u8]) -> Option<Vec<u8>> {
        if frame.len() < 28 {
            return None;
        }
        let nonce_bytes = &frame[..12];
        let tag_bytes = &frame[frame.len() - 16..];
        let ciphertext = &frame[12..frame.len() - 16];

        let nonce_counter = u64::from_be_bytes(nonce_bytes[4..].try_into().ok()?);
        if nonce_bytes[..4] != [0u8; 4] {
            return None;
        }

        let key = Key::from_slice(&self.recv.key);
        let cipher = ChaCha20Poly1305::new(key);
        let nonce = Nonce::from_slice(nonce_bytes);

        let mut buffer = ciphertext.to_vec();
        cipher
            .decrypt_in_place_detached(nonce, b"", &mut buffer, tag_bytes.into())
            .ok()?;

        if !self.recv.window.check_and_mark(nonce_counter) {
            return None;
        }

        Some(buffer)
    }
}

/// Drives the three Noise_XX handshake messages for one peer. Owned by
/// the handshake coordinator, which feeds it wire frames in phase order
/// and, on completion, turns it into an established [`NoiseTransport`].
pub struct HandshakeDriver {
    role: NoiseRole,
    state: Box<HandshakeState>,
}

impl HandshakeDriver {
    pub fn new_initiator(local_static_secret: &[u8; 32]) -> Result<Self> {
        let params = NOISE_PARAMS.parse().map_err(Error::Noise)?;
        let state = Builder::new(params)
            .local_private_key(local_static_secret)
            .build_initiator()
            .map_err(Error::Noise)?;
        Ok(Self {
            role: NoiseRole::Initiator,
            state: Box::new(state),
        })
    }

    pub fn new_responder(local_static_secret: &[u8; 32]) -> Result<Self> {
        let params = NOISE_PARAMS.parse().map_err(Error::Noise)?;
        let state = Builder::new(params)
            .local_private_key(local_static_secret)
            .build_responder()
            .map_err(Error::Noise)?;
        Ok(Self {
            role: NoiseRole::Responder,
            state: Box::new(state),
        })
    }

    pub fn write_message(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; 4096];
        let len = self
            .state
            .write_message(payload, &mut buffer)
            .map_err(Error::Noise)?;
        buffer.truncate(len);
        Ok(buffer)
    }

    pub fn read_message(&mut self, message: &[u8]) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; 4096];
        let len = self
            .state
            .read_message(message, &mut buffer)
            .map_err(Error::Noise)?;
        buffer.truncate(len);
        Ok(buffer)
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_handshake_finished()
    }

    /// Consume the finished handshake state, deriving the transport
    /// session and returning it alongside the peer's static public key.
    pub fn into_transport(self) -> Result<(NoiseTransport, [u8; 32])> {
        if !self.state.is_handshake_finished() {
            return Err(Error::ProtocolError(
                "handshake not finished, cannot derive transport keys".into(),
            ));
        }
        let hash = self.state.get_handshake_hash().to_vec();
        let remote_static: [u8; 32] = self
            .state
            .get_remote_static()
            .ok_or_else(|| Error::ProtocolError("responder has no remote static key".into()))?
            .try_into()
            .map_err(|_| Error::ProtocolError("remote static key was not 32 bytes".into()))?;

        Ok((
            NoiseTransport::from_handshake_hash(&hash, self.role, remote_static),
            remote_static,
        ))
    }
}
