//! Identity & Keys: long-term signing identity, the Noise static
//! keypair, and the discovery-hint derivation hooks that sit on top of
//! them.
//!
//! The Noise static key is real X25519 scalar multiplication via
//! `x25519-dalek`, split from an independent Ed25519 signing identity.

use crate::protocol::{discovery::EphemeralHint, discovery::SensitiveHint, PeerId};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

/// The Noise static keypair: an X25519 Diffie-Hellman keypair used as
/// the long-term identity the handshake authenticates against.
#[derive(Clone)]
pub struct NoiseKeyPair {
    secret: StaticSecret,
    public: X25519PublicKey,
}

impl NoiseKeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn from_bytes(private_bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(private_bytes);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    pub fn private_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }
}

/// The long-term Ed25519 signing identity, independent of the Noise
/// static key: signatures authenticate control-plane claims (contact
/// requests, display name changes) outside any single Noise session.
#[derive(Clone)]
pub struct SigningKeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl SigningKeyPair {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    pub fn from_bytes(private_bytes: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&private_bytes);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &Signature) -> bool {
        match VerifyingKey::from_bytes(public_key) {
            Ok(key) => key.verify(message, signature).is_ok(),
            Err(_) => false,
        }
    }
}

/// Combined long-term identity: the Noise static key used as
/// `PeerId`, plus the independent signing key.
#[derive(Clone)]
pub struct Identity {
    pub noise_keypair: NoiseKeyPair,
    pub signing_keypair: SigningKeyPair,
}

impl Identity {
    pub fn generate() -> Self {
        Self {
            noise_keypair: NoiseKeyPair::generate(),
            signing_keypair: SigningKeyPair::generate(),
        }
    }

    /// The stable peer identifier: the Noise static public key.
    pub fn peer_id(&self) -> PeerId {
        self.noise_keypair.public_bytes()
    }

    /// An ephemeral introduction hint, usable immediately and valid for
    /// `ttl_secs`.
    pub fn new_ephemeral_hint(&self, ttl_secs: u64) -> EphemeralHint {
        let mut bytes = [0u8; 8];
        OsRng.fill_bytes(&mut bytes);
        EphemeralHint::new(bytes, ttl_secs)
    }

    /// A sensitive-contact hint a verified contact can recognize without
    /// us broadcasting the permanent key in the clear.
    pub fn sensitive_hint_for(&self, shared_seed: &[u8]) -> SensitiveHint {
        SensitiveHint::derive(shared_seed, &self.peer_id())
    }
}
