//! Discovery hints and the bit-exact 6-byte advertisement payload.
//!
//! Feynman: before two phones do the full Noise handshake they exchange a
//! tiny "business card" over the radio advertisement itself — just enough
//! bytes to say "it's me" or "I might be someone you already trust",
//! without spending the radio budget a full identity frame would need.

use crate::error::{Error, Result};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current (and only) wire version of the advertisement payload.
pub const ADVERTISEMENT_VERSION: u8 = 0x01;

/// Total size in bytes of the packed advertisement.
pub const ADVERTISEMENT_LEN: usize = 6;

/// An ephemeral introduction hint: random bytes with an expiry, used to
/// suggest identity before a full handshake without being linkable across
/// sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EphemeralHint {
    pub bytes: [u8; 8],
    pub expires_at: u64,
    pub active: bool,
}

impl EphemeralHint {
    pub fn new(bytes: [u8; 8], ttl_secs: u64) -> Self {
        let now = now_secs();
        Self {
            bytes,
            expires_at: now + ttl_secs,
            active: true,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.active && now_secs() < self.expires_at
    }
}

/// A sensitive-contact hint: `HMAC(shared_seed, permanent_public_key)`
/// truncated to 4 bytes, computed deterministically so a verified contact
/// can recognize you without broadcasting your permanent key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensitiveHint(pub [u8; 4]);

impl SensitiveHint {
    pub fn derive(shared_seed: &[u8], permanent_public_key: &[u8; 32]) -> Self {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        let mut mac = <Hmac<Sha256>>::new_from_slice(shared_seed)
            .expect("HMAC accepts keys of any length");
        mac.update(permanent_public_key);
        let tag = mac.finalize().into_bytes();
        let mut out = [0u8; 4];
        out.copy_from_slice(&tag[..4]);
        SensitiveHint(out)
    }
}

/// The combination of hints packed into one radio advertisement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryAdvertisement {
    pub intro_hint: Option<[u8; 3]>,
    pub sensitive_hint: Option<[u8; 2]>,
}

impl DiscoveryAdvertisement {
    pub fn from_hints(ephemeral: Option<&EphemeralHint>, sensitive: Option<&SensitiveHint>) -> Self {
        let intro_hint = ephemeral
            .filter(|h| h.is_usable())
            .map(|h| [h.bytes[0], h.bytes[1], h.bytes[2]])
            .filter(|b| *b != [0u8; 3]);
        let sensitive_hint = sensitive
            .map(|h| [h.0[0], h.0[1]])
            .filter(|b| *b != [0u8; 2]);
        Self {
            intro_hint,
            sensitive_hint,
        }
    }

    /// Pack into the fixed 6-byte wire form:
    /// `[version(1) | intro_hint_truncated(3) | sensitive_hint_truncated(2)]`.
    /// All-zero sub-fields mean "absent".
    pub fn pack(&self) -> [u8; ADVERTISEMENT_LEN] {
        let mut out = [0u8; ADVERTISEMENT_LEN];
        out[0] = ADVERTISEMENT_VERSION;
        if let Some(intro) = self.intro_hint {
            out[1..4].copy_from_slice(&intro);
        }
        if let Some(sensitive) = self.sensitive_hint {
            out[4..6].copy_from_slice(&sensitive);
        }
        out
    }

    /// Parse a wire advertisement. Any length other than 6 bytes, or any
    /// version other than `0x01`, rejects the frame.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != ADVERTISEMENT_LEN {
            return Err(Error::ProtocolError(format!(
                "discovery advertisement must be {} bytes, got {}",
                ADVERTISEMENT_LEN,
                data.len()
            )));
        }
        if data[0] != ADVERTISEMENT_VERSION {
            return Err(Error::ProtocolError(format!(
                "unsupported discovery advertisement version {}",
                data[0]
            )));
        }
        let intro: [u8; 3] = data[1..4].try_into().unwrap();
        let sensitive: [u8; 2] = data[4..6].try_into().unwrap();
        Ok(Self {
            intro_hint: (intro != [0u8; 3]).then_some(intro),
            sensitive_hint: (sensitive != [0u8; 2]).then_some(sensitive),
        })
    }

    pub fn has_intro_hint(&self) -> bool {
        self.intro_hint.is_some()
    }

    pub fn has_sensitive_hint(&self) -> bool {
        self.sensitive_hint.is_some()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_both_hints() {
        let ephemeral = EphemeralHint::new([1, 2, 3, 4, 5, 6, 7, 8], 60);
        let sensitive = SensitiveHint::derive(b"shared-seed", &[9u8; 32]);

        let advert = DiscoveryAdvertisement::from_hints(Some(&ephemeral), Some(&sensitive));
        let packed = advert.pack();
        assert_eq!(packed.len(), ADVERTISEMENT_LEN);
        assert_eq!(packed[0], ADVERTISEMENT_VERSION);

        let parsed = DiscoveryAdvertisement::parse(&packed).unwrap();
        assert!(parsed.has_intro_hint());
        assert!(parsed.has_sensitive_hint());
        assert_eq!(parsed.intro_hint.unwrap(), [1, 2, 3]);
        assert_eq!(parsed.sensitive_hint.unwrap(), [sensitive.0[0], sensitive.0[1]]);
    }

    #[test]
    fn absent_hints_pack_to_all_zero_subfields() {
        let advert = DiscoveryAdvertisement::default();
        let packed = advert.pack();
        assert_eq!(&packed[1..4], &[0, 0, 0]);
        assert_eq!(&packed[4..6], &[0, 0]);

        let parsed = DiscoveryAdvertisement::parse(&packed).unwrap();
        assert!(!parsed.has_intro_hint());
        assert!(!parsed.has_sensitive_hint());
    }

    #[test]
    fn expired_ephemeral_hint_is_unusable() {
        let mut hint = EphemeralHint::new([1; 8], 60);
        hint.expires_at = 0;
        assert!(!hint.is_usable());

        let advert = DiscoveryAdvertisement::from_hints(Some(&hint), None);
        assert!(!advert.has_intro_hint());
    }

    #[test]
    fn wrong_length_rejects() {
        assert!(DiscoveryAdvertisement::parse(&[0x01, 0, 0, 0, 0]).is_err());
        assert!(DiscoveryAdvertisement::parse(&[0x01; 7]).is_err());
    }

    #[test]
    fn wrong_version_rejects() {
        let bytes = [0x02, 1, 2, 3, 4, 5];
        assert!(DiscoveryAdvertisement::parse(&bytes).is_err());
    }
}
