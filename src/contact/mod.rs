//! Contact Store: durable mapping from ephemeral peer id to permanent
//! key, display name, and Noise session state.
//!
//! Grounded on `database/repository.rs`'s per-entity repository pattern
//! (a thin typed wrapper over the generic `Store` trait) and
//! `database/models.rs`'s row shape for trust/security enums.

use crate::error::{Error, Result};
use crate::protocol::PeerId;
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const TABLE: &str = "contacts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustStatus {
    Unknown,
    Verified,
    Revoked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseSessionState {
    None,
    Handshaking,
    Established,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub ephemeral_id: String,
    pub permanent_public_key: PeerId,
    pub display_name: String,
    pub trust_status: TrustStatus,
    pub security_level: SecurityLevel,
    pub first_seen: u64,
    pub last_seen: u64,
    pub noise_public_key: Option<PeerId>,
    pub noise_session_state: NoiseSessionState,
    pub last_handshake_time: Option<u64>,
}

impl Contact {
    pub fn new(ephemeral_id: String, permanent_public_key: PeerId, display_name: String, now: u64) -> Self {
        Self {
            ephemeral_id,
            permanent_public_key,
            display_name,
            trust_status: TrustStatus::Unknown,
            security_level: SecurityLevel::Low,
            first_seen: now,
            last_seen: now,
            noise_public_key: None,
            noise_session_state: NoiseSessionState::None,
            last_handshake_time: None,
        }
    }

    /// `noise_public_key` is non-empty iff the session has reached
    /// `established` or `expired`.
    fn invariant_holds(&self) -> bool {
        let has_key = self.noise_public_key.is_some();
        let in_keyed_state = matches!(
            self.noise_session_state,
            NoiseSessionState::Established | NoiseSessionState::Expired
        );
        has_key == in_keyed_state
    }
}

/// Typed repository over the generic `Store` trait, scoped to a single
/// logical table — a thin per-entity wrapper over the generic backend.
pub struct ContactStore {
    store: Arc<dyn Store>,
}

impl ContactStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Insert or overwrite a contact row (at most one row per
    /// `ephemeral_id` — a second `upsert` with the same id replaces it).
    pub async fn upsert(&self, contact: &Contact) -> Result<()> {
        if !contact.invariant_holds() {
            return Err(Error::ProtocolError(
                "noise_public_key must be present iff session state is established or expired".into(),
            ));
        }
        let bytes = bincode::serialize(contact)?;
        self.store.put(TABLE, &contact.ephemeral_id, bytes).await
    }

    pub async fn get(&self, ephemeral_id: &str) -> Result<Option<Contact>> {
        match self.store.get(TABLE, ephemeral_id).await? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn remove(&self, ephemeral_id: &str) -> Result<()> {
        self.store.delete(TABLE, ephemeral_id).await
    }

    pub async fn list(&self) -> Result<Vec<Contact>> {
        let rows = self.store.list(TABLE).await?;
        rows.into_iter()
            .map(|(_, bytes)| Ok(bincode::deserialize(&bytes)?))
            .collect()
    }

    /// Mark the contact's Noise session established, recording the
    /// peer's static public key — the post-success obligation the
    /// handshake coordinator relies on (D).
    pub async fn mark_established(
        &self,
        ephemeral_id: &str,
        noise_public_key: PeerId,
        now: u64,
    ) -> Result<()> {
        let mut contact = self
            .get(ephemeral_id)
            .await?
            .ok_or_else(|| Error::ProtocolError(format!("unknown contact {ephemeral_id}")))?;
        contact.noise_public_key = Some(noise_public_key);
        contact.noise_session_state = NoiseSessionState::Established;
        contact.last_handshake_time = Some(now);
        contact.last_seen = now;
        self.upsert(&contact).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store() -> ContactStore {
        ContactStore::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let contacts = store();
        let contact = Contact::new("eph1".to_string(), [1u8; 32], "Alice".to_string(), 100);
        contacts.upsert(&contact).await.unwrap();

        let fetched = contacts.get("eph1").await.unwrap().unwrap();
        assert_eq!(fetched.display_name, "Alice");
        assert_eq!(fetched.noise_session_state, NoiseSessionState::None);
    }

    #[tokio::test]
    async fn second_upsert_with_same_id_replaces_the_row() {
        let contacts = store();
        let mut contact = Contact::new("eph1".to_string(), [1u8; 32], "Alice".to_string(), 100);
        contacts.upsert(&contact).await.unwrap();

        contact.display_name = "Alice2".to_string();
        contacts.upsert(&contact).await.unwrap();

        assert_eq!(contacts.list().await.unwrap().len(), 1);
        assert_eq!(
            contacts.get("eph1").await.unwrap().unwrap().display_name,
            "Alice2"
        );
    }

    #[tokio::test]
    async fn establishing_session_sets_key_and_state_together() {
        let contacts = store();
        let contact = Contact::new("eph1".to_string(), [1u8; 32], "Alice".to_string(), 100);
        contacts.upsert(&contact).await.unwrap();

        contacts.mark_established("eph1", [9u8; 32], 200).await.unwrap();

        let fetched = contacts.get("eph1").await.unwrap().unwrap();
        assert_eq!(fetched.noise_session_state, NoiseSessionState::Established);
        assert_eq!(fetched.noise_public_key, Some([9u8; 32]));
    }

    #[tokio::test]
    async fn invariant_rejects_key_without_established_state() {
        let contacts = store();
        let mut contact = Contact::new("eph1".to_string(), [1u8; 32], "Alice".to_string(), 100);
        contact.noise_public_key = Some([9u8; 32]);
        contact.noise_session_state = NoiseSessionState::None;

        assert!(contacts.upsert(&contact).await.is_err());
    }
}
