//! Offline Message Queue: durable prioritized outbound queue with retry,
//! awaiting-ack bookkeeping, and the digest primitives gossip sync
//! consumes.
//!
//! Grounded on `mesh/message_queue.rs` for the priority-ordered
//! scheduling shape, `mesh/deduplication.rs` for the window-bookkeeping
//! style reused here for awaiting-ack tracking, and
//! `database/abstractions.rs`'s use of `blake3::hash` for the queue
//! digest.

use crate::error::{Error, Result};
use crate::protocol::PeerId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use uuid::Uuid;

pub type MessageId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Pending,
    Sending,
    AwaitingAck,
    Delivered,
    Failed,
    Retrying,
}

#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub queue_id: String,
    pub message_id: MessageId,
    pub chat_id: String,
    pub content: Vec<u8>,
    pub recipient_public_key: PeerId,
    pub sender_public_key: PeerId,
    pub priority: Priority,
    pub status: MessageStatus,
    pub retry_count: u32,
    pub created_at: u64,
    pub last_attempt_at: Option<u64>,
    pub is_relay_message: bool,
    pub relay_node_id: Option<PeerId>,
    pub message_hash: [u8; 32],
    pub relay_metadata: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
pub struct QueueStatistics {
    pub pending: usize,
    pub sending: usize,
    pub awaiting_ack: usize,
    pub delivered: usize,
    pub failed: usize,
    pub retrying: usize,
}

/// Callback the queue invokes to actually hand a message to the
/// transport. Returns `true` if the transport accepted the send attempt
/// (moves the message to `awaiting_ack`), `false` otherwise (message
/// stays `pending`).
#[async_trait]
pub trait OutboundSink: Send + Sync {
    async fn send_to_peer(&self, peer_id: PeerId, message: &QueuedMessage) -> bool;
}

const MAX_RETRIES: u32 = 5;

pub struct MessageQueue {
    messages: RwLock<HashMap<MessageId, QueuedMessage>>,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(HashMap::new()),
        }
    }

    /// `message_id` is application-chosen, not minted here: equal
    /// logical messages must carry the same id across nodes so digests
    /// (see [`Self::hash`]) and gossip reconciliation
    /// ([`Self::missing_ids`]/[`Self::excess`]) converge, and so a later
    /// ACK naming this id resolves via [`Self::on_ack`]. A second
    /// `enqueue` with an id already present is rejected rather than
    /// silently overwriting the existing row.
    pub async fn enqueue(
        &self,
        message_id: MessageId,
        chat_id: String,
        content: Vec<u8>,
        recipient_public_key: PeerId,
        sender_public_key: PeerId,
        priority: Priority,
    ) -> Result<()> {
        let message_hash = blake3::hash(&content).into();

        let message = QueuedMessage {
            queue_id: Uuid::new_v4().to_string(),
            message_id: message_id.clone(),
            chat_id,
            content,
            recipient_public_key,
            sender_public_key,
            priority,
            status: MessageStatus::Pending,
            retry_count: 0,
            created_at: now_secs(),
            last_attempt_at: None,
            is_relay_message: false,
            relay_node_id: None,
            message_hash,
            relay_metadata: None,
        };

        let mut messages = self.messages.write().await;
        if messages.contains_key(&message_id) {
            return Err(Error::StoreError(format!(
                "duplicate enqueue for message_id {message_id}"
            )));
        }
        messages.insert(message_id, message);
        Ok(())
    }

    /// Every message not yet in a terminal state.
    pub async fn pending(&self) -> Vec<QueuedMessage> {
        self.messages
            .read()
            .await
            .values()
            .filter(|m| {
                matches!(
                    m.status,
                    MessageStatus::Pending
                        | MessageStatus::Sending
                        | MessageStatus::AwaitingAck
                        | MessageStatus::Retrying
                )
            })
            .cloned()
            .collect()
    }

    /// Selects every `pending`/`retrying` message addressed to `peer_id`,
    /// ordered by priority descending then `created_at` ascending,
    /// attempts to send each through `sink`, and on acceptance
    /// transitions it to `awaiting_ack`. Messages already `awaiting_ack`
    /// are left untouched (duplicate flushes are a no-op for them).
    pub async fn flush_for_peer(&self, peer_id: PeerId, sink: &dyn OutboundSink) -> usize {
        let mut messages = self.messages.write().await;

        let mut candidates: Vec<MessageId> = messages
            .values()
            .filter(|m| {
                m.recipient_public_key == peer_id
                    && matches!(m.status, MessageStatus::Pending | MessageStatus::Retrying)
            })
            .map(|m| m.message_id.clone())
            .collect();

        candidates.sort_by(|a, b| {
            let ma = &messages[a];
            let mb = &messages[b];
            mb.priority
                .cmp(&ma.priority)
                .then(ma.created_at.cmp(&mb.created_at))
        });

        let mut flushed = 0;
        for message_id in candidates {
            let snapshot = {
                let message = messages.get_mut(&message_id).expect("candidate exists");
                message.status = MessageStatus::Sending;
                message.last_attempt_at = Some(now_secs());
                message.clone()
            };

            if sink.send_to_peer(peer_id, &snapshot).await {
                let message = messages.get_mut(&message_id).expect("candidate exists");
                message.status = MessageStatus::AwaitingAck;
                flushed += 1;
            } else {
                self.record_send_failure_locked(&mut messages, &message_id);
            }
        }
        flushed
    }

    fn record_send_failure_locked(
        &self,
        messages: &mut HashMap<MessageId, QueuedMessage>,
        message_id: &str,
    ) {
        if let Some(message) = messages.get_mut(message_id) {
            message.retry_count += 1;
            message.status = if message.retry_count >= MAX_RETRIES {
                MessageStatus::Failed
            } else {
                MessageStatus::Retrying
            };
        }
    }

    /// A transport/ACK timeout for a message already `awaiting_ack`.
    pub async fn mark_send_timed_out(&self, message_id: &str) {
        let mut messages = self.messages.write().await;
        self.record_send_failure_locked(&mut messages, message_id);
    }

    pub async fn mark_delivered(&self, message_id: &str) {
        if let Some(message) = self.messages.write().await.get_mut(message_id) {
            message.status = MessageStatus::Delivered;
        }
    }

    /// An ACK arrived for `message_id` from `from_node` — resolve the
    /// local awaiting-ack bookkeeping and mark delivered.
    pub async fn on_ack(&self, message_id: &str, from_node: PeerId) {
        if let Some(message) = self.messages.write().await.get_mut(message_id) {
            message.status = MessageStatus::Delivered;
            message.relay_node_id = Some(from_node);
        }
    }

    pub async fn statistics(&self) -> QueueStatistics {
        let messages = self.messages.read().await;
        let mut stats = QueueStatistics::default();
        for message in messages.values() {
            match message.status {
                MessageStatus::Pending => stats.pending += 1,
                MessageStatus::Sending => stats.sending += 1,
                MessageStatus::AwaitingAck => stats.awaiting_ack += 1,
                MessageStatus::Delivered => stats.delivered += 1,
                MessageStatus::Failed => stats.failed += 1,
                MessageStatus::Retrying => stats.retrying += 1,
            }
        }
        stats
    }

    /// Deterministic digest over the set of `(message_id, priority)`
    /// pairs currently `pending`/`retrying`. `force_recalc` is accepted
    /// for interface parity with a cached-digest implementation; this
    /// queue always recomputes since hashing a small in-memory set is
    /// cheap relative to a durable-store round trip.
    pub async fn hash(&self, _force_recalc: bool) -> [u8; 32] {
        let messages = self.messages.read().await;
        let mut pairs: Vec<(MessageId, Priority)> = messages
            .values()
            .filter(|m| matches!(m.status, MessageStatus::Pending | MessageStatus::Retrying))
            .map(|m| (m.message_id.clone(), m.priority))
            .collect();
        pairs.sort();

        let mut hasher = blake3::Hasher::new();
        for (message_id, priority) in &pairs {
            hasher.update(message_id.as_bytes());
            hasher.update(&[*priority as u8]);
        }
        hasher.finalize().into()
    }

    async fn local_pending_retrying_ids(&self) -> Vec<MessageId> {
        self.messages
            .read()
            .await
            .values()
            .filter(|m| matches!(m.status, MessageStatus::Pending | MessageStatus::Retrying))
            .map(|m| m.message_id.clone())
            .collect()
    }

    /// Local pending/retrying ids absent from `other_ids` — what we have
    /// that the peer doesn't know about yet.
    pub async fn missing_ids(&self, other_ids: &[MessageId]) -> Vec<MessageId> {
        let local = self.local_pending_retrying_ids().await;
        local
            .into_iter()
            .filter(|id| !other_ids.contains(id))
            .collect()
    }

    /// The complement of [`Self::missing_ids`]: entries in `other_ids`
    /// we don't have locally.
    pub async fn excess(&self, other_ids: &[MessageId]) -> Vec<MessageId> {
        let local = self.local_pending_retrying_ids().await;
        other_ids
            .iter()
            .filter(|id| !local.contains(id))
            .cloned()
            .collect()
    }

    pub async fn get(&self, message_id: &str) -> Option<QueuedMessage> {
        self.messages.read().await.get(message_id).cloned()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
