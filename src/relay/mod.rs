//! Mesh Relay Engine: wraps outgoing content in routing-path metadata,
//! decides whether an incoming relay frame is for us or needs forwarding,
//! and reflects ACKs back along the reversed path.
//!
//! Grounded on `mesh/service.rs`'s `forward_packet` (TTL decrement,
//! relay-hash bookkeeping) for the incoming-frame decision shape.

use crate::protocol::{PeerId, RejectionReason};
use crate::queue::{MessageId, MessageQueue, Priority};
use crate::spam::{PolicyDecision, SpamPolicy};
use crate::config::RelayConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct RelayMetadata {
    pub ttl: u8,
    pub hop_count: u8,
    pub routing_path: Vec<PeerId>,
    pub message_hash: [u8; 32],
    pub priority: Priority,
    pub relay_timestamp: u64,
    pub original_sender: PeerId,
    pub final_recipient: PeerId,
    pub sender_rate_count: u32,
}

impl RelayMetadata {
    pub fn ack_routing_path(&self) -> Vec<PeerId> {
        self.routing_path.iter().rev().copied().collect()
    }

    /// Who forwarded this frame to the node that just appended itself
    /// to `routing_path` (i.e. the second-to-last entry).
    pub fn previous_hop(&self) -> Option<PeerId> {
        if self.routing_path.len() >= 2 {
            Some(self.routing_path[self.routing_path.len() - 2])
        } else {
            None
        }
    }

    pub fn is_originator(&self) -> bool {
        self.routing_path.len() == 1
    }
}

#[derive(Debug, Clone)]
pub struct MeshRelayMessage {
    pub original_message_id: MessageId,
    pub original_content: Vec<u8>,
    pub relay_metadata: RelayMetadata,
    pub relay_node_id: PeerId,
    pub relayed_at: u64,
}

#[derive(Debug, Clone)]
pub enum RelayDecision {
    Delivered { content: Vec<u8> },
    Relayed { next_hop: PeerId, forwarded: MeshRelayMessage },
    Dropped { reason: RejectionReason },
    AckReflected { next_hop_for_ack: PeerId },
}

#[derive(Debug, Clone, Default)]
pub struct RelayStatistics {
    pub total_relayed: u64,
    pub total_delivered: u64,
    pub total_dropped: u64,
}

impl RelayStatistics {
    pub fn relay_efficiency(&self) -> f64 {
        let attempted = self.total_relayed + self.total_delivered + self.total_dropped;
        if attempted == 0 {
            0.0
        } else {
            (self.total_relayed + self.total_delivered) as f64 / attempted as f64
        }
    }
}

pub struct RelayEngine {
    self_id: PeerId,
    queue: Arc<MessageQueue>,
    spam: Arc<SpamPolicy>,
    config: Arc<RelayConfig>,
    relayed: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl RelayEngine {
    pub fn new(
        self_id: PeerId,
        queue: Arc<MessageQueue>,
        spam: Arc<SpamPolicy>,
        config: Arc<RelayConfig>,
    ) -> Self {
        Self {
            self_id,
            queue,
            spam,
            config,
            relayed: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Wrap freshly originated content for relay. The result carries
    /// `routing_path = [self]`; the caller picks the first hop and
    /// enqueues it into the offline queue (the fresh wrapper hasn't
    /// been sent anywhere yet, so it never goes through
    /// [`Self::process_incoming_relay`] itself).
    pub async fn create_outgoing_relay(
        &self,
        original_message_id: MessageId,
        original_content: Vec<u8>,
        final_recipient_pk: PeerId,
        priority: Priority,
    ) -> MeshRelayMessage {
        let message_hash = blake3::hash(&original_content).into();
        MeshRelayMessage {
            original_message_id,
            original_content,
            relay_metadata: RelayMetadata {
                ttl: self.config.max_relay_hops().await,
                hop_count: 1,
                routing_path: vec![self.self_id],
                message_hash,
                priority,
                relay_timestamp: now_secs(),
                original_sender: self.self_id,
                final_recipient: final_recipient_pk,
                sender_rate_count: 0,
            },
            relay_node_id: self.self_id,
            relayed_at: now_secs(),
        }
    }

    /// Process a relay frame received from `from_node_id`, given the set
    /// of currently-reachable neighbors.
    pub async fn process_incoming_relay(
        &self,
        relay_message: &MeshRelayMessage,
        _from_node_id: PeerId,
        available_next_hops: &[PeerId],
    ) -> RelayDecision {
        let metadata = &relay_message.relay_metadata;

        // A message whose original_sender is us, seen again after
        // leaving (hop_count > 1), has looped all the way around.
        if metadata.original_sender == self.self_id && metadata.hop_count > 1 {
            return self.drop(RejectionReason::SelfOriginated);
        }
        if metadata.routing_path.contains(&self.self_id) {
            return self.drop(RejectionReason::LoopDetected);
        }

        match self
            .spam
            .evaluate(metadata.original_sender, metadata.message_hash)
            .await
        {
            PolicyDecision::DropDuplicate => return self.drop(RejectionReason::Duplicate),
            PolicyDecision::DropRateLimited => return self.drop(RejectionReason::Spam),
            PolicyDecision::Allow => {}
        }

        if metadata.final_recipient == self.self_id {
            self.delivered.fetch_add(1, Ordering::Relaxed);
            return RelayDecision::Delivered {
                content: relay_message.original_content.clone(),
            };
        }

        let max_hops = self.config.max_relay_hops().await;
        if metadata.hop_count >= metadata.ttl || metadata.hop_count >= max_hops {
            return self.drop(RejectionReason::TtlExceeded);
        }

        let next_hop = available_next_hops
            .iter()
            .find(|&&hop| hop == metadata.final_recipient)
            .or_else(|| {
                let mut candidates: Vec<&PeerId> = available_next_hops
                    .iter()
                    .filter(|hop| !metadata.routing_path.contains(hop))
                    .collect();
                candidates.sort();
                candidates.into_iter().next()
            })
            .copied();

        // No reachable next hop right now: the message stays in the
        // offline queue awaiting a future flush opportunity rather than
        // being dropped outright, so keep its own awaiting-ack entry.
        let Some(next_hop) = next_hop else {
            self.enqueue_own_hop(relay_message, metadata.final_recipient).await;
            return self.drop(RejectionReason::NoRoute);
        };

        let mut new_path = metadata.routing_path.clone();
        new_path.push(self.self_id);

        let forwarded = MeshRelayMessage {
            original_message_id: relay_message.original_message_id.clone(),
            original_content: relay_message.original_content.clone(),
            relay_metadata: RelayMetadata {
                hop_count: metadata.hop_count + 1,
                routing_path: new_path,
                ..metadata.clone()
            },
            relay_node_id: self.self_id,
            relayed_at: now_secs(),
        };

        self.enqueue_own_hop(relay_message, next_hop).await;
        self.relayed.fetch_add(1, Ordering::Relaxed);
        RelayDecision::Relayed { next_hop, forwarded }
    }

    /// Give this hop its own awaiting-ack entry, keyed by
    /// `original_message_id`, so a later [`Self::process_incoming_ack`]
    /// for this id resolves it via `queue.on_ack` — each intermediate
    /// hop consumes its own entry rather than relying on the
    /// originator's.
    async fn enqueue_own_hop(&self, relay_message: &MeshRelayMessage, next_hop: PeerId) {
        let metadata = &relay_message.relay_metadata;
        if let Err(error) = self
            .queue
            .enqueue(
                relay_message.original_message_id.clone(),
                String::new(),
                relay_message.original_content.clone(),
                next_hop,
                self.self_id,
                metadata.priority,
            )
            .await
        {
            tracing::debug!(%error, message_id = %relay_message.original_message_id, "relay hop already has an awaiting-ack entry for this message");
        }
    }

    /// Reflect an ACK along its embedded reversed path. `ack_routing_path`
    /// is the constant `reverse(routing_path)` stamped by the final
    /// recipient; each hop locates itself and forwards to whatever
    /// follows it in the array. A hop not found in the path, or found
    /// at the last position, means the ACK has reached the originator.
    pub async fn process_incoming_ack(
        &self,
        ack_routing_path: &[PeerId],
        original_message_id: &str,
        from_node: PeerId,
    ) -> RelayDecision {
        self.queue.on_ack(original_message_id, from_node).await;

        match ack_routing_path.iter().position(|&hop| hop == self.self_id) {
            Some(pos) if pos + 1 < ack_routing_path.len() => RelayDecision::AckReflected {
                next_hop_for_ack: ack_routing_path[pos + 1],
            },
            Some(_) => RelayDecision::Delivered { content: Vec::new() },
            None => self.drop(RejectionReason::NoRoute),
        }
    }

    pub fn statistics(&self) -> RelayStatistics {
        RelayStatistics {
            total_relayed: self.relayed.load(Ordering::Relaxed),
            total_delivered: self.delivered.load(Ordering::Relaxed),
            total_dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn drop(&self, reason: RejectionReason) -> RelayDecision {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        RelayDecision::Dropped { reason }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
