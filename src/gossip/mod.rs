//! Gossip Sync Manager: reconciles per-node queue state via digests and
//! re-broadcasts the latest relay-worthy announcement per sender.
//!
//! Grounded on `mesh/service.rs`'s actor shape (an `mpsc` command channel
//! plus internal state behind its own lock, no lock held across an await)
//! for the start/stop lifecycle, and on (F)'s digest/`missing_ids`
//! primitives for the actual reconciliation math.

use crate::protocol::PeerId;
use crate::queue::MessageQueue;
use crate::relay::MeshRelayMessage;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

const ANNOUNCEMENT_STALE_AFTER_SECS: u64 = 12 * 60 * 60;

/// What (H) does with a tracked public frame. Only `Announce` is retained
/// here; `Broadcast` frames are already handled by the offline queue (F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicMessageType {
    Announce,
    Broadcast,
}

#[derive(Debug, Clone)]
pub struct GossipAnnouncement {
    pub sender_id: PeerId,
    pub message_id: String,
    pub relay_message: MeshRelayMessage,
    pub observed_at: u64,
}

/// `(message_ids, node_id, queue_hash)` exchanged between peers to decide
/// whether a full sync round is needed.
#[derive(Debug, Clone)]
pub struct QueueSyncMessage {
    pub message_ids: Vec<String>,
    pub node_id: PeerId,
    pub queue_hash: [u8; 32],
}

/// What a caller should actually push to the wire after
/// [`GossipSyncManager::handle_sync_request`].
#[derive(Debug, Clone)]
pub struct SyncResponseItem {
    pub peer_id: PeerId,
    pub message_id: String,
}

/// The two separate obligations a sync round hands back to the caller:
/// `announcements` are the frames to ship immediately, `missing_ids`
/// names queue entries the peer lacks that the caller should drive a
/// follow-up flush for rather than dumping as sync-response frames.
#[derive(Debug, Clone, Default)]
pub struct SyncResponse {
    pub announcements: Vec<SyncResponseItem>,
    pub missing_ids: Vec<String>,
}

struct Inner {
    announcements: HashMap<PeerId, GossipAnnouncement>,
    running: bool,
}

/// Per-peer queue-hash exchange, announce re-broadcast, and stale
/// suppression. One instance per node.
pub struct GossipSyncManager {
    self_id: PeerId,
    queue: Arc<MessageQueue>,
    inner: RwLock<Inner>,
    ticker: RwLock<Option<JoinHandle<()>>>,
}

impl GossipSyncManager {
    pub fn new(self_id: PeerId, queue: Arc<MessageQueue>) -> Self {
        Self {
            self_id,
            queue,
            inner: RwLock::new(Inner {
                announcements: HashMap::new(),
                running: false,
            }),
            ticker: RwLock::new(None),
        }
    }

    pub async fn start(&self) {
        self.inner.write().await.running = true;
    }

    pub async fn stop(&self) {
        self.inner.write().await.running = false;
        if let Some(handle) = self.ticker.write().await.take() {
            handle.abort();
        }
    }

    /// Schedules the first sync tick after `delay`, via a detached
    /// one-shot channel rather than a real periodic ticker; callers drive
    /// the actual sync exchange once notified on `tx`.
    pub async fn schedule_initial_sync(&self, delay: Duration) -> mpsc::Receiver<()> {
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(()).await;
        });
        *self.ticker.write().await = Some(handle);
        rx
    }

    /// Only `Announce` frames are tracked here; `Broadcast` is (F)'s job.
    /// For a given sender, only the latest announcement is retained.
    pub async fn track_public_message(
        &self,
        message_id: String,
        relay_message: MeshRelayMessage,
        kind: PublicMessageType,
    ) {
        if kind != PublicMessageType::Announce {
            return;
        }

        let sender_id = relay_message.relay_metadata.original_sender;
        let observed_at = now_secs();
        if observed_at.saturating_sub(relay_message.relay_metadata.relay_timestamp)
            >= ANNOUNCEMENT_STALE_AFTER_SECS
        {
            return;
        }

        let mut inner = self.inner.write().await;
        inner.announcements.insert(
            sender_id,
            GossipAnnouncement {
                sender_id,
                message_id,
                relay_message,
                observed_at,
            },
        );
    }

    pub async fn remove_announcement_for_peer(&self, sender: PeerId) {
        self.inner.write().await.announcements.remove(&sender);
    }

    pub async fn clear(&self) {
        self.inner.write().await.announcements.clear();
    }

    /// 1. If the peer's `queue_hash` matches ours, nothing to send.
    /// 2. Else ship every locally-held announcement as a response frame,
    ///    and surface whatever (F) says is missing from the peer's
    ///    reported id set as `missing_ids` for the caller to drive a
    ///    follow-up flush with — the two streams never merge, so a sync
    ///    response never silently dumps the whole local queue as
    ///    announcement frames.
    pub async fn handle_sync_request(
        &self,
        from_peer: PeerId,
        request: &QueueSyncMessage,
    ) -> SyncResponse {
        let local_hash = self.queue.hash(false).await;
        if local_hash == request.queue_hash {
            return SyncResponse::default();
        }

        let announcements: Vec<SyncResponseItem> = {
            let inner = self.inner.read().await;
            self.live_announcements(&inner)
                .map(|a| SyncResponseItem {
                    peer_id: from_peer,
                    message_id: a.message_id.clone(),
                })
                .collect()
        };

        let missing_ids = self.queue.missing_ids(&request.message_ids).await;

        SyncResponse {
            announcements,
            missing_ids,
        }
    }

    fn live_announcements<'a>(
        &'a self,
        inner: &'a Inner,
    ) -> impl Iterator<Item = &'a GossipAnnouncement> {
        let now = now_secs();
        inner
            .announcements
            .values()
            .filter(move |a| now.saturating_sub(a.observed_at) < ANNOUNCEMENT_STALE_AFTER_SECS)
    }

    pub async fn is_running(&self) -> bool {
        self.inner.read().await.running
    }

    pub fn self_id(&self) -> PeerId {
        self.self_id
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
