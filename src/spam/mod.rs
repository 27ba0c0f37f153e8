//! Spam / rate-limit policy: per-sender sliding counter plus a recent
//! duplicate-hash filter.
//!
//! Grounded on `validation/mod.rs`'s `RateLimiter`/`TokenBucket` for the
//! sliding-window rate check and `mesh/deduplication.rs`'s
//! `MessageDeduplicator` for the hash-based duplicate window.

use crate::protocol::PeerId;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// How this sender/message pair was judged by [`SpamPolicy::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    DropDuplicate,
    DropRateLimited,
}

struct SenderWindow {
    timestamps: VecDeque<Instant>,
}

/// Sliding-window spam policy. Duplicates are checked independently of
/// (and before) the rate limit, so a duplicate is always reported as
/// such even if the sender is also over budget.
pub struct SpamPolicy {
    dedup_window: Duration,
    rate_window: Duration,
    rate_ceiling: usize,
    seen_hashes: RwLock<HashMap<[u8; 32], Instant>>,
    sender_windows: RwLock<HashMap<PeerId, SenderWindow>>,
}

impl Default for SpamPolicy {
    fn default() -> Self {
        // dedup window and rate ceiling tuned for a store-and-forward
        // mesh, not general API throttling.
        Self::new(Duration::from_secs(300), Duration::from_secs(60), 30)
    }
}

impl SpamPolicy {
    pub fn new(dedup_window: Duration, rate_window: Duration, rate_ceiling: usize) -> Self {
        Self {
            dedup_window,
            rate_window,
            rate_ceiling,
            seen_hashes: RwLock::new(HashMap::new()),
            sender_windows: RwLock::new(HashMap::new()),
        }
    }

    pub async fn evaluate(&self, sender_id: PeerId, message_hash: [u8; 32]) -> PolicyDecision {
        if self.is_duplicate(message_hash).await {
            return PolicyDecision::DropDuplicate;
        }
        if !self.check_rate(sender_id).await {
            return PolicyDecision::DropRateLimited;
        }
        PolicyDecision::Allow
    }

    async fn is_duplicate(&self, message_hash: [u8; 32]) -> bool {
        let now = Instant::now();
        let mut seen = self.seen_hashes.write().await;
        seen.retain(|_, seen_at| now.duration_since(*seen_at) < self.dedup_window);

        if seen.contains_key(&message_hash) {
            true
        } else {
            seen.insert(message_hash, now);
            false
        }
    }

    async fn check_rate(&self, sender_id: PeerId) -> bool {
        let now = Instant::now();
        let mut windows = self.sender_windows.write().await;
        let window = windows.entry(sender_id).or_insert_with(|| SenderWindow {
            timestamps: VecDeque::new(),
        });

        while let Some(front) = window.timestamps.front() {
            if now.duration_since(*front) >= self.rate_window {
                window.timestamps.pop_front();
            } else {
                break;
            }
        }

        if window.timestamps.len() >= self.rate_ceiling {
            false
        } else {
            window.timestamps.push_back(now);
            true
        }
    }

    pub async fn clear(&self) {
        self.seen_hashes.write().await.clear();
        self.sender_windows.write().await.clear();
    }
}
