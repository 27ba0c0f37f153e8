//! Property-based tests for the relay and offline queue invariants.
//!
//! These generate many arbitrary routing paths and message sets to check
//! the properties that hold regardless of which specific nodes or
//! messages are involved, rather than pinning a single worked example.

use meshtalk_core::protocol::PeerId;
use meshtalk_core::queue::{MessageQueue, Priority};
use meshtalk_core::relay::RelayMetadata;
use proptest::prelude::*;

fn arb_peer_id() -> impl Strategy<Value = PeerId> {
    any::<[u8; 32]>()
}

fn arb_routing_path(max_len: usize) -> impl Strategy<Value = Vec<PeerId>> {
    prop::collection::vec(arb_peer_id(), 1..=max_len)
}

fn arb_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Normal),
        Just(Priority::High),
        Just(Priority::Urgent),
    ]
}

fn sample_metadata(routing_path: Vec<PeerId>, priority: Priority) -> RelayMetadata {
    let original_sender = routing_path[0];
    RelayMetadata {
        ttl: 10,
        hop_count: routing_path.len() as u8,
        routing_path,
        message_hash: [0u8; 32],
        priority,
        relay_timestamp: 0,
        original_sender,
        final_recipient: [0xFFu8; 32],
        sender_rate_count: 0,
    }
}

proptest! {
    /// `ack_routing_path` is the exact reverse of `routing_path`, for any
    /// path length, and round-trips back through another reversal.
    #[test]
    fn ack_path_is_reverse_of_routing_path(path in arb_routing_path(12), priority in arb_priority()) {
        let metadata = sample_metadata(path.clone(), priority);
        let ack_path = metadata.ack_routing_path();

        prop_assert_eq!(ack_path.len(), path.len());
        let reversed: Vec<PeerId> = path.iter().rev().copied().collect();
        prop_assert_eq!(ack_path, reversed);
    }

    /// `previous_hop` always names the second-to-last entry, and is
    /// `None` exactly when the path has fewer than two hops.
    #[test]
    fn previous_hop_matches_second_to_last_entry(path in arb_routing_path(12), priority in arb_priority()) {
        let metadata = sample_metadata(path.clone(), priority);
        match metadata.previous_hop() {
            Some(hop) => prop_assert_eq!(Some(hop), path.get(path.len() - 2).copied()),
            None => prop_assert!(path.len() < 2),
        }
    }

    /// A path only ever grows by originator-appended hops, so no
    /// well-formed wrapper can report itself as looped unless the same
    /// peer genuinely appears twice.
    #[test]
    fn loop_freedom_matches_path_containment(path in arb_routing_path(12), candidate in arb_peer_id()) {
        let contains = path.contains(&candidate);
        let mut extended = path.clone();
        extended.push(candidate);
        let occurrences = extended.iter().filter(|&&p| p == candidate).count();
        prop_assert_eq!(occurrences == 2, contains);
    }
}

proptest! {
    /// If a peer reports back every id we just enqueued, nothing of ours
    /// is missing from their view — the digest-convergence short circuit
    /// depends on this holding for any pending set, not just the empty
    /// or singleton cases the unit tests pin down.
    #[test]
    fn missing_ids_against_a_full_report_is_empty(
        recipient in arb_peer_id(),
        sender in arb_peer_id(),
        contents in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..16), 1..8),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        let missing = rt.block_on(async {
            let queue = MessageQueue::new();
            let mut ids = Vec::new();
            for (i, content) in contents.iter().enumerate() {
                let id = format!("m{i}");
                queue
                    .enqueue(id.clone(), "chat".into(), content.clone(), recipient, sender, Priority::Normal)
                    .await
                    .unwrap();
                ids.push(id);
            }
            queue.missing_ids(&ids).await
        });

        prop_assert!(missing.is_empty());
    }
}
