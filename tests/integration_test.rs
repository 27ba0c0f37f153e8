//! Multi-node end-to-end scenarios spanning the handshake, queue, relay,
//! and gossip subsystems together — the scenarios a single module's own
//! unit tests can't exercise on their own.

use meshtalk_core::config::RelayConfig;
use meshtalk_core::gossip::{GossipSyncManager, QueueSyncMessage};
use meshtalk_core::handshake::HandshakeCoordinator;
use meshtalk_core::queue::{MessageQueue, Priority};
use meshtalk_core::relay::{RelayDecision, RelayEngine};
use meshtalk_core::session::SessionManager;
use meshtalk_core::spam::SpamPolicy;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn node_id(label: &str) -> [u8; 32] {
    let mut id = [0u8; 32];
    let bytes = label.as_bytes();
    id[..bytes.len().min(32)].copy_from_slice(&bytes[..bytes.len().min(32)]);
    id
}

fn engine(self_id: [u8; 32]) -> RelayEngine {
    RelayEngine::new(
        self_id,
        Arc::new(MessageQueue::new()),
        Arc::new(SpamPolicy::default()),
        Arc::new(RelayConfig::new()),
    )
}

#[tokio::test]
async fn three_hop_delivery_ali_arshad_abubakar() {
    let ali = node_id("ali_key_123");
    let arshad = node_id("arshad_key_456");
    let abubakar = node_id("abubakar_key_789");

    let ali_engine = engine(ali);
    let wrapper = ali_engine
        .create_outgoing_relay(
            "ali_to_abubakar_001".to_string(),
            b"Hello Abubakar from Ali!".to_vec(),
            abubakar,
            Priority::Normal,
        )
        .await;

    let arshad_engine = engine(arshad);
    let decision = arshad_engine
        .process_incoming_relay(&wrapper, ali, &[abubakar])
        .await;
    let (next_hop, forwarded) = match decision {
        RelayDecision::Relayed { next_hop, forwarded } => (next_hop, forwarded),
        other => panic!("expected Relayed, got {other:?}"),
    };
    assert_eq!(next_hop, abubakar);

    let stats = arshad_engine.statistics();
    assert_eq!(stats.total_relayed, 1);
    assert!(stats.relay_efficiency() > 0.0);

    let abubakar_engine = engine(abubakar);
    let decision = abubakar_engine
        .process_incoming_relay(&forwarded, arshad, &[])
        .await;
    match decision {
        RelayDecision::Delivered { content } => {
            assert_eq!(content, b"Hello Abubakar from Ali!");
        }
        other => panic!("expected Delivered, got {other:?}"),
    }
}

fn decision_is_delivered(decision: &RelayDecision) -> bool {
    matches!(decision, RelayDecision::Delivered { .. })
}

#[tokio::test]
async fn relay_node_never_reports_delivered_for_a_message_addressed_elsewhere() {
    let ali = node_id("ali_key_123");
    let arshad = node_id("arshad_key_456");
    let abubakar = node_id("abubakar_key_789");

    let wrapper = engine(ali)
        .create_outgoing_relay(
            "m1".to_string(),
            b"for abubakar".to_vec(),
            abubakar,
            Priority::Normal,
        )
        .await;

    let decision = engine(arshad)
        .process_incoming_relay(&wrapper, ali, &[abubakar])
        .await;

    assert!(!decision_is_delivered(&decision));
    assert!(matches!(decision, RelayDecision::Relayed { next_hop, .. } if next_hop == abubakar));
}

#[tokio::test]
async fn loop_detection_over_a_two_hop_path() {
    let ali = node_id("ali");
    let arshad = node_id("arshad");
    let abubakar = node_id("abubakar");

    let mut wrapper = engine(ali)
        .create_outgoing_relay("m1".to_string(), b"x".to_vec(), abubakar, Priority::Normal)
        .await;
    wrapper.relay_metadata.routing_path = vec![ali, arshad];
    wrapper.relay_metadata.hop_count = 2;

    assert!(wrapper.relay_metadata.routing_path.contains(&ali));
    assert!(!wrapper.relay_metadata.routing_path.contains(&abubakar));

    let decision = engine(arshad).process_incoming_relay(&wrapper, ali, &[ali]).await;
    assert!(matches!(
        decision,
        RelayDecision::Dropped {
            reason: meshtalk_core::protocol::RejectionReason::LoopDetected
        }
    ));
}

#[tokio::test]
async fn ack_path_is_the_reverse_of_the_routing_path() {
    let ali = node_id("ali");
    let arshad = node_id("arshad");
    let abubakar = node_id("abubakar");

    let mut wrapper = engine(ali)
        .create_outgoing_relay("m1".to_string(), b"x".to_vec(), abubakar, Priority::Normal)
        .await;
    wrapper.relay_metadata.routing_path = vec![ali, arshad, abubakar];

    assert_eq!(
        wrapper.relay_metadata.ack_routing_path(),
        vec![abubakar, arshad, ali]
    );
    assert_eq!(wrapper.relay_metadata.previous_hop(), Some(arshad));
}

#[tokio::test]
async fn handshake_round_trip_then_encrypted_message_has_28_byte_overhead() {
    let alice_sessions = Arc::new(SessionManager::new());
    let bob_sessions = Arc::new(SessionManager::new());
    let alice = HandshakeCoordinator::new([11u8; 32], "alice", alice_sessions.clone());
    let bob = HandshakeCoordinator::new([12u8; 32], "bob", bob_sessions.clone());

    let peer_id = [0xABu8; 32];
    let msg1 = alice.start(peer_id).await.unwrap();
    let step2 = bob.on_received(peer_id, &msg1).await.unwrap();
    let msg2 = step2.frame.unwrap();
    let step3 = alice.on_received(peer_id, &msg2).await.unwrap();
    assert!(step3.established);
    let msg3 = step3.frame.unwrap();
    let step4 = bob.on_received(peer_id, &msg3).await.unwrap();
    assert!(step4.established);

    assert!(alice_sessions.has_established(&peer_id).await);
    assert!(bob_sessions.has_established(&peer_id).await);

    let plaintext = "Hello Bob! \u{1F510}";
    let ciphertext = alice_sessions
        .encrypt(&peer_id, plaintext.as_bytes())
        .await
        .unwrap();
    assert_eq!(ciphertext.len(), plaintext.as_bytes().len() + 28);

    let decrypted = bob_sessions.decrypt(&peer_id, &ciphertext).await.unwrap();
    assert_eq!(decrypted, plaintext.as_bytes());
}

#[tokio::test]
async fn sequential_nonces_over_ten_messages_stay_established() {
    let alice_sessions = Arc::new(SessionManager::new());
    let bob_sessions = Arc::new(SessionManager::new());
    let alice = HandshakeCoordinator::new([21u8; 32], "alice", alice_sessions.clone());
    let bob = HandshakeCoordinator::new([22u8; 32], "bob", bob_sessions.clone());

    let peer_id = [0xCDu8; 32];
    let msg1 = alice.start(peer_id).await.unwrap();
    let msg2 = bob.on_received(peer_id, &msg1).await.unwrap().frame.unwrap();
    let msg3 = alice.on_received(peer_id, &msg2).await.unwrap().frame.unwrap();
    bob.on_received(peer_id, &msg3).await.unwrap();

    for i in 0..10 {
        let message = format!("Message #{i}");
        let ciphertext = alice_sessions
            .encrypt(&peer_id, message.as_bytes())
            .await
            .unwrap();
        let plaintext = bob_sessions.decrypt(&peer_id, &ciphertext).await.unwrap();
        assert_eq!(plaintext, message.as_bytes());
    }
    assert!(alice_sessions.has_established(&peer_id).await);
}

#[tokio::test]
async fn queue_hash_short_circuit_and_announcement_only_sync() {
    let peer = node_id("peer");
    let self_id = node_id("self");

    let node_a_queue = Arc::new(MessageQueue::new());
    node_a_queue
        .enqueue(
            "queued-message".into(),
            "chat".into(),
            b"x".to_vec(),
            peer,
            self_id,
            Priority::Normal,
        )
        .await
        .unwrap();

    let gossip_a = GossipSyncManager::new(self_id, node_a_queue.clone());
    let hash_a = node_a_queue.hash(false).await;

    // A genuinely equal-hash case: ask node A to sync against its own hash.
    let matching_request = QueueSyncMessage {
        message_ids: vec![],
        node_id: peer,
        queue_hash: hash_a,
    };
    let response = gossip_a.handle_sync_request(peer, &matching_request).await;
    assert!(response.announcements.is_empty());
    assert!(response.missing_ids.is_empty());

    // An unequal-hash case with one locally-held announcement and one
    // locally-queued message the peer doesn't know about: the
    // announcement ships as exactly one response frame, and the queued
    // message surfaces separately as a missing id rather than as a
    // second announcement frame.
    let announced_id = "held-announcement".to_string();
    let relay_message = meshtalk_core::relay::MeshRelayMessage {
        original_message_id: announced_id.clone(),
        original_content: b"hi".to_vec(),
        relay_metadata: meshtalk_core::relay::RelayMetadata {
            ttl: 7,
            hop_count: 1,
            routing_path: vec![peer],
            message_hash: blake3::hash(b"hi").into(),
            priority: Priority::Normal,
            relay_timestamp: now_secs(),
            original_sender: peer,
            final_recipient: self_id,
            sender_rate_count: 0,
        },
        relay_node_id: peer,
        relayed_at: now_secs(),
    };
    gossip_a
        .track_public_message(
            announced_id.clone(),
            relay_message,
            meshtalk_core::gossip::PublicMessageType::Announce,
        )
        .await;

    let mismatched_request = QueueSyncMessage {
        message_ids: vec![],
        node_id: peer,
        queue_hash: [0u8; 32],
    };
    let response = gossip_a.handle_sync_request(peer, &mismatched_request).await;
    let announced_ids: Vec<&str> = response
        .announcements
        .iter()
        .map(|i| i.message_id.as_str())
        .collect();
    assert_eq!(announced_ids, vec![announced_id.as_str()]);
    assert_eq!(response.missing_ids, vec!["queued-message".to_string()]);
}
