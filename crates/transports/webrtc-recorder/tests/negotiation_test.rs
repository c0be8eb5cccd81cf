//! Negotiation state machine against a scripted transport

mod harness;

use harness::{Journal, MockTransport, ScriptedSignaling, TransportScript};
use remotemedia_webrtc_recorder::{
    Error, EventQueue, GatheringState, NegotiationPhase, PeerSession, SdpType, SessionConfig,
};
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    peer: Arc<PeerSession>,
    transport: Arc<MockTransport>,
    signaling: Arc<ScriptedSignaling>,
    journal: Journal,
    // Keeps the event receiver alive so transport sends succeed
    _queue: EventQueue,
}

fn fixture(script: TransportScript, signaling_ok: bool) -> Fixture {
    let journal = Journal::default();
    let queue = EventQueue::new();
    let transport = Arc::new(MockTransport::new(queue.sender(), journal.clone(), script));
    let signaling = Arc::new(if signaling_ok {
        ScriptedSignaling::answering(journal.clone())
    } else {
        ScriptedSignaling::failing(journal.clone(), "connection refused")
    });
    let peer = Arc::new(PeerSession::new(
        "test-session",
        transport.clone(),
        signaling.clone(),
    ));
    Fixture {
        peer,
        transport,
        signaling,
        journal,
        _queue: queue,
    }
}

#[tokio::test]
async fn test_successful_negotiation_reaches_connected() {
    let f = fixture(TransportScript::default(), true);
    f.peer.register_video_slots().await.unwrap();
    assert_eq!(f.transport.active_slots(), 2);

    f.peer.negotiate(&SessionConfig::default()).await.unwrap();

    let state = f.peer.state();
    assert_eq!(state.phase, NegotiationPhase::Connected);
    let local = state.local_description.expect("local description");
    let remote = state.remote_description.expect("remote description");
    assert!(!local.sdp.is_empty());
    assert!(local.sdp.contains("a=candidate"), "offer sent after gathering");
    assert_eq!(remote.sdp_type, SdpType::Answer);
    assert_eq!(state.remote_video_ids, vec!["pc1_rgb", "pc1_depth"]);

    assert_eq!(
        f.journal.entries(),
        vec!["add_slot:1", "add_slot:2", "create_offer", "set_local", "exchange", "set_remote"]
    );

    // The signaled offer carried the full configuration
    let received = f.signaling.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].1, SessionConfig::default());
}

#[tokio::test]
async fn test_gathering_wait_resolves_on_later_completion() {
    let f = fixture(
        TransportScript {
            auto_complete_gathering: false,
            ..Default::default()
        },
        true,
    );

    let peer = f.peer.clone();
    let negotiation = tokio::spawn(async move { peer.negotiate(&SessionConfig::default()).await });

    harness::wait_until(Duration::from_secs(2), "gathering phase", || {
        f.peer.phase() == NegotiationPhase::Gathering
    })
    .await
    .unwrap();
    assert_eq!(f.journal.count("exchange"), 0, "must not signal before gathering completes");

    f.transport.set_gathering(GatheringState::Gathering);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(f.peer.phase(), NegotiationPhase::Gathering);

    f.transport.set_gathering(GatheringState::Complete);
    negotiation.await.unwrap().unwrap();
    assert_eq!(f.peer.phase(), NegotiationPhase::Connected);
}

#[tokio::test]
async fn test_gathering_already_complete_does_not_block() {
    let f = fixture(
        TransportScript {
            auto_complete_gathering: false,
            ..Default::default()
        },
        true,
    );
    f.transport.set_gathering(GatheringState::Complete);

    tokio::time::timeout(Duration::from_secs(1), f.peer.wait_for_gathering_complete())
        .await
        .expect("completion observed before waiting is not missed");
}

#[tokio::test]
async fn test_offer_failure_closes_without_transceivers() {
    let f = fixture(
        TransportScript {
            fail_create_offer: true,
            ..Default::default()
        },
        true,
    );
    f.peer.register_video_slots().await.unwrap();

    let err = f.peer.negotiate(&SessionConfig::default()).await.unwrap_err();
    assert!(matches!(err, Error::NegotiationError(_)));
    assert_eq!(f.peer.phase(), NegotiationPhase::Closed);
    assert_eq!(f.transport.active_slots(), 0);
    assert_eq!(f.journal.count("close"), 1);
    assert_eq!(f.journal.count("exchange"), 0);
}

#[tokio::test]
async fn test_signaling_failure_surfaces_signaling_error() {
    let f = fixture(TransportScript::default(), false);
    f.peer.register_video_slots().await.unwrap();

    let err = f.peer.negotiate(&SessionConfig::default()).await.unwrap_err();
    assert!(matches!(err, Error::SignalingError(_)));
    assert!(err.is_negotiation_failure());
    assert_eq!(f.peer.phase(), NegotiationPhase::Closed);
    assert_eq!(f.transport.active_slots(), 0);
    assert_eq!(f.journal.count("set_remote"), 0);

    let stop = f.journal.position("stop_transceivers").unwrap();
    let close = f.journal.position("close").unwrap();
    assert!(stop < close);
}

#[tokio::test]
async fn test_remote_description_failure() {
    let f = fixture(
        TransportScript {
            fail_set_remote: true,
            ..Default::default()
        },
        true,
    );

    let err = f.peer.negotiate(&SessionConfig::default()).await.unwrap_err();
    assert!(matches!(err, Error::NegotiationError(_)));
    assert_eq!(f.peer.phase(), NegotiationPhase::Closed);
    assert!(f.peer.state().remote_description.is_none());
}

#[tokio::test]
async fn test_missing_local_description_is_negotiation_error() {
    let f = fixture(
        TransportScript {
            lose_local_description: true,
            ..Default::default()
        },
        true,
    );

    let err = f.peer.negotiate(&SessionConfig::default()).await.unwrap_err();
    assert!(matches!(err, Error::NegotiationError(_)));
    assert_eq!(f.journal.count("exchange"), 0);
}

#[tokio::test]
async fn test_negotiate_twice_is_invalid_state() {
    let f = fixture(TransportScript::default(), true);
    f.peer.negotiate(&SessionConfig::default()).await.unwrap();

    let err = f.peer.negotiate(&SessionConfig::default()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    assert_eq!(f.peer.phase(), NegotiationPhase::Connected);
}

#[tokio::test]
async fn test_close_during_gathering_aborts_negotiation() {
    let f = fixture(
        TransportScript {
            auto_complete_gathering: false,
            ..Default::default()
        },
        true,
    );

    let peer = f.peer.clone();
    let negotiation = tokio::spawn(async move { peer.negotiate(&SessionConfig::default()).await });

    harness::wait_until(Duration::from_secs(2), "gathering phase", || {
        f.peer.phase() == NegotiationPhase::Gathering
    })
    .await
    .unwrap();

    f.peer.shutdown().await;

    let err = negotiation.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::NegotiationError(_)));
    assert_eq!(f.journal.count("exchange"), 0);
    // Released once, by shutdown
    assert_eq!(f.journal.count("close"), 1);
}
