use crate::integration::{capture_events, rig, settle, state_of, wait_until};
use crate::utils::Call;
use univo_core::NegotiationPayload;
use univo_rtc::media::MediaConstraints;
use univo_rtc::peer::{CloseReason, PeerState};
use univo_rtc::room::RoomEvent;

fn offer(sdp: &str) -> NegotiationPayload {
    NegotiationPayload::Offer { sdp: sdp.into() }
}

fn answer(sdp: &str) -> NegotiationPayload {
    NegotiationPayload::Answer { sdp: sdp.into() }
}

fn candidate(c: &str) -> NegotiationPayload {
    NegotiationPayload::IceCandidate {
        candidate: c.into(),
        sdp_mid: Some("0".into()),
        sdp_mline_index: Some(0),
    }
}

#[tokio::test]
async fn smaller_id_initiates_the_offer() {
    // Ids "A" < "B": the A side offers...
    let t = rig("A");
    t.signaling.set_participants(&["B"]);
    let handle = t.join("R1").await;

    let probe = t.peers.wait_probe("B", 2000).await;
    assert!(wait_until(|| t.signaling.offers_to("B") == 1, 2000).await);
    assert_eq!(probe.count(&Call::CreateOffer { ice_restart: false }), 1);
    assert_eq!(state_of(&handle, "B"), Some(PeerState::Negotiating));
}

#[tokio::test]
async fn larger_id_waits_for_the_offer() {
    // ...and the B side of the same pair stays quiet until it arrives, so
    // both ends agree on a single offerer.
    let t = rig("B");
    t.signaling.set_participants(&["A"]);
    let handle = t.join("R1").await;

    let probe = t.peers.wait_probe("A", 2000).await;
    settle().await;
    assert_eq!(t.signaling.offers_to("A"), 0);
    assert_eq!(probe.offer_count(), 0);
    assert_eq!(state_of(&handle, "A"), Some(PeerState::New));

    t.signaling.push_signal("A", offer("remote-offer")).await;
    assert!(wait_until(|| t.signaling.answers_to("A") == 1, 2000).await);
    assert_eq!(probe.count(&Call::AcceptOffer), 1);
    assert_eq!(state_of(&handle, "A"), Some(PeerState::Negotiating));
}

#[tokio::test]
async fn negotiation_before_joined_event_creates_the_session() {
    let t = rig("B");
    let handle = t.join("R1").await;

    // The offer outruns the participant-joined event.
    t.signaling.push_signal("A", offer("early-offer")).await;
    assert!(wait_until(|| t.signaling.answers_to("A") == 1, 2000).await);
    assert_eq!(handle.view().len(), 1);

    // The late joined event must not create a second session.
    t.signaling.push_joined("A").await;
    settle().await;
    assert_eq!(handle.view().len(), 1);
    assert_eq!(t.peers.connect_count("A"), 1);
}

#[tokio::test]
async fn out_of_order_answer_closes_only_that_session() {
    let t = rig("B");
    t.signaling.set_participants(&["A", "C"]);
    let handle = t.join("R1").await;
    assert!(wait_until(|| handle.view().len() == 2, 2000).await);
    let events = capture_events(&handle);

    // No offer is pending towards A, so an answer is contradictory.
    t.signaling.push_signal("A", answer("bogus")).await;
    assert!(wait_until(|| handle.view().get(&"A".into()).is_none(), 2000).await);
    assert_eq!(handle.view().len(), 1, "unrelated session was torn down");

    settle().await;
    let events = events.lock().expect("event store poisoned");
    assert!(events.iter().any(|e| matches!(
        e,
        RoomEvent::ParticipantDisconnected { id, reason: CloseReason::Negotiation }
            if id.as_str() == "A"
    )));
}

#[tokio::test]
async fn malformed_offer_closes_the_session() {
    let t = rig("B");
    t.signaling.set_participants(&["A"]);
    let handle = t.join("R1").await;
    let probe = t.peers.wait_probe("A", 2000).await;

    t.signaling.push_signal("A", offer("   ")).await;
    assert!(wait_until(|| handle.view().is_empty(), 2000).await);
    assert!(wait_until(|| probe.count(&Call::Close) == 1, 2000).await);
}

#[tokio::test]
async fn early_candidates_are_buffered_until_the_offer() {
    let t = rig("B");
    t.signaling.set_participants(&["A"]);
    let _handle = t.join("R1").await;
    let probe = t.peers.wait_probe("A", 2000).await;

    t.signaling.push_signal("A", candidate("cand-1")).await;
    t.signaling.push_signal("A", candidate("cand-2")).await;
    settle().await;
    assert_eq!(probe.count(&Call::AddCandidate), 0);

    t.signaling.push_signal("A", offer("remote-offer")).await;
    assert!(wait_until(|| probe.count(&Call::AddCandidate) == 2, 2000).await);

    // The description lands before the buffered candidates drain.
    let calls = probe.calls();
    let accept_at = calls
        .iter()
        .position(|c| *c == Call::AcceptOffer)
        .expect("no accept_offer recorded");
    let candidate_at = calls
        .iter()
        .position(|c| *c == Call::AddCandidate)
        .expect("no add_candidate recorded");
    assert!(accept_at < candidate_at);
}

#[tokio::test]
async fn glare_non_offerer_rolls_back_its_offer() {
    let t = rig("B");
    t.signaling.set_participants(&["A"]);
    let handle = t.join("R1").await;
    t.connect_as_answerer(&handle, "A").await;
    let probe = t.peers.wait_probe("A", 2000).await;

    // Renegotiation from the non-offerer side: adding media sends an offer.
    t.client
        .enable_media(MediaConstraints::audio_video())
        .await
        .expect("enable_media failed");
    assert!(wait_until(|| t.signaling.offers_to("A") == 1, 2000).await);

    // The real offerer's renegotiation collides with ours and wins.
    t.signaling.push_signal("A", offer("colliding-offer")).await;
    assert!(wait_until(|| probe.count(&Call::DiscardOffer) == 1, 2000).await);
    assert!(wait_until(|| t.signaling.answers_to("A") == 2, 2000).await);
    assert_eq!(state_of(&handle, "A"), Some(PeerState::Connected));
}

#[tokio::test]
async fn glare_offerer_keeps_its_own_offer() {
    let t = rig("A");
    t.signaling.set_participants(&["B"]);
    let handle = t.join("R1").await;
    t.connect_as_offerer(&handle, "B").await;
    let probe = t.peers.wait_probe("B", 2000).await;

    t.client
        .enable_media(MediaConstraints::audio_video())
        .await
        .expect("enable_media failed");
    assert!(wait_until(|| t.signaling.offers_to("B") == 2, 2000).await);

    // A colliding offer from the side that loses the tie-break is dropped.
    t.signaling.push_signal("B", offer("colliding-offer")).await;
    settle().await;
    assert_eq!(probe.count(&Call::DiscardOffer), 0);
    assert_eq!(t.signaling.answers_to("B"), 0);
    assert_eq!(state_of(&handle, "B"), Some(PeerState::Connected));
}

#[tokio::test]
async fn replaying_the_same_sequence_is_deterministic() {
    let mut outcomes = Vec::new();
    for _ in 0..2 {
        let t = rig("B");
        t.signaling.set_participants(&["A"]);
        let handle = t.join("R1").await;
        let probe = t.peers.wait_probe("A", 2000).await;

        t.signaling.push_signal("A", offer("remote-offer")).await;
        t.signaling.push_signal("A", candidate("cand-1")).await;
        t.signaling.push_signal("A", candidate("cand-2")).await;
        assert!(wait_until(|| probe.count(&Call::AddCandidate) == 2, 2000).await);

        outcomes.push((state_of(&handle, "A"), probe.calls()));
        t.client.leave().await;
    }
    assert_eq!(outcomes[0].0, Some(PeerState::Negotiating));
    assert_eq!(outcomes[0], outcomes[1]);
}
