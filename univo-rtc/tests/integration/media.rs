use crate::integration::{rig, settle, state_of, wait_until};
use crate::utils::Call;
use univo_rtc::media::MediaConstraints;
use univo_rtc::peer::PeerState;

#[tokio::test]
async fn toggling_tracks_never_touches_sessions() {
    let t = rig("A");
    t.signaling.set_participants(&["B"]);
    let handle = t.join("R1").await;
    t.client
        .enable_media(MediaConstraints::audio_video())
        .await
        .expect("enable_media failed");
    t.connect_as_offerer(&handle, "B").await;
    let probe = t.peers.wait_probe("B", 2000).await;

    settle().await;
    let calls_before = probe.calls().len();
    let sent_before = t.signaling.sent().len();

    t.client.set_video_enabled(false);
    t.client.set_audio_enabled(false);
    t.client.set_video_enabled(true);
    t.client.set_audio_enabled(true);
    settle().await;

    // Flag-only: no renegotiation, no signaling traffic, no state change.
    assert_eq!(probe.calls().len(), calls_before);
    assert_eq!(t.signaling.sent().len(), sent_before);
    assert_eq!(state_of(&handle, "B"), Some(PeerState::Connected));
}

#[tokio::test]
async fn attaching_media_to_a_connected_session_renegotiates() {
    let t = rig("A");
    t.signaling.set_participants(&["B"]);
    let handle = t.join("R1").await;
    t.connect_as_offerer(&handle, "B").await;
    let probe = t.peers.wait_probe("B", 2000).await;
    assert_eq!(t.signaling.offers_to("B"), 1);

    t.client
        .enable_media(MediaConstraints::audio_video())
        .await
        .expect("enable_media failed");

    assert!(wait_until(|| t.signaling.offers_to("B") == 2, 2000).await);
    assert_eq!(probe.calls().iter().filter(|c| matches!(c, Call::AddTrack(_))).count(), 2);
}

#[tokio::test]
async fn existing_media_is_attached_to_new_sessions() {
    let t = rig("A");
    let handle = t.join("R1").await;
    t.client
        .enable_media(MediaConstraints::audio_video())
        .await
        .expect("enable_media failed");

    t.signaling.push_joined("B").await;
    let probe = t.peers.wait_probe("B", 2000).await;
    assert!(wait_until(|| t.signaling.offers_to("B") == 1, 2000).await);

    let calls = probe.calls();
    let tracks_added = calls.iter().filter(|c| matches!(c, Call::AddTrack(_))).count();
    assert_eq!(tracks_added, 2);

    // Tracks go in before the initial offer so one exchange covers them.
    let first_offer = calls
        .iter()
        .position(|c| matches!(c, Call::CreateOffer { .. }))
        .expect("no offer recorded");
    let first_track = calls
        .iter()
        .position(|c| matches!(c, Call::AddTrack(_)))
        .expect("no track recorded");
    assert!(first_track < first_offer);
    drop(handle);
}

#[tokio::test]
async fn repeated_enable_media_does_not_reacquire_or_renegotiate() {
    let t = rig("A");
    t.signaling.set_participants(&["B"]);
    let handle = t.join("R1").await;
    t.client
        .enable_media(MediaConstraints::audio_video())
        .await
        .expect("enable_media failed");
    t.connect_as_offerer(&handle, "B").await;
    assert_eq!(t.devices.opens(), 2);

    settle().await;
    let offers_before = t.signaling.offers_to("B");

    t.client
        .enable_media(MediaConstraints::audio_video())
        .await
        .expect("second enable_media failed");
    settle().await;

    assert_eq!(t.devices.opens(), 2, "devices were reacquired");
    assert_eq!(t.signaling.offers_to("B"), offers_before, "redundant renegotiation");
}

#[tokio::test]
async fn camera_denial_leaves_audio_and_sessions_intact() {
    let t = rig("A");
    t.signaling.set_participants(&["B"]);
    let handle = t.join("R1").await;
    t.connect_as_offerer(&handle, "B").await;

    t.devices.deny_video(true);
    let denied = t
        .client
        .enable_media(MediaConstraints::audio_video())
        .await;
    assert!(denied.is_err(), "expected video permission failure");

    // The meeting continues audio-only: the audio device stays acquired and
    // no session was harmed.
    assert_eq!(t.client.media().acquired_count(), 1);
    assert_eq!(state_of(&handle, "B"), Some(PeerState::Connected));

    let audio_only = t
        .client
        .enable_media(MediaConstraints {
            audio: true,
            video: false,
        })
        .await
        .expect("audio-only enable_media failed");
    assert_eq!(audio_only.tracks.len(), 1);
    assert!(wait_until(|| t.signaling.offers_to("B") == 2, 2000).await);
}
