pub mod media;
pub mod negotiation;

use crate::utils::{MockDevices, MockPeers, MockSignaling};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::Level;
use univo_core::{NegotiationPayload, ParticipantId, RoomId};
use univo_rtc::RtcConfig;
use univo_rtc::media::MediaDevices;
use univo_rtc::peer::PeerState;
use univo_rtc::room::{RoomClient, RoomEvent, RoomHandle};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub struct TestRig {
    pub client: RoomClient,
    pub signaling: MockSignaling,
    pub peers: MockPeers,
    pub devices: Arc<MockDevices>,
}

pub fn rig(local: &str) -> TestRig {
    rig_with_config(local, RtcConfig::default())
}

pub fn rig_with_config(local: &str, config: RtcConfig) -> TestRig {
    init_tracing();
    let signaling = MockSignaling::new();
    let peers = MockPeers::new();
    let devices = Arc::new(MockDevices::new());
    let client = RoomClient::new(
        config,
        ParticipantId::from(local),
        signaling.connector(),
        peers.connector(),
        Arc::clone(&devices) as Arc<dyn MediaDevices>,
    );
    TestRig {
        client,
        signaling,
        peers,
        devices,
    }
}

impl TestRig {
    pub async fn join(&self, room: &str) -> RoomHandle {
        self.client
            .join(RoomId::from(room))
            .await
            .expect("join failed")
    }

    /// Drive one offerer-side session (local id smaller than `peer`) all the
    /// way to `Connected`: wait for our offer, answer it, report the
    /// transport as established.
    pub async fn connect_as_offerer(&self, handle: &RoomHandle, peer: &str) {
        let probe = self.peers.wait_probe(peer, 2000).await;
        let sig = self.signaling.clone();
        let p = peer.to_owned();
        assert!(
            wait_until(move || sig.offers_to(&p) >= 1, 2000).await,
            "no offer sent to {peer}"
        );
        self.signaling
            .push_signal(
                peer,
                NegotiationPayload::Answer {
                    sdp: "remote-answer".into(),
                },
            )
            .await;
        probe.emit(univo_rtc::TransportEvent::Connected).await;
        assert!(
            wait_state(handle, peer, PeerState::Connected, 2000).await,
            "{peer} never reached connected"
        );
    }

    /// Drive one answerer-side session (local id greater than `peer`) to
    /// `Connected` by sending the remote offer first.
    pub async fn connect_as_answerer(&self, handle: &RoomHandle, peer: &str) {
        let probe = self.peers.wait_probe(peer, 2000).await;
        self.signaling
            .push_signal(
                peer,
                NegotiationPayload::Offer {
                    sdp: "remote-offer".into(),
                },
            )
            .await;
        let sig = self.signaling.clone();
        let p = peer.to_owned();
        assert!(
            wait_until(move || sig.answers_to(&p) >= 1, 2000).await,
            "no answer sent to {peer}"
        );
        probe.emit(univo_rtc::TransportEvent::Connected).await;
        assert!(
            wait_state(handle, peer, PeerState::Connected, 2000).await,
            "{peer} never reached connected"
        );
    }
}

pub async fn wait_until<F>(pred: F, timeout_ms: u64) -> bool
where
    F: Fn() -> bool,
{
    let start = tokio::time::Instant::now();
    loop {
        if pred() {
            return true;
        }
        if start.elapsed().as_millis() > timeout_ms as u128 {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Let queued events drain.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

pub fn state_of(handle: &RoomHandle, peer: &str) -> Option<PeerState> {
    handle
        .view()
        .get(&ParticipantId::from(peer))
        .map(|info| info.state)
}

pub async fn wait_state(handle: &RoomHandle, peer: &str, state: PeerState, timeout_ms: u64) -> bool {
    wait_until(|| state_of(handle, peer) == Some(state), timeout_ms).await
}

/// Record room events into a shared vec for later assertions.
pub fn capture_events(handle: &RoomHandle) -> Arc<Mutex<Vec<RoomEvent>>> {
    let mut rx = handle.subscribe();
    let store: Arc<Mutex<Vec<RoomEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&store);
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            sink.lock().expect("event store poisoned").push(event);
        }
    });
    store
}
