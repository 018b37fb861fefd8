use crate::error::NegotiationError;
use crate::media::LocalTrackHandle;
use crate::peer::transport::{PeerConnector, PeerTransport, TransportEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use univo_core::{IceServerConfig, NegotiationPayload, ParticipantId, RemoteTrack, TrackKind};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;

/// Factory for webrtc-rs backed peer transports. Holds the ICE descriptors
/// handed in at session establishment and passes them through unchanged.
pub struct WebRtcConnector {
    ice_servers: Vec<IceServerConfig>,
}

impl WebRtcConnector {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self { ice_servers }
    }
}

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn connect(
        &self,
        peer: &ParticipantId,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn PeerTransport>, NegotiationError> {
        let transport = WebRtcTransport::new(peer.clone(), self.ice_servers.clone(), events)
            .await
            .map_err(NegotiationError::Transport)?;
        Ok(Box::new(transport))
    }
}

/// A webrtc-rs peer connection pumping its callbacks into the session's
/// event channel.
pub struct WebRtcTransport {
    peer: ParticipantId,
    ice_servers: Vec<IceServerConfig>,
    events: mpsc::Sender<TransportEvent>,
    pc: Arc<RTCPeerConnection>,
    senders: HashMap<String, Arc<RTCRtpSender>>,
    tracks: Vec<LocalTrackHandle>,
}

impl WebRtcTransport {
    async fn new(
        peer: ParticipantId,
        ice_servers: Vec<IceServerConfig>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Self> {
        let pc = build_peer_connection(&peer, &ice_servers, events.clone()).await?;
        Ok(Self {
            peer,
            ice_servers,
            events,
            pc,
            senders: HashMap::new(),
            tracks: Vec::new(),
        })
    }

    /// Tear the connection down and build a fresh one with the same
    /// configuration and local tracks. webrtc-rs has no SDP rollback, so
    /// this is how a pending local offer is abandoned.
    async fn rebuild(&mut self) -> Result<(), NegotiationError> {
        info!("rebuilding peer connection for {}", self.peer);
        let _ = self.pc.close().await;
        self.senders.clear();

        let pc = build_peer_connection(&self.peer, &self.ice_servers, self.events.clone())
            .await
            .map_err(NegotiationError::Transport)?;
        self.pc = pc;

        let tracks = self.tracks.clone();
        self.tracks.clear();
        for track in &tracks {
            self.add_local_track(track).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl PeerTransport for WebRtcTransport {
    async fn create_offer(&mut self, ice_restart: bool) -> Result<String, NegotiationError> {
        let options = ice_restart.then(|| RTCOfferOptions {
            ice_restart: true,
            ..Default::default()
        });
        let offer = self
            .pc
            .create_offer(options)
            .await
            .context("create_offer failed")
            .map_err(NegotiationError::Transport)?;
        self.pc
            .set_local_description(offer.clone())
            .await
            .context("set_local_description(offer) failed")
            .map_err(NegotiationError::Transport)?;
        Ok(offer.sdp)
    }

    async fn accept_offer(&mut self, sdp: &str) -> Result<String, NegotiationError> {
        let desc =
            RTCSessionDescription::offer(sdp.to_owned()).map_err(|e| {
                NegotiationError::Malformed {
                    kind: "offer",
                    reason: e.to_string(),
                }
            })?;
        self.pc
            .set_remote_description(desc)
            .await
            .context("set_remote_description(offer) failed")
            .map_err(NegotiationError::Transport)?;

        let answer = self
            .pc
            .create_answer(None)
            .await
            .context("create_answer failed")
            .map_err(NegotiationError::Transport)?;
        self.pc
            .set_local_description(answer.clone())
            .await
            .context("set_local_description(answer) failed")
            .map_err(NegotiationError::Transport)?;
        Ok(answer.sdp)
    }

    async fn accept_answer(&mut self, sdp: &str) -> Result<(), NegotiationError> {
        let desc =
            RTCSessionDescription::answer(sdp.to_owned()).map_err(|e| {
                NegotiationError::Malformed {
                    kind: "answer",
                    reason: e.to_string(),
                }
            })?;
        self.pc
            .set_remote_description(desc)
            .await
            .context("set_remote_description(answer) failed")
            .map_err(NegotiationError::Transport)
    }

    async fn add_remote_candidate(
        &mut self,
        candidate: &str,
        sdp_mid: Option<String>,
        sdp_mline_index: Option<u16>,
    ) -> Result<(), NegotiationError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.to_owned(),
            sdp_mid,
            sdp_mline_index,
            ..Default::default()
        };
        self.pc
            .add_ice_candidate(init)
            .await
            .context("add_ice_candidate failed")
            .map_err(NegotiationError::Transport)
    }

    async fn add_local_track(
        &mut self,
        track: &LocalTrackHandle,
    ) -> Result<(), NegotiationError> {
        let rtc_track: Arc<dyn TrackLocal + Send + Sync> = track.rtc_track();
        let sender = self
            .pc
            .add_track(rtc_track)
            .await
            .context("add_track failed")
            .map_err(NegotiationError::Transport)?;
        self.senders.insert(track.id().to_owned(), sender);
        self.tracks.push(track.clone());
        Ok(())
    }

    async fn remove_local_track(&mut self, track_id: &str) -> Result<(), NegotiationError> {
        self.tracks.retain(|t| t.id() != track_id);
        if let Some(sender) = self.senders.remove(track_id) {
            self.pc
                .remove_track(&sender)
                .await
                .context("remove_track failed")
                .map_err(NegotiationError::Transport)?;
        }
        Ok(())
    }

    async fn discard_pending_offer(&mut self) -> Result<(), NegotiationError> {
        self.rebuild().await
    }

    async fn close(&mut self) {
        if let Err(e) = self.pc.close().await {
            debug!("peer connection close for {}: {e}", self.peer);
        }
    }
}

/// Teacher-style construction: media engine with default codecs, default
/// interceptors, ICE servers from configuration, callbacks pumping into the
/// session's event channel.
async fn build_peer_connection(
    peer: &ParticipantId,
    ice_servers: &[IceServerConfig],
    events: mpsc::Sender<TransportEvent>,
) -> Result<Arc<RTCPeerConnection>> {
    let mut media = MediaEngine::default();
    media.register_default_codecs()?;
    let registry = register_default_interceptors(Registry::new(), &mut media)?;

    let api = APIBuilder::new()
        .with_media_engine(media)
        .with_interceptor_registry(registry)
        .build();

    let rtc_config = RTCConfiguration {
        ice_servers: ice_servers
            .iter()
            .map(|s| RTCIceServer {
                urls: s.urls.clone(),
                username: s.username.clone().unwrap_or_default(),
                credential: s.credential.clone().unwrap_or_default(),
            })
            .collect(),
        ..Default::default()
    };

    let pc = Arc::new(api.new_peer_connection(rtc_config).await?);

    let state_tx = events.clone();
    let state_peer = peer.clone();
    pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
        let tx = state_tx.clone();
        let peer = state_peer.clone();

        Box::pin(async move {
            info!("peer connection state for {}: {:?}", peer, s);
            let event = match s {
                RTCPeerConnectionState::Connected => Some(TransportEvent::Connected),
                RTCPeerConnectionState::Disconnected => Some(TransportEvent::Disconnected),
                RTCPeerConnectionState::Failed => {
                    Some(TransportEvent::Failed("peer connection failed".into()))
                }
                _ => None,
            };
            if let Some(event) = event {
                let _ = tx.send(event).await;
            }
        })
    }));

    let ice_tx = events.clone();
    pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
        let tx = ice_tx.clone();

        Box::pin(async move {
            let Some(candidate) = c else { return };
            let init = match candidate.to_json() {
                Ok(init) => init,
                Err(e) => {
                    warn!("failed to serialize local ICE candidate: {e}");
                    return;
                }
            };
            let payload = NegotiationPayload::IceCandidate {
                candidate: init.candidate,
                sdp_mid: init.sdp_mid,
                sdp_mline_index: init.sdp_mline_index,
            };
            let _ = tx.send(TransportEvent::CandidateGenerated(payload)).await;
        })
    }));

    let track_tx = events;
    let track_peer = peer.clone();
    pc.on_track(Box::new(move |track, _receiver, _transceiver| {
        let tx = track_tx.clone();
        let peer = track_peer.clone();

        Box::pin(async move {
            let kind = if track.kind() == RTPCodecType::Audio {
                TrackKind::Audio
            } else {
                TrackKind::Video
            };
            let remote = RemoteTrack {
                id: track.id(),
                kind,
            };
            info!("remote {} track from {}", kind, peer);
            let _ = tx.send(TransportEvent::TrackReceived(remote)).await;
        })
    }));

    Ok(pc)
}
