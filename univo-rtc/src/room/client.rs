use crate::config::RtcConfig;
use crate::error::{ConnectError, MediaError};
use crate::media::{
    LocalMediaController, LocalMediaHandle, MediaConstraints, MediaDevices, SampleDevices,
};
use crate::peer::{PeerConnector, WebRtcConnector};
use crate::room::coordinator::RoomCoordinator;
use crate::room::handle::RoomHandle;
use crate::signaling::{SignalingConnector, WsConnector};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use univo_core::{ParticipantId, RoomId};
use url::Url;

/// Entry point for whoever manages the meeting lifecycle (typically the UI
/// layer). Explicitly constructed and torn down; nothing here relies on
/// process-lifetime cleanup.
pub struct RoomClient {
    config: RtcConfig,
    local: ParticipantId,
    signaling: Arc<dyn SignalingConnector>,
    peers: Arc<dyn PeerConnector>,
    media: Arc<LocalMediaController>,
    active: Mutex<Option<RoomHandle>>,
}

impl RoomClient {
    pub fn new(
        config: RtcConfig,
        local: ParticipantId,
        signaling: Arc<dyn SignalingConnector>,
        peers: Arc<dyn PeerConnector>,
        devices: Arc<dyn MediaDevices>,
    ) -> Self {
        Self {
            config,
            local,
            signaling,
            peers,
            media: Arc::new(LocalMediaController::new(devices)),
            active: Mutex::new(None),
        }
    }

    /// Production wiring: WebSocket signaling against `endpoint`, webrtc-rs
    /// peer transports fed the configured ICE servers, static-sample capture
    /// tracks.
    pub fn over_websocket(config: RtcConfig, local: ParticipantId, endpoint: Url) -> Self {
        let peers = Arc::new(WebRtcConnector::new(config.ice_servers.clone()));
        Self::new(
            config,
            local,
            Arc::new(WsConnector::new(endpoint)),
            peers,
            Arc::new(SampleDevices),
        )
    }

    pub fn local_id(&self) -> &ParticipantId {
        &self.local
    }

    /// Join a room. Joining while already joined is a no-op that returns
    /// the existing handle.
    pub async fn join(&self, room: RoomId) -> Result<RoomHandle, ConnectError> {
        let mut active = self.active.lock().await;
        if let Some(handle) = active.as_ref() {
            if handle.is_alive() {
                debug!("already in {}, join({}) is a no-op", handle.room(), room);
                return Ok(handle.clone());
            }
        }

        let handle = RoomCoordinator::spawn(
            self.config.clone(),
            room,
            self.local.clone(),
            Arc::clone(&self.signaling),
            Arc::clone(&self.peers),
            Arc::clone(&self.media),
        )
        .await?;
        *active = Some(handle.clone());
        Ok(handle)
    }

    /// Leave the current room, if any. Guaranteed cleanup: every peer
    /// session is closed and the media controller released even if the
    /// caller stops awaiting.
    pub async fn leave(&self) {
        let handle = self.active.lock().await.take();
        if let Some(handle) = handle {
            handle.leave().await;
        }
    }

    /// Acquire capture devices per the constraints and fan the tracks out
    /// to every live session. Device failure surfaces immediately and does
    /// not touch existing sessions, so a meeting can go on audio-only after
    /// a camera failure.
    pub async fn enable_media(
        &self,
        constraints: MediaConstraints,
    ) -> Result<LocalMediaHandle, MediaError> {
        let handle = self.media.acquire(constraints).await?;
        let active = self.active.lock().await;
        if let Some(room) = active.as_ref() {
            for (id, e) in room.attach_media(handle.tracks.clone()).await {
                warn!("attaching local media to {} failed: {e}", id);
            }
        }
        Ok(handle)
    }

    /// Flag-only toggle; never touches device acquisition or sessions.
    pub fn set_video_enabled(&self, enabled: bool) {
        self.media.set_video_enabled(enabled);
    }

    /// Flag-only toggle; never touches device acquisition or sessions.
    pub fn set_audio_enabled(&self, enabled: bool) {
        self.media.set_audio_enabled(enabled);
    }

    pub fn media(&self) -> &LocalMediaController {
        &self.media
    }
}
