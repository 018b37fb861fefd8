use crate::error::NegotiationError;
use crate::media::LocalTrackHandle;
use async_trait::async_trait;
use tokio::sync::mpsc;
use univo_core::{NegotiationPayload, ParticipantId, RemoteTrack};

/// Events an underlying peer connection pushes up to its session.
#[derive(Debug)]
pub enum TransportEvent {
    /// The connection reached an established state.
    Connected,
    /// Connectivity was lost; the connection may still recover.
    Disconnected,
    /// The connection failed unrecoverably.
    Failed(String),
    /// A remote media track arrived.
    TrackReceived(RemoteTrack),
    /// A local ICE candidate is ready to be signaled to the peer.
    /// Always the `IceCandidate` payload variant.
    CandidateGenerated(NegotiationPayload),
}

/// One underlying peer connection, driven by exactly one session.
///
/// Implementations report connectivity and inbound media through the event
/// channel handed to the connector; the session serializes all calls, so
/// `&mut self` is enough.
#[async_trait]
pub trait PeerTransport: Send {
    /// Create a local offer and install it as the local description.
    async fn create_offer(&mut self, ice_restart: bool) -> Result<String, NegotiationError>;

    /// Apply a remote offer and produce the local answer.
    async fn accept_offer(&mut self, sdp: &str) -> Result<String, NegotiationError>;

    /// Apply the remote answer to our pending offer.
    async fn accept_answer(&mut self, sdp: &str) -> Result<(), NegotiationError>;

    async fn add_remote_candidate(
        &mut self,
        candidate: &str,
        sdp_mid: Option<String>,
        sdp_mline_index: Option<u16>,
    ) -> Result<(), NegotiationError>;

    async fn add_local_track(&mut self, track: &LocalTrackHandle)
    -> Result<(), NegotiationError>;

    async fn remove_local_track(&mut self, track_id: &str) -> Result<(), NegotiationError>;

    /// Drop a pending local offer so a remote one can take precedence
    /// (offer glare, lost by the non-offerer side).
    async fn discard_pending_offer(&mut self) -> Result<(), NegotiationError>;

    async fn close(&mut self);
}

/// Factory for peer transports, owned by the room coordinator. Carries the
/// ICE configuration; tests substitute a scripted implementation.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(
        &self,
        peer: &ParticipantId,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn PeerTransport>, NegotiationError>;
}
