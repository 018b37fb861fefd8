//! Session orchestration core for multi-participant meetings.
//!
//! Turns a logical room into a mesh of live peer connections coordinated
//! over a signaling channel: the [`room::RoomCoordinator`] owns one
//! [`peer::PeerSession`] per remote participant, the
//! [`media::LocalMediaController`] owns the capture devices, and the
//! [`monitor`] aggregates health into a single room-level signal.

pub mod config;
pub mod error;
pub mod media;
pub mod monitor;
pub mod peer;
pub mod room;
pub mod signaling;

pub use config::{RtcConfig, SignalingConfig};
pub use error::{ConnectError, MediaError, NegotiationError, TimeoutError};
pub use media::{
    CaptureDevice, LocalMediaController, LocalMediaHandle, LocalTrackHandle, MediaConstraints,
    MediaDevices, SampleDevices,
};
pub use monitor::{ConnectionHealth, HealthReport, RoomHealth, SignalingStatus};
pub use peer::{
    CloseReason, PeerConnector, PeerState, PeerTransport, TransportEvent, WebRtcConnector,
    local_is_offerer,
};
pub use room::{ParticipantInfo, RoomClient, RoomEvent, RoomHandle, RoomView};
pub use signaling::{
    SignalingConn, SignalingConnector, SignalingEvent, SignalingHandle, SignalingTransport,
    WsConnector,
};
