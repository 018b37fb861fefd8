use serde::{Deserialize, Serialize};
use std::fmt;

/// The two capture/track kinds a participant can publish.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// Metadata for a media track received from a remote peer.
///
/// The media bytes themselves stay inside the underlying transport; consumers
/// that need them (recording, analytics) subscribe through the transport
/// layer. This struct is what the participant view exposes.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct RemoteTrack {
    pub id: String,
    pub kind: TrackKind,
}
