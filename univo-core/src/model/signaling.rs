use crate::model::participant::ParticipantId;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};

/// ICE/STUN/TURN server descriptor, passed through unchanged to the
/// connection-establishment layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Per-peer negotiation payload.
///
/// This is a closed set: the wire may only carry an offer, an answer or a
/// trickle-ICE candidate. Anything else fails deserialization before it can
/// reach a peer session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NegotiationPayload {
    Offer {
        sdp: String,
    },
    Answer {
        sdp: String,
    },
    IceCandidate {
        candidate: String,
        sdp_mid: Option<String>,
        sdp_mline_index: Option<u16>,
    },
}

impl NegotiationPayload {
    /// Short tag for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            NegotiationPayload::Offer { .. } => "offer",
            NegotiationPayload::Answer { .. } => "answer",
            NegotiationPayload::IceCandidate { .. } => "ice-candidate",
        }
    }
}

/// Messages the client sends to the signaling server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d", rename_all = "kebab-case")]
pub enum ClientMessage {
    Join {
        room: RoomId,
    },
    Leave,
    Signal {
        to: ParticipantId,
        payload: NegotiationPayload,
    },
}

/// Messages the signaling server sends to the client.
///
/// The server guarantees per-peer ordering of `Signal` messages; messages for
/// different peers carry no relative ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d", rename_all = "kebab-case")]
pub enum ServerMessage {
    RoomJoined {
        room: RoomId,
        participants: Vec<ParticipantId>,
    },
    ParticipantJoined {
        id: ParticipantId,
    },
    ParticipantLeft {
        id: ParticipantId,
    },
    Signal {
        from: ParticipantId,
        payload: NegotiationPayload,
    },
}
