use crate::peer::PeerState;
use thiserror::Error;
use univo_core::TrackKind;

/// The signaling channel could not be established or re-established.
///
/// Connect attempts are retried with exponential backoff; this error reaches
/// the caller only after the attempt budget is exhausted.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("signaling endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("signaling server rejected the join: {0}")]
    Rejected(String),

    #[error("signaling channel closed during handshake")]
    ChannelClosed,

    #[error("gave up connecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

/// A local capture device could not be acquired or driven.
///
/// Fatal for that capability, surfaced immediately and never retried
/// automatically. Existing peer sessions are unaffected.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("permission denied for {0} capture")]
    PermissionDenied(TrackKind),

    #[error("no {0} device available")]
    NoDevice(TrackKind),

    #[error("{kind} device failed: {reason}")]
    Device { kind: TrackKind, reason: String },
}

/// A negotiation payload was malformed or arrived in a state that cannot
/// accept it. The offending peer session is closed; others are unaffected.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("malformed {kind} payload: {reason}")]
    Malformed { kind: &'static str, reason: String },

    #[error("unexpected {kind} in state {state}")]
    OutOfOrder { kind: &'static str, state: PeerState },

    #[error("peer transport error")]
    Transport(#[source] anyhow::Error),

    #[error("peer session is closed")]
    SessionClosed,
}

/// A session stayed in `reconnecting` past the configured grace period.
#[derive(Debug, Error)]
#[error("reconnection window of {grace_secs}s elapsed")]
pub struct TimeoutError {
    pub grace_secs: u64,
}
