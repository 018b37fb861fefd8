use crate::error::NegotiationError;
use crate::media::LocalTrackHandle;
use tokio::sync::oneshot;
use univo_core::ParticipantId;

/// Commands entering the coordinator from the room handle and the monitor.
pub enum RoomCommand {
    /// Fan the given tracks out to every live session. The reply lists the
    /// sessions that failed; an empty list means everyone took the update.
    AttachMedia {
        tracks: Vec<LocalTrackHandle>,
        reply: oneshot::Sender<Vec<(ParticipantId, NegotiationError)>>,
    },

    DetachMedia {
        track_ids: Vec<String>,
        reply: oneshot::Sender<Vec<(ParticipantId, NegotiationError)>>,
    },

    /// From the monitor: this peer overstayed the reconnection grace
    /// period. The coordinator re-checks the state before closing.
    ExpirePeer { peer: ParticipantId },

    /// Tear everything down. `done` fires once every session is closed and
    /// the media controller released, whether or not the caller is still
    /// listening.
    Leave { done: oneshot::Sender<()> },
}
