use crate::error::NegotiationError;
use crate::media::LocalTrackHandle;
use crate::monitor::HealthReport;
use crate::room::command::RoomCommand;
use crate::room::view::{RoomEvent, RoomView};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use univo_core::{ParticipantId, RoomId};

/// Cloneable handle to a joined room.
///
/// Dropping every handle does not leave the room; call [`RoomHandle::leave`]
/// (or [`crate::room::RoomClient::leave`]) for that. Teardown runs in the
/// coordinator task, so cancelling the `leave` future still cleans up.
#[derive(Clone)]
pub struct RoomHandle {
    room: RoomId,
    cmd_tx: mpsc::UnboundedSender<RoomCommand>,
    view: RoomView,
    events: broadcast::Sender<RoomEvent>,
    health: watch::Receiver<HealthReport>,
}

impl RoomHandle {
    pub(crate) fn new(
        room: RoomId,
        cmd_tx: mpsc::UnboundedSender<RoomCommand>,
        view: RoomView,
        events: broadcast::Sender<RoomEvent>,
        health: watch::Receiver<HealthReport>,
    ) -> Self {
        Self {
            room,
            cmd_tx,
            view,
            events,
            health,
        }
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// The always-current participant view. Read-only for callers.
    pub fn view(&self) -> &RoomView {
        &self.view
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    /// One aggregated health signal for the whole room.
    pub fn health(&self) -> watch::Receiver<HealthReport> {
        self.health.clone()
    }

    pub fn is_alive(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// Leave the room. Returns once teardown finished; cancelling the await
    /// does not cancel the teardown itself.
    pub async fn leave(&self) {
        let (done, rx) = oneshot::channel();
        if self.cmd_tx.send(RoomCommand::Leave { done }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Add local tracks to every live session. Returns the sessions the
    /// update failed for; from the caller's perspective the attach has been
    /// applied everywhere else once this returns.
    pub async fn attach_media(
        &self,
        tracks: Vec<LocalTrackHandle>,
    ) -> Vec<(ParticipantId, NegotiationError)> {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(RoomCommand::AttachMedia { tracks, reply })
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn detach_media(
        &self,
        track_ids: Vec<String>,
    ) -> Vec<(ParticipantId, NegotiationError)> {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(RoomCommand::DetachMedia { track_ids, reply })
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }
}
