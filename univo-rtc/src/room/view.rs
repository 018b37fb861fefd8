use crate::peer::{CloseReason, PeerState};
use dashmap::DashMap;
use std::sync::Arc;
use univo_core::{ParticipantId, RemoteTrack};

/// What the view exposes per remote participant.
#[derive(Debug, Clone)]
pub struct ParticipantInfo {
    pub state: PeerState,
    pub tracks: Vec<RemoteTrack>,
}

/// Read-only, always-current map of the room's remote participants.
///
/// The coordinator is the only writer; everyone else (UI, recording,
/// analytics) reads. Cloning shares the same underlying map.
#[derive(Clone, Default)]
pub struct RoomView {
    inner: Arc<DashMap<ParticipantId, ParticipantInfo>>,
}

impl RoomView {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ParticipantId) -> Option<ParticipantInfo> {
        self.inner.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn participants(&self) -> Vec<ParticipantId> {
        self.inner.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Point-in-time copy of the whole view.
    pub fn snapshot(&self) -> Vec<(ParticipantId, ParticipantInfo)> {
        self.inner
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub(crate) fn insert(&self, id: ParticipantId, state: PeerState) {
        self.inner.insert(
            id,
            ParticipantInfo {
                state,
                tracks: Vec::new(),
            },
        );
    }

    pub(crate) fn set_state(&self, id: &ParticipantId, state: PeerState) {
        if let Some(mut entry) = self.inner.get_mut(id) {
            entry.state = state;
        }
    }

    pub(crate) fn push_track(&self, id: &ParticipantId, track: RemoteTrack) {
        if let Some(mut entry) = self.inner.get_mut(id) {
            entry.tracks.push(track);
        }
    }

    pub(crate) fn remove(&self, id: &ParticipantId) {
        self.inner.remove(id);
    }

    pub(crate) fn clear(&self) {
        self.inner.clear();
    }
}

/// Asynchronous notifications for external consumers.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    ParticipantJoined(ParticipantId),
    /// Graceful departure announced over signaling.
    ParticipantLeft(ParticipantId),
    /// The session was closed for any other reason (timeout, negotiation
    /// error, transport failure).
    ParticipantDisconnected {
        id: ParticipantId,
        reason: CloseReason,
    },
    TrackAdded {
        id: ParticipantId,
        track: RemoteTrack,
    },
    StateChanged {
        id: ParticipantId,
        state: PeerState,
    },
}
