use crate::error::NegotiationError;
use crate::media::LocalTrackHandle;
use crate::peer::state::PeerState;
use crate::peer::transport::{PeerTransport, TransportEvent};
use crate::signaling::SignalingHandle;
use std::collections::HashSet;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use univo_core::{NegotiationPayload, ParticipantId, RemoteTrack};

/// Deterministic offerer election: the lexicographically smaller id is the
/// offerer. Both ends order the same pair identically, so the roles never
/// collide and offer glare resolves without a central arbiter.
pub fn local_is_offerer(local: &ParticipantId, remote: &ParticipantId) -> bool {
    local < remote
}

/// Why a session reached `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The participant left the room.
    PeerLeft,
    /// The local side left (or lost) the room.
    RoomLeft,
    /// The reconnection grace period elapsed.
    Timeout,
    /// A malformed or contradictory negotiation payload.
    Negotiation,
    /// The underlying connection failed unrecoverably.
    TransportFailed,
}

/// Commands the coordinator sends into a session's queue. One queue consumer
/// per peer gives the per-peer mutual exclusion the negotiation state
/// machine needs; separate queues keep peers fully independent.
pub enum SessionCommand {
    ApplySignal(NegotiationPayload),
    AttachMedia {
        tracks: Vec<LocalTrackHandle>,
        ack: oneshot::Sender<Result<(), NegotiationError>>,
    },
    DetachMedia {
        track_ids: Vec<String>,
        ack: oneshot::Sender<Result<(), NegotiationError>>,
    },
    Close(CloseReason),
}

#[derive(Debug)]
pub enum SessionEventKind {
    StateChanged(PeerState),
    TrackAdded(RemoteTrack),
    Closed(CloseReason),
}

/// Fan-in event from a session to the coordinator.
#[derive(Debug)]
pub struct SessionEvent {
    pub peer: ParticipantId,
    pub kind: SessionEventKind,
}

/// Cheap handle the coordinator keeps per session.
#[derive(Clone)]
pub struct SessionHandle {
    peer: ParticipantId,
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn peer(&self) -> &ParticipantId {
        &self.peer
    }

    pub fn apply_signal(&self, payload: NegotiationPayload) {
        let _ = self.cmd_tx.send(SessionCommand::ApplySignal(payload));
    }

    /// Returns the ack receiver so the caller can collect per-session
    /// attach results without blocking the coordinator loop per session.
    pub fn attach_media(
        &self,
        tracks: Vec<LocalTrackHandle>,
    ) -> oneshot::Receiver<Result<(), NegotiationError>> {
        let (ack, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(SessionCommand::AttachMedia { tracks, ack });
        rx
    }

    pub fn detach_media(
        &self,
        track_ids: Vec<String>,
    ) -> oneshot::Receiver<Result<(), NegotiationError>> {
        let (ack, rx) = oneshot::channel();
        let _ = self
            .cmd_tx
            .send(SessionCommand::DetachMedia { track_ids, ack });
        rx
    }

    pub fn close(&self, reason: CloseReason) {
        let _ = self.cmd_tx.send(SessionCommand::Close(reason));
    }
}

#[derive(PartialEq)]
enum Flow {
    Continue,
    Stop,
}

/// One remote participant's connection: owns the transport, the negotiation
/// state machine and the remote tracks received over it.
pub struct PeerSession {
    local: ParticipantId,
    peer: ParticipantId,
    offerer: bool,
    state: PeerState,
    transport: Box<dyn PeerTransport>,
    offer_pending: bool,
    remote_described: bool,
    queued_candidates: Vec<(String, Option<String>, Option<u16>)>,
    attached: HashSet<String>,
    cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    signaling: SignalingHandle,
}

impl PeerSession {
    /// Spawn the session task. The returned handle is the only way in; the
    /// events channel is the only way out.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        local: ParticipantId,
        peer: ParticipantId,
        transport: Box<dyn PeerTransport>,
        transport_rx: mpsc::Receiver<TransportEvent>,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
        signaling: SignalingHandle,
        initial_tracks: Vec<LocalTrackHandle>,
    ) -> SessionHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let offerer = local_is_offerer(&local, &peer);
        let session = Self {
            local,
            peer: peer.clone(),
            offerer,
            state: PeerState::New,
            transport,
            offer_pending: false,
            remote_described: false,
            queued_candidates: Vec::new(),
            attached: HashSet::new(),
            cmd_rx,
            transport_rx,
            events_tx,
            signaling,
        };
        tokio::spawn(session.run(initial_tracks));
        SessionHandle { peer, cmd_tx }
    }

    async fn run(mut self, initial_tracks: Vec<LocalTrackHandle>) {
        info!(
            "peer session started: {} -> {} (offerer={})",
            self.local, self.peer, self.offerer
        );

        if !initial_tracks.is_empty() {
            if let Err(e) = self.attach(initial_tracks).await {
                error!("attaching local media for {} failed: {e}", self.peer);
                self.close_with(CloseReason::Negotiation).await;
                return;
            }
        }

        // The offerer side opens negotiation as soon as it learns about the
        // peer; the other side waits for the offer.
        if self.offerer {
            if let Err(e) = self.start_offer(false).await {
                error!("initial offer to {} failed: {e}", self.peer);
                self.close_with(CloseReason::Negotiation).await;
                return;
            }
        }

        loop {
            tokio::select! {
                biased;

                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if self.handle_command(cmd).await == Flow::Stop {
                                break;
                            }
                        }
                        None => {
                            self.close_with(CloseReason::RoomLeft).await;
                            break;
                        }
                    }
                }

                event = self.transport_rx.recv() => {
                    match event {
                        Some(event) => {
                            if self.handle_transport_event(event).await == Flow::Stop {
                                break;
                            }
                        }
                        None => {
                            warn!("transport event channel for {} closed", self.peer);
                            self.close_with(CloseReason::TransportFailed).await;
                            break;
                        }
                    }
                }
            }
        }

        info!("peer session for {} finished", self.peer);
    }

    async fn handle_command(&mut self, cmd: SessionCommand) -> Flow {
        match cmd {
            SessionCommand::ApplySignal(payload) => {
                if self.state.is_terminal() {
                    debug!("dropping {} signal for closed session {}", payload.kind(), self.peer);
                    return Flow::Continue;
                }
                if let Err(e) = self.apply_remote_signal(payload).await {
                    // A session that cannot apply a payload must not be left
                    // inconsistent: log and close it, leave the rest of the
                    // room alone.
                    error!("negotiation with {} failed: {e}", self.peer);
                    self.close_with(CloseReason::Negotiation).await;
                    return Flow::Stop;
                }
                Flow::Continue
            }

            SessionCommand::AttachMedia { tracks, ack } => {
                let result = self.attach(tracks).await;
                let failed = result.is_err();
                let _ = ack.send(result);
                if failed {
                    self.close_with(CloseReason::Negotiation).await;
                    return Flow::Stop;
                }
                Flow::Continue
            }

            SessionCommand::DetachMedia { track_ids, ack } => {
                let result = self.detach(track_ids).await;
                let failed = result.is_err();
                let _ = ack.send(result);
                if failed {
                    self.close_with(CloseReason::Negotiation).await;
                    return Flow::Stop;
                }
                Flow::Continue
            }

            SessionCommand::Close(reason) => {
                self.close_with(reason).await;
                Flow::Stop
            }
        }
    }

    async fn apply_remote_signal(
        &mut self,
        payload: NegotiationPayload,
    ) -> Result<(), NegotiationError> {
        // Any negotiation message is what moves a fresh session forward.
        if self.state == PeerState::New {
            self.transition(PeerState::Negotiating);
        }

        match payload {
            NegotiationPayload::Offer { sdp } => {
                if sdp.trim().is_empty() {
                    return Err(NegotiationError::Malformed {
                        kind: "offer",
                        reason: "empty sdp".into(),
                    });
                }

                if self.offer_pending {
                    if self.offerer {
                        // Glare, and the tie-break says our offer stands. The
                        // remote side rolls back when our offer reaches it.
                        debug!("ignoring colliding offer from {}", self.peer);
                        return Ok(());
                    }
                    // We lose the tie-break: abandon our exchange, answer theirs.
                    debug!("rolling back local offer for {}", self.peer);
                    self.transport.discard_pending_offer().await?;
                    self.offer_pending = false;
                    self.remote_described = false;
                }

                let answer = self.transport.accept_offer(&sdp).await?;
                self.remote_described = true;
                self.flush_candidates().await?;
                self.signaling
                    .send(self.peer.clone(), NegotiationPayload::Answer { sdp: answer });
                Ok(())
            }

            NegotiationPayload::Answer { sdp } => {
                if sdp.trim().is_empty() {
                    return Err(NegotiationError::Malformed {
                        kind: "answer",
                        reason: "empty sdp".into(),
                    });
                }
                if !self.offer_pending {
                    return Err(NegotiationError::OutOfOrder {
                        kind: "answer",
                        state: self.state,
                    });
                }
                self.transport.accept_answer(&sdp).await?;
                self.offer_pending = false;
                self.remote_described = true;
                self.flush_candidates().await?;
                Ok(())
            }

            NegotiationPayload::IceCandidate {
                candidate,
                sdp_mid,
                sdp_mline_index,
            } => {
                if candidate.trim().is_empty() {
                    // End-of-candidates marker.
                    return Ok(());
                }
                if !self.remote_described {
                    // Trickle ICE can outrun the offer; hold candidates until
                    // a remote description is in place.
                    debug!("buffering early candidate from {}", self.peer);
                    self.queued_candidates
                        .push((candidate, sdp_mid, sdp_mline_index));
                    return Ok(());
                }
                self.transport
                    .add_remote_candidate(&candidate, sdp_mid, sdp_mline_index)
                    .await
            }
        }
    }

    async fn flush_candidates(&mut self) -> Result<(), NegotiationError> {
        for (candidate, sdp_mid, sdp_mline_index) in std::mem::take(&mut self.queued_candidates) {
            self.transport
                .add_remote_candidate(&candidate, sdp_mid, sdp_mline_index)
                .await?;
        }
        Ok(())
    }

    async fn start_offer(&mut self, ice_restart: bool) -> Result<(), NegotiationError> {
        let sdp = self.transport.create_offer(ice_restart).await?;
        self.offer_pending = true;
        if self.state == PeerState::New {
            self.transition(PeerState::Negotiating);
        }
        self.signaling
            .send(self.peer.clone(), NegotiationPayload::Offer { sdp });
        Ok(())
    }

    async fn attach(&mut self, tracks: Vec<LocalTrackHandle>) -> Result<(), NegotiationError> {
        if self.state.is_terminal() {
            return Err(NegotiationError::SessionClosed);
        }
        let mut added = false;
        for track in &tracks {
            if !self.attached.insert(track.id().to_owned()) {
                continue;
            }
            self.transport.add_local_track(track).await?;
            added = true;
        }
        // Only an actual track change renegotiates; toggling the enabled
        // flag never reaches this path at all.
        if added && self.state == PeerState::Connected {
            self.start_offer(false).await?;
        }
        Ok(())
    }

    async fn detach(&mut self, track_ids: Vec<String>) -> Result<(), NegotiationError> {
        if self.state.is_terminal() {
            return Err(NegotiationError::SessionClosed);
        }
        let mut removed = false;
        for id in &track_ids {
            if self.attached.remove(id) {
                self.transport.remove_local_track(id).await?;
                removed = true;
            }
        }
        if removed && self.state == PeerState::Connected {
            self.start_offer(false).await?;
        }
        Ok(())
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) -> Flow {
        match event {
            TransportEvent::Connected => {
                if matches!(self.state, PeerState::Negotiating | PeerState::Reconnecting) {
                    self.transition(PeerState::Connected);
                }
                Flow::Continue
            }

            TransportEvent::Disconnected => {
                if self.state == PeerState::Connected {
                    // Network blip: keep local and remote media, try to
                    // re-establish. The monitor closes us if this drags on.
                    self.transition(PeerState::Reconnecting);
                    if self.offerer {
                        if let Err(e) = self.start_offer(true).await {
                            error!("ice restart offer to {} failed: {e}", self.peer);
                            self.close_with(CloseReason::TransportFailed).await;
                            return Flow::Stop;
                        }
                    }
                } else {
                    debug!(
                        "transport disconnect for {} in state {}",
                        self.peer, self.state
                    );
                }
                Flow::Continue
            }

            TransportEvent::Failed(reason) => {
                warn!("transport for {} failed: {reason}", self.peer);
                self.close_with(CloseReason::TransportFailed).await;
                Flow::Stop
            }

            TransportEvent::TrackReceived(track) => {
                self.emit(SessionEventKind::TrackAdded(track));
                Flow::Continue
            }

            TransportEvent::CandidateGenerated(payload) => {
                self.signaling.send(self.peer.clone(), payload);
                Flow::Continue
            }
        }
    }

    fn transition(&mut self, next: PeerState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            warn!(
                "ignoring invalid transition {} -> {} for {}",
                self.state, next, self.peer
            );
            return;
        }
        debug!("peer {}: {} -> {}", self.peer, self.state, next);
        self.state = next;
        self.emit(SessionEventKind::StateChanged(next));
    }

    async fn close_with(&mut self, reason: CloseReason) {
        if self.state.is_terminal() {
            return;
        }
        self.transport.close().await;
        self.transition(PeerState::Closed);
        self.emit(SessionEventKind::Closed(reason));
    }

    fn emit(&self, kind: SessionEventKind) {
        let _ = self.events_tx.send(SessionEvent {
            peer: self.peer.clone(),
            kind,
        });
    }
}
