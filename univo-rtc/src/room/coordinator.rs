use crate::config::RtcConfig;
use crate::error::{ConnectError, NegotiationError, TimeoutError};
use crate::media::LocalMediaController;
use crate::monitor::{ConnectionMonitor, HealthUpdate, SignalingStatus};
use crate::peer::{CloseReason, PeerConnector, PeerSession, PeerState, SessionEvent, SessionEventKind, SessionHandle};
use crate::room::command::RoomCommand;
use crate::room::handle::RoomHandle;
use crate::room::view::{RoomEvent, RoomView};
use crate::signaling::{SignalingConnector, SignalingEvent, SignalingHandle, SignalingTransport};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};
use univo_core::{ParticipantId, RoomId};

#[derive(PartialEq)]
enum Flow {
    Continue,
    Stop,
}

/// Owner of the peer-session set for one room.
///
/// Single writer of the session map and the participant view; everything
/// else flows through its queues. Sessions run their own tasks, so one
/// peer's stalled negotiation never blocks the others; the coordinator
/// only dispatches.
pub struct RoomCoordinator {
    config: RtcConfig,
    room: RoomId,
    local: ParticipantId,
    media: Arc<LocalMediaController>,
    peer_connector: Arc<dyn PeerConnector>,
    signaling: SignalingHandle,
    signaling_rx: mpsc::Receiver<SignalingEvent>,
    sessions: HashMap<ParticipantId, SessionHandle>,
    session_events_tx: mpsc::UnboundedSender<SessionEvent>,
    session_events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    view: RoomView,
    events_tx: broadcast::Sender<RoomEvent>,
    health_tx: mpsc::UnboundedSender<HealthUpdate>,
    cmd_rx: mpsc::UnboundedReceiver<RoomCommand>,
}

impl RoomCoordinator {
    /// Connect signaling, spawn the coordinator task and its monitor, and
    /// hand back the room handle.
    pub async fn spawn(
        config: RtcConfig,
        room: RoomId,
        local: ParticipantId,
        signaling_connector: Arc<dyn SignalingConnector>,
        peer_connector: Arc<dyn PeerConnector>,
        media: Arc<LocalMediaController>,
    ) -> Result<RoomHandle, ConnectError> {
        let (signaling, signaling_rx) = SignalingTransport::connect(
            signaling_connector,
            room.clone(),
            local.clone(),
            config.signaling.clone(),
        )
        .await?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (health_tx, health_rx) = mpsc::unbounded_channel();
        let health_rx =
            ConnectionMonitor::spawn(health_rx, cmd_tx.clone(), config.reconnect_grace);
        let (events_tx, _) = broadcast::channel(256);
        let (session_events_tx, session_events_rx) = mpsc::unbounded_channel();
        let view = RoomView::new();

        let coordinator = Self {
            config,
            room: room.clone(),
            local,
            media,
            peer_connector,
            signaling,
            signaling_rx,
            sessions: HashMap::new(),
            session_events_tx,
            session_events_rx,
            view: view.clone(),
            events_tx: events_tx.clone(),
            health_tx,
            cmd_rx,
        };
        tokio::spawn(coordinator.run());

        Ok(RoomHandle::new(room, cmd_tx, view, events_tx, health_rx))
    }

    async fn run(mut self) {
        info!("room coordinator started for {}", self.room);

        loop {
            // Session events first: they carry the state the command
            // handlers (expiry in particular) make decisions on.
            tokio::select! {
                biased;

                event = self.session_events_rx.recv() => {
                    if let Some(event) = event {
                        self.handle_session_event(event);
                    }
                }

                event = self.signaling_rx.recv() => {
                    match event {
                        Some(event) => {
                            if self.handle_signaling_event(event).await == Flow::Stop {
                                break;
                            }
                        }
                        None => {
                            warn!("signaling transport gone, closing room {}", self.room);
                            self.teardown(CloseReason::RoomLeft).await;
                            break;
                        }
                    }
                }

                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if self.handle_command(cmd).await == Flow::Stop {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        info!("room coordinator for {} finished", self.room);
    }

    async fn handle_signaling_event(&mut self, event: SignalingEvent) -> Flow {
        match event {
            SignalingEvent::RoomJoined { participants, .. } => {
                for id in participants {
                    self.add_participant(id).await;
                }
                Flow::Continue
            }

            SignalingEvent::ParticipantJoined(id) => {
                self.add_participant(id).await;
                Flow::Continue
            }

            SignalingEvent::ParticipantLeft(id) => {
                self.remove_participant(&id, CloseReason::PeerLeft);
                Flow::Continue
            }

            SignalingEvent::Negotiation { from, payload } => {
                // A negotiation message may beat the joined event; create
                // the session on demand so ordering across those two paths
                // does not matter.
                if !self.sessions.contains_key(&from) {
                    self.add_participant(from.clone()).await;
                }
                if let Some(session) = self.sessions.get(&from) {
                    session.apply_signal(payload);
                }
                Flow::Continue
            }

            SignalingEvent::Disconnected => {
                // Every session is now suspect, but none gets destroyed:
                // each detects loss of its own connection independently.
                let _ = self
                    .health_tx
                    .send(HealthUpdate::Signaling(SignalingStatus::Down));
                Flow::Continue
            }

            SignalingEvent::Reconnected { participants } => {
                let _ = self
                    .health_tx
                    .send(HealthUpdate::Signaling(SignalingStatus::Up));
                self.reconcile(participants).await;
                Flow::Continue
            }

            SignalingEvent::Failed => {
                // Reported once as room state, not duplicated per peer.
                error!("signaling channel for {} failed permanently", self.room);
                let _ = self
                    .health_tx
                    .send(HealthUpdate::Signaling(SignalingStatus::Failed));
                self.teardown(CloseReason::RoomLeft).await;
                Flow::Stop
            }
        }
    }

    fn handle_session_event(&mut self, event: SessionEvent) {
        let SessionEvent { peer, kind } = event;
        match kind {
            SessionEventKind::StateChanged(state) => {
                if self.sessions.contains_key(&peer) {
                    self.view.set_state(&peer, state);
                    let _ = self.health_tx.send(HealthUpdate::Session {
                        peer: peer.clone(),
                        state,
                    });
                    self.emit(RoomEvent::StateChanged { id: peer, state });
                }
            }

            SessionEventKind::TrackAdded(track) => {
                if self.sessions.contains_key(&peer) {
                    self.view.push_track(&peer, track.clone());
                    self.emit(RoomEvent::TrackAdded { id: peer, track });
                }
            }

            SessionEventKind::Closed(reason) => {
                // The session closed itself (negotiation error, transport
                // failure). Coordinator-initiated removals already cleaned
                // up, in which case there is nothing left to do here.
                if self.sessions.remove(&peer).is_some() {
                    self.view.remove(&peer);
                    let _ = self
                        .health_tx
                        .send(HealthUpdate::SessionRemoved { peer: peer.clone() });
                    self.emit(RoomEvent::ParticipantDisconnected { id: peer, reason });
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: RoomCommand) -> Flow {
        match cmd {
            RoomCommand::AttachMedia { tracks, reply } => {
                let acks: Vec<(ParticipantId, oneshot::Receiver<Result<(), NegotiationError>>)> =
                    self.sessions
                        .iter()
                        .map(|(id, session)| (id.clone(), session.attach_media(tracks.clone())))
                        .collect();
                let _ = reply.send(Self::collect_acks(acks).await);
                Flow::Continue
            }

            RoomCommand::DetachMedia { track_ids, reply } => {
                let acks: Vec<(ParticipantId, oneshot::Receiver<Result<(), NegotiationError>>)> =
                    self.sessions
                        .iter()
                        .map(|(id, session)| (id.clone(), session.detach_media(track_ids.clone())))
                        .collect();
                let _ = reply.send(Self::collect_acks(acks).await);
                Flow::Continue
            }

            RoomCommand::ExpirePeer { peer } => {
                // Races with a successful reconnect are decided here: the
                // last-known state wins, and session events are drained
                // before commands.
                let still_reconnecting = self
                    .view
                    .get(&peer)
                    .map(|info| info.state == PeerState::Reconnecting)
                    .unwrap_or(false);
                if still_reconnecting {
                    let timeout = TimeoutError {
                        grace_secs: self.config.reconnect_grace.as_secs(),
                    };
                    warn!("closing {}: {timeout}", peer);
                    self.remove_participant(&peer, CloseReason::Timeout);
                } else {
                    debug!("ignoring stale expiry for {}", peer);
                }
                Flow::Continue
            }

            RoomCommand::Leave { done } => {
                self.teardown(CloseReason::RoomLeft).await;
                let _ = done.send(());
                Flow::Stop
            }
        }
    }

    async fn collect_acks(
        acks: Vec<(ParticipantId, oneshot::Receiver<Result<(), NegotiationError>>)>,
    ) -> Vec<(ParticipantId, NegotiationError)> {
        let mut failures = Vec::new();
        for (id, ack) in acks {
            match ack.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push((id, e)),
                Err(_) => failures.push((id, NegotiationError::SessionClosed)),
            }
        }
        failures
    }

    async fn add_participant(&mut self, id: ParticipantId) {
        if id == self.local {
            return;
        }
        if self.sessions.contains_key(&id) {
            // Duplicate join without an intervening leave: idempotent.
            debug!("duplicate participant-joined for {}, ignoring", id);
            return;
        }

        let (transport_tx, transport_rx) = mpsc::channel(64);
        let transport = match self.peer_connector.connect(&id, transport_tx).await {
            Ok(transport) => transport,
            Err(e) => {
                error!("creating transport for {} failed: {e}", id);
                return;
            }
        };

        let handle = PeerSession::spawn(
            self.local.clone(),
            id.clone(),
            transport,
            transport_rx,
            self.session_events_tx.clone(),
            self.signaling.clone(),
            self.media.current_tracks(),
        );
        self.sessions.insert(id.clone(), handle);
        self.view.insert(id.clone(), PeerState::New);
        let _ = self.health_tx.send(HealthUpdate::Session {
            peer: id.clone(),
            state: PeerState::New,
        });
        self.emit(RoomEvent::ParticipantJoined(id));
    }

    fn remove_participant(&mut self, id: &ParticipantId, reason: CloseReason) {
        let Some(session) = self.sessions.remove(id) else {
            return;
        };
        session.close(reason);
        self.view.remove(id);
        let _ = self
            .health_tx
            .send(HealthUpdate::SessionRemoved { peer: id.clone() });
        match reason {
            CloseReason::PeerLeft => self.emit(RoomEvent::ParticipantLeft(id.clone())),
            _ => self.emit(RoomEvent::ParticipantDisconnected {
                id: id.clone(),
                reason,
            }),
        }
    }

    /// After a signaling rejoin, align the session set with the server's
    /// current membership.
    async fn reconcile(&mut self, participants: Vec<ParticipantId>) {
        let current: HashSet<&ParticipantId> = participants.iter().collect();
        let stale: Vec<ParticipantId> = self
            .sessions
            .keys()
            .filter(|id| !current.contains(id))
            .cloned()
            .collect();
        for id in stale {
            info!("participant {} gone after signaling reconnect", id);
            self.remove_participant(&id, CloseReason::PeerLeft);
        }
        for id in participants {
            self.add_participant(id).await;
        }
    }

    async fn teardown(&mut self, reason: CloseReason) {
        info!("tearing down room {}", self.room);
        for (_, session) in self.sessions.drain() {
            session.close(reason);
        }
        self.view.clear();
        self.media.release();
        self.signaling.leave();
    }

    fn emit(&self, event: RoomEvent) {
        let _ = self.events_tx.send(event);
    }
}
