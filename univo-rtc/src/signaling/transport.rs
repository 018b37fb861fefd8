use crate::config::SignalingConfig;
use crate::error::ConnectError;
use crate::signaling::connector::{SignalingConn, SignalingConnector};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use univo_core::{ClientMessage, NegotiationPayload, ParticipantId, RoomId, ServerMessage};

/// Events the signaling transport surfaces to the room coordinator.
#[derive(Debug, Clone)]
pub enum SignalingEvent {
    RoomJoined {
        room: RoomId,
        participants: Vec<ParticipantId>,
    },
    ParticipantJoined(ParticipantId),
    ParticipantLeft(ParticipantId),
    Negotiation {
        from: ParticipantId,
        payload: NegotiationPayload,
    },
    /// The channel dropped. Peer sessions become suspect but must not be
    /// destroyed; a reconnect attempt is already under way.
    Disconnected,
    /// The channel was re-established and the room re-joined. Carries the
    /// server's current membership for reconciliation.
    Reconnected { participants: Vec<ParticipantId> },
    /// The reconnect budget is exhausted. Terminal.
    Failed,
}

enum SignalCommand {
    Signal {
        to: ParticipantId,
        payload: NegotiationPayload,
    },
    Leave,
    Close,
}

/// Cloneable sender half of the transport. Sends are fire-and-forget: while
/// the channel is down they land in a retry queue flushed after reconnect.
#[derive(Clone)]
pub struct SignalingHandle {
    cmd_tx: mpsc::UnboundedSender<SignalCommand>,
}

impl SignalingHandle {
    pub fn send(&self, to: ParticipantId, payload: NegotiationPayload) {
        let _ = self.cmd_tx.send(SignalCommand::Signal { to, payload });
    }

    /// Announce departure to the server, then release the channel.
    pub fn leave(&self) {
        let _ = self.cmd_tx.send(SignalCommand::Leave);
    }

    /// Release the channel without announcing anything.
    pub fn close(&self) {
        let _ = self.cmd_tx.send(SignalCommand::Close);
    }
}

/// Owns the signaling channel for one room: join handshake, reconnect with
/// exponential backoff, and fan-out of inbound messages as [`SignalingEvent`]s.
pub struct SignalingTransport;

impl SignalingTransport {
    /// Establish the channel and perform the join handshake, retrying with
    /// exponential backoff up to the configured attempt budget.
    ///
    /// On success the `RoomJoined` event is already queued on the returned
    /// receiver, so the coordinator sees the initial membership through the
    /// same path as everything else.
    pub async fn connect(
        connector: Arc<dyn SignalingConnector>,
        room: RoomId,
        local: ParticipantId,
        config: SignalingConfig,
    ) -> Result<(SignalingHandle, mpsc::Receiver<SignalingEvent>), ConnectError> {
        let (conn, participants) = establish(&*connector, &room, &local, &config).await?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(256);

        let _ = event_tx
            .send(SignalingEvent::RoomJoined {
                room: room.clone(),
                participants,
            })
            .await;

        let runner = Runner {
            connector,
            room,
            local,
            config,
            cmd_rx,
            event_tx,
            pending: Vec::new(),
        };
        tokio::spawn(runner.run(conn));

        Ok((SignalingHandle { cmd_tx }, event_rx))
    }
}

struct Runner {
    connector: Arc<dyn SignalingConnector>,
    room: RoomId,
    local: ParticipantId,
    config: SignalingConfig,
    cmd_rx: mpsc::UnboundedReceiver<SignalCommand>,
    event_tx: mpsc::Sender<SignalingEvent>,
    pending: Vec<ClientMessage>,
}

impl Runner {
    async fn run(mut self, mut conn: SignalingConn) {
        info!("signaling transport loop started for {}", self.local);

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(SignalCommand::Signal { to, payload }) => {
                            let msg = ClientMessage::Signal { to, payload };
                            if conn.tx.send(msg.clone()).is_err() {
                                debug!("signaling channel down, queueing outbound message");
                                self.pending.push(msg);
                            }
                        }
                        Some(SignalCommand::Leave) => {
                            let _ = conn.tx.send(ClientMessage::Leave);
                            break;
                        }
                        Some(SignalCommand::Close) | None => break,
                    }
                }

                msg = conn.rx.recv() => {
                    match msg {
                        Some(m) => self.handle_server_message(m).await,
                        None => {
                            warn!("signaling channel dropped, reconnecting");
                            let _ = self.event_tx.send(SignalingEvent::Disconnected).await;
                            match self.reconnect().await {
                                Reconnect::Restored(c) => conn = c,
                                Reconnect::GaveUp => {
                                    let _ = self.event_tx.send(SignalingEvent::Failed).await;
                                    break;
                                }
                                Reconnect::Stop => break,
                            }
                        }
                    }
                }
            }
        }

        info!("signaling transport loop finished for {}", self.local);
    }

    async fn handle_server_message(&mut self, msg: ServerMessage) {
        let event = match msg {
            ServerMessage::RoomJoined { room, participants } => {
                // A join acknowledgement outside the handshake means the
                // server re-sent state; treat it as reconciliation input.
                debug!("unsolicited room-joined for {:?}", room);
                SignalingEvent::Reconnected { participants }
            }
            ServerMessage::ParticipantJoined { id } => SignalingEvent::ParticipantJoined(id),
            ServerMessage::ParticipantLeft { id } => SignalingEvent::ParticipantLeft(id),
            ServerMessage::Signal { from, payload } => {
                SignalingEvent::Negotiation { from, payload }
            }
        };
        let _ = self.event_tx.send(event).await;
    }

    /// Reconnect with exponential backoff, still servicing the command
    /// queue so sends keep landing in the retry queue and a close/leave
    /// aborts promptly. The retry timer lives outside the select so inbound
    /// commands cannot keep resetting it.
    async fn reconnect(&mut self) -> Reconnect {
        let mut attempt: u32 = 0;
        let mut backoff = self.config.initial_backoff;
        let retry = tokio::time::sleep(backoff);
        tokio::pin!(retry);

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(SignalCommand::Signal { to, payload }) => {
                            self.pending.push(ClientMessage::Signal { to, payload });
                        }
                        Some(SignalCommand::Leave) | Some(SignalCommand::Close) | None => {
                            return Reconnect::Stop;
                        }
                    }
                }

                _ = retry.as_mut() => {
                    attempt += 1;
                    match self.connector.open(&self.room, &self.local).await {
                        Ok(conn) => match join_handshake(conn, &self.room).await {
                            Ok((conn, participants)) => {
                                info!("signaling channel re-established on attempt {}", attempt);
                                for msg in self.pending.drain(..) {
                                    let _ = conn.tx.send(msg);
                                }
                                let _ = self
                                    .event_tx
                                    .send(SignalingEvent::Reconnected { participants })
                                    .await;
                                return Reconnect::Restored(conn);
                            }
                            Err(e) => debug!("signaling rejoin failed: {e}"),
                        },
                        Err(e) => debug!("signaling reconnect attempt {} failed: {e}", attempt),
                    }

                    if attempt >= self.config.connect_attempts {
                        warn!(
                            "signaling reconnect budget exhausted after {} attempts",
                            attempt
                        );
                        return Reconnect::GaveUp;
                    }
                    backoff = (backoff * 2).min(self.config.max_backoff);
                    retry.as_mut().reset(tokio::time::Instant::now() + backoff);
                }
            }
        }
    }
}

enum Reconnect {
    Restored(SignalingConn),
    GaveUp,
    Stop,
}

/// Open the channel and run the join handshake, with backoff across the
/// whole attempt budget. Used for the initial connect only; reconnects keep
/// servicing the command queue in [`Runner::reconnect`].
async fn establish(
    connector: &dyn SignalingConnector,
    room: &RoomId,
    local: &ParticipantId,
    config: &SignalingConfig,
) -> Result<(SignalingConn, Vec<ParticipantId>), ConnectError> {
    let mut backoff = config.initial_backoff;
    let mut last_err = ConnectError::RetriesExhausted {
        attempts: config.connect_attempts,
    };

    for attempt in 1..=config.connect_attempts {
        match connector.open(room, local).await {
            Ok(conn) => match join_handshake(conn, room).await {
                Ok(ok) => return Ok(ok),
                Err(e) => {
                    debug!("signaling join attempt {} failed: {e}", attempt);
                    last_err = e;
                }
            },
            Err(e) => {
                debug!("signaling connect attempt {} failed: {e}", attempt);
                last_err = e;
            }
        }

        if attempt < config.connect_attempts {
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(config.max_backoff);
        }
    }

    Err(last_err)
}

/// Send `Join` and wait for the server's `RoomJoined` acknowledgement.
async fn join_handshake(
    mut conn: SignalingConn,
    room: &RoomId,
) -> Result<(SignalingConn, Vec<ParticipantId>), ConnectError> {
    conn.tx
        .send(ClientMessage::Join { room: room.clone() })
        .map_err(|_| ConnectError::ChannelClosed)?;

    let reply = tokio::time::timeout(Duration::from_secs(5), conn.rx.recv()).await;
    match reply {
        Ok(Some(ServerMessage::RoomJoined { participants, .. })) => Ok((conn, participants)),
        Ok(Some(other)) => Err(ConnectError::Rejected(format!(
            "expected room-joined, got {other:?}"
        ))),
        Ok(None) => Err(ConnectError::ChannelClosed),
        Err(_) => Err(ConnectError::Rejected("join handshake timed out".into())),
    }
}
