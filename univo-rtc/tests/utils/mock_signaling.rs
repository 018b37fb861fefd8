use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use univo_core::{ClientMessage, NegotiationPayload, ParticipantId, RoomId, ServerMessage};
use univo_rtc::error::ConnectError;
use univo_rtc::signaling::{SignalingConn, SignalingConnector};

struct Link {
    server_tx: mpsc::Sender<ServerMessage>,
    pump: JoinHandle<()>,
}

struct Inner {
    /// Membership reported in the `RoomJoined` reply.
    participants: Mutex<Vec<ParticipantId>>,
    /// Everything the client sent, across connections.
    sent: Mutex<Vec<ClientMessage>>,
    link: Mutex<Option<Link>>,
    fail_next: AtomicU32,
    connects: AtomicU32,
}

/// In-process signaling server: answers the join handshake, records every
/// outbound client message and lets tests push server messages or kill the
/// link to exercise reconnect paths.
#[derive(Clone)]
pub struct MockSignaling {
    inner: Arc<Inner>,
}

impl MockSignaling {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                participants: Mutex::new(Vec::new()),
                sent: Mutex::new(Vec::new()),
                link: Mutex::new(None),
                fail_next: AtomicU32::new(0),
                connects: AtomicU32::new(0),
            }),
        }
    }

    pub fn connector(&self) -> Arc<dyn SignalingConnector> {
        Arc::new(MockConnector {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Set the membership the next `RoomJoined` reply reports.
    pub fn set_participants(&self, ids: &[&str]) {
        *lock(&self.inner.participants) = ids.iter().map(|s| ParticipantId::from(*s)).collect();
    }

    /// Deliver a server message to the connected client.
    pub async fn push(&self, msg: ServerMessage) {
        let tx = lock(&self.inner.link)
            .as_ref()
            .map(|link| link.server_tx.clone());
        match tx {
            Some(tx) => {
                let _ = tx.send(msg).await;
            }
            None => panic!("push with no live signaling link"),
        }
    }

    pub async fn push_signal(&self, from: &str, payload: NegotiationPayload) {
        self.push(ServerMessage::Signal {
            from: ParticipantId::from(from),
            payload,
        })
        .await;
    }

    pub async fn push_joined(&self, id: &str) {
        self.push(ServerMessage::ParticipantJoined {
            id: ParticipantId::from(id),
        })
        .await;
    }

    pub async fn push_left(&self, id: &str) {
        self.push(ServerMessage::ParticipantLeft {
            id: ParticipantId::from(id),
        })
        .await;
    }

    /// Drop the current link; the client sees the channel close and starts
    /// reconnecting.
    pub fn drop_link(&self) {
        if let Some(link) = lock(&self.inner.link).take() {
            link.pump.abort();
        }
    }

    /// Make the next `n` connection attempts fail.
    pub fn fail_next(&self, n: u32) {
        self.inner.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> u32 {
        self.inner.connects.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<ClientMessage> {
        lock(&self.inner.sent).clone()
    }

    /// Negotiation payloads the client addressed to a specific peer.
    pub fn signals_to(&self, peer: &str) -> Vec<NegotiationPayload> {
        let peer = ParticipantId::from(peer);
        self.sent()
            .into_iter()
            .filter_map(|msg| match msg {
                ClientMessage::Signal { to, payload } if to == peer => Some(payload),
                _ => None,
            })
            .collect()
    }

    pub fn offers_to(&self, peer: &str) -> usize {
        self.signals_to(peer)
            .iter()
            .filter(|p| matches!(p, NegotiationPayload::Offer { .. }))
            .count()
    }

    pub fn answers_to(&self, peer: &str) -> usize {
        self.signals_to(peer)
            .iter()
            .filter(|p| matches!(p, NegotiationPayload::Answer { .. }))
            .count()
    }

    pub fn left_announced(&self) -> bool {
        self.sent()
            .iter()
            .any(|m| matches!(m, ClientMessage::Leave))
    }
}

impl Default for MockSignaling {
    fn default() -> Self {
        Self::new()
    }
}

struct MockConnector {
    inner: Arc<Inner>,
}

#[async_trait]
impl SignalingConnector for MockConnector {
    async fn open(
        &self,
        _room: &RoomId,
        _local: &ParticipantId,
    ) -> Result<SignalingConn, ConnectError> {
        let failures = self.inner.fail_next.load(Ordering::SeqCst);
        if failures > 0 {
            self.inner.fail_next.store(failures - 1, Ordering::SeqCst);
            return Err(ConnectError::Unreachable("mock refusing connection".into()));
        }
        self.inner.connects.fetch_add(1, Ordering::SeqCst);

        let (client_tx, mut client_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (server_tx, server_rx) = mpsc::channel::<ServerMessage>(64);

        let pump_inner = Arc::clone(&self.inner);
        let pump_tx = server_tx.clone();
        let pump = tokio::spawn(async move {
            while let Some(msg) = client_rx.recv().await {
                if let ClientMessage::Join { room } = &msg {
                    let participants = lock(&pump_inner.participants).clone();
                    let _ = pump_tx
                        .send(ServerMessage::RoomJoined {
                            room: room.clone(),
                            participants,
                        })
                        .await;
                }
                lock(&pump_inner.sent).push(msg);
            }
        });

        *lock(&self.inner.link) = Some(Link { server_tx, pump });

        Ok(SignalingConn {
            tx: client_tx,
            rx: server_rx,
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
