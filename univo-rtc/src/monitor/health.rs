use crate::peer::PeerState;
use crate::room::RoomCommand;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use univo_core::ParticipantId;

/// Aggregated classification of the whole room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomHealth {
    /// Every session is connected or still negotiating.
    Healthy,
    /// The signaling channel is down, or at least one session is
    /// reconnecting.
    Degraded,
    /// The signaling channel failed terminally; the room is unusable.
    Broken,
}

/// Per-session health as tracked by the monitor.
#[derive(Debug, Clone)]
pub struct ConnectionHealth {
    pub state: PeerState,
    pub last_activity: Instant,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingStatus {
    Up,
    Down,
    Failed,
}

/// The single aggregated signal external consumers watch instead of polling
/// every session.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub health: RoomHealth,
    pub new: usize,
    pub negotiating: usize,
    pub connected: usize,
    pub reconnecting: usize,
    pub signaling: SignalingStatus,
}

impl Default for HealthReport {
    fn default() -> Self {
        Self {
            health: RoomHealth::Healthy,
            new: 0,
            negotiating: 0,
            connected: 0,
            reconnecting: 0,
            signaling: SignalingStatus::Up,
        }
    }
}

/// Inputs fed by the coordinator as it processes session and signaling
/// events.
#[derive(Debug)]
pub enum HealthUpdate {
    Session {
        peer: ParticipantId,
        state: PeerState,
    },
    SessionRemoved {
        peer: ParticipantId,
    },
    Signaling(SignalingStatus),
}

struct PeerEntry {
    health: ConnectionHealth,
    reconnecting_since: Option<Instant>,
    expiry_sent: bool,
}

/// Watches per-session health and signaling connectivity, publishes the
/// aggregated [`HealthReport`], and expires sessions that overstay the
/// reconnection grace period. Expiry goes through the coordinator, which
/// stays the sole owner of the session set.
pub struct ConnectionMonitor {
    rx: mpsc::UnboundedReceiver<HealthUpdate>,
    report_tx: watch::Sender<HealthReport>,
    cmd_tx: mpsc::UnboundedSender<RoomCommand>,
    grace: Duration,
    peers: HashMap<ParticipantId, PeerEntry>,
    signaling: SignalingStatus,
}

impl ConnectionMonitor {
    pub fn spawn(
        rx: mpsc::UnboundedReceiver<HealthUpdate>,
        cmd_tx: mpsc::UnboundedSender<RoomCommand>,
        grace: Duration,
    ) -> watch::Receiver<HealthReport> {
        let (report_tx, report_rx) = watch::channel(HealthReport::default());
        let monitor = Self {
            rx,
            report_tx,
            cmd_tx,
            grace,
            peers: HashMap::new(),
            signaling: SignalingStatus::Up,
        };
        tokio::spawn(monitor.run());
        report_rx
    }

    async fn run(mut self) {
        let mut sweep = tokio::time::interval(Duration::from_millis(500));
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                update = self.rx.recv() => {
                    match update {
                        Some(update) => self.apply(update),
                        None => break,
                    }
                }
                _ = sweep.tick() => self.sweep(),
            }
            self.publish();
        }
        debug!("connection monitor finished");
    }

    fn apply(&mut self, update: HealthUpdate) {
        match update {
            HealthUpdate::Session { peer, state } => {
                let now = Instant::now();
                let entry = self.peers.entry(peer).or_insert_with(|| PeerEntry {
                    health: ConnectionHealth {
                        state,
                        last_activity: now,
                        consecutive_failures: 0,
                    },
                    reconnecting_since: None,
                    expiry_sent: false,
                });
                entry.health.last_activity = now;
                let previous = entry.health.state;
                entry.health.state = state;

                match state {
                    PeerState::Reconnecting if previous != PeerState::Reconnecting => {
                        entry.health.consecutive_failures += 1;
                        entry.reconnecting_since = Some(now);
                        entry.expiry_sent = false;
                    }
                    PeerState::Connected => {
                        entry.health.consecutive_failures = 0;
                        entry.reconnecting_since = None;
                        entry.expiry_sent = false;
                    }
                    _ => {}
                }
            }

            HealthUpdate::SessionRemoved { peer } => {
                self.peers.remove(&peer);
            }

            HealthUpdate::Signaling(status) => {
                if status != self.signaling {
                    match status {
                        SignalingStatus::Up => info!("signaling channel healthy"),
                        SignalingStatus::Down => warn!("signaling channel down, room degraded"),
                        SignalingStatus::Failed => warn!("signaling channel failed, room broken"),
                    }
                }
                self.signaling = status;
            }
        }
    }

    /// Close out sessions that have been reconnecting for longer than the
    /// grace period. The coordinator double-checks the state before acting,
    /// so a reconnect that lands first wins the race.
    fn sweep(&mut self) {
        let now = Instant::now();
        for (peer, entry) in self.peers.iter_mut() {
            if entry.expiry_sent {
                continue;
            }
            let Some(since) = entry.reconnecting_since else {
                continue;
            };
            if now.duration_since(since) >= self.grace {
                warn!(
                    "peer {} exceeded {}s reconnection grace",
                    peer,
                    self.grace.as_secs()
                );
                entry.expiry_sent = true;
                let _ = self.cmd_tx.send(RoomCommand::ExpirePeer { peer: peer.clone() });
            }
        }
    }

    fn publish(&self) {
        let mut report = HealthReport {
            signaling: self.signaling,
            ..HealthReport::default()
        };
        for entry in self.peers.values() {
            match entry.health.state {
                PeerState::New => report.new += 1,
                PeerState::Negotiating => report.negotiating += 1,
                PeerState::Connected => report.connected += 1,
                PeerState::Reconnecting => report.reconnecting += 1,
                PeerState::Closed => {}
            }
        }
        report.health = classify(self.signaling, report.reconnecting);
        let _ = self.report_tx.send(report);
    }
}

fn classify(signaling: SignalingStatus, reconnecting: usize) -> RoomHealth {
    match signaling {
        SignalingStatus::Failed => RoomHealth::Broken,
        SignalingStatus::Down => RoomHealth::Degraded,
        SignalingStatus::Up if reconnecting > 0 => RoomHealth::Degraded,
        SignalingStatus::Up => RoomHealth::Healthy,
    }
}
