use crate::error::ConnectError;
use async_trait::async_trait;
use tokio::sync::mpsc;
use univo_core::{ClientMessage, ParticipantId, RoomId, ServerMessage};

/// A live signaling channel: paired halves bridging to the wire.
///
/// The receiver closing means the channel dropped; the transport reacts by
/// reconnecting, the connector implementation only has to let its IO tasks
/// die with the socket.
pub struct SignalingConn {
    pub tx: mpsc::UnboundedSender<ClientMessage>,
    pub rx: mpsc::Receiver<ServerMessage>,
}

/// Trait the wire layer implements so the transport (and tests) can open
/// signaling channels without knowing about sockets.
#[async_trait]
pub trait SignalingConnector: Send + Sync {
    async fn open(
        &self,
        room: &RoomId,
        local: &ParticipantId,
    ) -> Result<SignalingConn, ConnectError>;
}
