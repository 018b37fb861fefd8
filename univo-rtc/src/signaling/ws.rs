use crate::error::ConnectError;
use crate::signaling::connector::{SignalingConn, SignalingConnector};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use univo_core::{ClientMessage, ParticipantId, RoomId, ServerMessage};
use url::Url;

/// Production signaling connector: JSON text frames over a WebSocket.
///
/// The endpoint is the signaling server base url (`ws://host:port` or
/// `wss://...`); the room and participant ids are appended as path segments.
pub struct WsConnector {
    endpoint: Url,
}

impl WsConnector {
    pub fn new(endpoint: Url) -> Self {
        Self { endpoint }
    }

    fn channel_url(&self, room: &RoomId, local: &ParticipantId) -> Result<Url, ConnectError> {
        self.endpoint
            .join(&format!("ws/{room}/{local}"))
            .map_err(|e| ConnectError::Unreachable(format!("invalid signaling url: {e}")))
    }
}

#[async_trait]
impl SignalingConnector for WsConnector {
    async fn open(
        &self,
        room: &RoomId,
        local: &ParticipantId,
    ) -> Result<SignalingConn, ConnectError> {
        let url = self.channel_url(room, local)?;
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ConnectError::Unreachable(e.to_string()))?;
        debug!("signaling websocket connected: {}", url);

        let (mut ws_write, mut ws_read) = socket.split();
        let (client_tx, mut client_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (server_tx, server_rx) = mpsc::channel::<ServerMessage>(256);

        tokio::spawn(async move {
            while let Some(msg) = client_rx.recv().await {
                match serde_json::to_string(&msg) {
                    Ok(json) => {
                        if ws_write.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("failed to serialize signaling message: {e}"),
                }
            }
            let _ = ws_write.send(Message::Close(None)).await;
        });

        tokio::spawn(async move {
            while let Some(Ok(msg)) = ws_read.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(parsed) => {
                            if server_tx.send(parsed).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("invalid signaling frame: {e}"),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            // server_tx drops here; the transport sees the channel close.
        });

        Ok(SignalingConn {
            tx: client_tx,
            rx: server_rx,
        })
    }
}
