mod connector;
mod transport;
mod ws;

pub use connector::{SignalingConn, SignalingConnector};
pub use transport::{SignalingEvent, SignalingHandle, SignalingTransport};
pub use ws::WsConnector;
