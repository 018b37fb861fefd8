mod connection;
mod session;
mod state;
mod transport;

pub use connection::WebRtcConnector;
pub use session::{
    CloseReason, PeerSession, SessionCommand, SessionEvent, SessionEventKind, SessionHandle,
    local_is_offerer,
};
pub use state::PeerState;
pub use transport::{PeerConnector, PeerTransport, TransportEvent};
