mod media;
mod participant;
mod room;
mod signaling;

pub use media::{RemoteTrack, TrackKind};
pub use participant::ParticipantId;
pub use room::RoomId;
pub use signaling::{ClientMessage, IceServerConfig, NegotiationPayload, ServerMessage};
