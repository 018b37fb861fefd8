pub mod model;

pub use model::{
    ClientMessage, IceServerConfig, NegotiationPayload, ParticipantId, RemoteTrack, RoomId,
    ServerMessage, TrackKind,
};
