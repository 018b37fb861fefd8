mod client;
mod command;
mod coordinator;
mod handle;
mod view;

pub use client::RoomClient;
pub use command::RoomCommand;
pub use coordinator::RoomCoordinator;
pub use handle::RoomHandle;
pub use view::{ParticipantInfo, RoomEvent, RoomView};
