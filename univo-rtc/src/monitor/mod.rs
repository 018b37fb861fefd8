mod health;

pub use health::{
    ConnectionHealth, ConnectionMonitor, HealthReport, HealthUpdate, RoomHealth, SignalingStatus,
};
