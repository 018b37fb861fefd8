use std::time::Duration;
use univo_core::IceServerConfig;

/// Tuning for establishing and re-establishing the signaling channel.
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Consecutive failed (re)connect attempts before the channel is
    /// declared terminally failed.
    pub connect_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 6,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(15),
        }
    }
}

/// Configuration for a room session.
#[derive(Debug, Clone)]
pub struct RtcConfig {
    /// ICE server descriptors, handed through unchanged to the peer
    /// transport factory.
    pub ice_servers: Vec<IceServerConfig>,
    /// How long a peer session may stay in `reconnecting` before it is
    /// closed with a timeout.
    pub reconnect_grace: Duration,
    pub signaling: SignalingConfig,
}

impl Default for RtcConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: vec!["stun:stun.l.google.com:19302".to_owned()],
                username: None,
                credential: None,
            }],
            reconnect_grace: Duration::from_secs(20),
            signaling: SignalingConfig::default(),
        }
    }
}
