pub mod mock_signaling;

pub use mock_devices::*;
pub use mock_peers::*;
pub use mock_signaling::*;
