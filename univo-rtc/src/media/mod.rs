mod controller;
mod devices;
mod track;

pub use controller::{LocalMediaController, LocalMediaHandle};
pub use devices::{CaptureDevice, MediaConstraints, MediaDevices, SampleDevices};
pub use track::LocalTrackHandle;
