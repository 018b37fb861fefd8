use crate::error::MediaError;
use crate::media::track::LocalTrackHandle;
use async_trait::async_trait;
use std::sync::Arc;
use univo_core::TrackKind;
use uuid::Uuid;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// What the caller asks the controller to capture.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl MediaConstraints {
    pub fn audio_video() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// An acquired capture device: the track it publishes plus a teardown hook.
pub struct CaptureDevice {
    track: LocalTrackHandle,
    stop: Option<Box<dyn FnOnce() + Send>>,
}

impl CaptureDevice {
    pub fn new(track: LocalTrackHandle, stop: Option<Box<dyn FnOnce() + Send>>) -> Self {
        Self { track, stop }
    }

    pub fn track(&self) -> &LocalTrackHandle {
        &self.track
    }

    /// Stop the device. Safe to call more than once; only the first call
    /// runs the teardown hook.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
    }
}

/// Platform seam for device acquisition. Implementations own permission
/// prompts, enumeration and the capture loop; the controller owns lifecycle
/// and mute state.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn open(&self, kind: TrackKind) -> Result<CaptureDevice, MediaError>;
}

/// Default device factory: static-sample rtc tracks that a capture pipeline
/// (or a recording/analytics collaborator in tests) feeds via
/// [`LocalTrackHandle::write_sample`]. Carries no platform capture of its
/// own, which keeps device specifics outside the orchestration core.
pub struct SampleDevices;

#[async_trait]
impl MediaDevices for SampleDevices {
    async fn open(&self, kind: TrackKind) -> Result<CaptureDevice, MediaError> {
        let codec = match kind {
            TrackKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            TrackKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                ..Default::default()
            },
        };
        let id = format!("{kind}-{}", Uuid::new_v4());
        let rtc = Arc::new(TrackLocalStaticSample::new(
            codec,
            id.clone(),
            "univo-local".to_owned(),
        ));
        Ok(CaptureDevice::new(
            LocalTrackHandle::new(id, kind, rtc),
            None,
        ))
    }
}
