use crate::error::MediaError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use univo_core::TrackKind;
use webrtc::media::Sample;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// A local capture track shared read-only with every peer session.
///
/// The handle is cheap to clone; all clones share the enabled flag. Disabling
/// gates the sample path only; the underlying device stays acquired, so
/// re-enabling is instantaneous.
#[derive(Clone)]
pub struct LocalTrackHandle {
    id: String,
    kind: TrackKind,
    enabled: Arc<AtomicBool>,
    rtc: Arc<TrackLocalStaticSample>,
}

impl LocalTrackHandle {
    /// Wrap an rtc-level track. Device implementations call this; the
    /// controller is the only component that flips the enabled flag after.
    pub fn new(id: impl Into<String>, kind: TrackKind, rtc: Arc<TrackLocalStaticSample>) -> Self {
        Self {
            id: id.into(),
            kind,
            enabled: Arc::new(AtomicBool::new(true)),
            rtc,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_enabled(&self, on: bool) {
        self.enabled.store(on, Ordering::Release);
    }

    /// The transport-level track, for attaching to a peer connection.
    pub fn rtc_track(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.rtc)
    }

    /// Feed one captured sample. Dropped silently while the track is
    /// disabled, so capture pipelines do not need to know about mute state.
    pub async fn write_sample(&self, sample: &Sample) -> Result<(), MediaError> {
        if !self.is_enabled() {
            return Ok(());
        }
        self.rtc
            .write_sample(sample)
            .await
            .map_err(|e| MediaError::Device {
                kind: self.kind,
                reason: e.to_string(),
            })
    }
}

impl std::fmt::Debug for LocalTrackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTrackHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
