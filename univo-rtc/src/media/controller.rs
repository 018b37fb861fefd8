use crate::error::MediaError;
use crate::media::devices::{CaptureDevice, MediaConstraints, MediaDevices};
use crate::media::track::LocalTrackHandle;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};
use univo_core::TrackKind;

/// The tracks currently being captured, as handed to peer sessions.
#[derive(Debug, Clone, Default)]
pub struct LocalMediaHandle {
    pub tracks: Vec<LocalTrackHandle>,
}

/// Owner of the local capture devices.
///
/// Holds at most one active capture per track kind. Enable/disable flips the
/// track flag only and never touches acquisition; `release` frees every
/// device exactly once. Peer sessions receive track handles but never call
/// device-level operations.
pub struct LocalMediaController {
    devices: Arc<dyn MediaDevices>,
    slots: Mutex<HashMap<TrackKind, CaptureDevice>>,
}

impl LocalMediaController {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the requested capture kinds. A kind that is already held is
    /// reused, so calling this again with wider constraints only opens what
    /// is missing.
    pub async fn acquire(
        &self,
        constraints: MediaConstraints,
    ) -> Result<LocalMediaHandle, MediaError> {
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(self.ensure(TrackKind::Audio).await?);
        }
        if constraints.video {
            tracks.push(self.ensure(TrackKind::Video).await?);
        }
        Ok(LocalMediaHandle { tracks })
    }

    async fn ensure(&self, kind: TrackKind) -> Result<LocalTrackHandle, MediaError> {
        if let Some(device) = self.lock_slots().get(&kind) {
            return Ok(device.track().clone());
        }

        let mut opened = self.devices.open(kind).await?;
        info!("acquired {} capture device", kind);

        let mut slots = self.lock_slots();
        match slots.entry(kind) {
            // Lost the race against a concurrent acquire of the same kind:
            // keep the winner, stop our device so the per-kind invariant
            // holds.
            Entry::Occupied(existing) => {
                opened.stop();
                Ok(existing.get().track().clone())
            }
            Entry::Vacant(slot) => {
                let track = opened.track().clone();
                slot.insert(opened);
                Ok(track)
            }
        }
    }

    /// Idempotent; a no-op when video was never acquired.
    pub fn set_video_enabled(&self, enabled: bool) {
        self.set_enabled(TrackKind::Video, enabled);
    }

    /// Idempotent; a no-op when audio was never acquired.
    pub fn set_audio_enabled(&self, enabled: bool) {
        self.set_enabled(TrackKind::Audio, enabled);
    }

    fn set_enabled(&self, kind: TrackKind, enabled: bool) {
        if let Some(device) = self.lock_slots().get(&kind) {
            debug!("{} capture enabled={}", kind, enabled);
            device.track().set_enabled(enabled);
        }
    }

    /// Stop and free every device. Double release is a no-op.
    pub fn release(&self) {
        let drained: Vec<(TrackKind, CaptureDevice)> = self.lock_slots().drain().collect();
        for (kind, mut device) in drained {
            info!("released {} capture device", kind);
            device.stop();
        }
    }

    /// The tracks currently captured, in a stable kind order.
    pub fn current_tracks(&self) -> Vec<LocalTrackHandle> {
        let slots = self.lock_slots();
        let mut tracks: Vec<LocalTrackHandle> =
            slots.values().map(|d| d.track().clone()).collect();
        tracks.sort_by_key(|t| t.kind() as u8);
        tracks
    }

    pub fn acquired_count(&self) -> usize {
        self.lock_slots().len()
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<TrackKind, CaptureDevice>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
