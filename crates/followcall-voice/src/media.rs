//! Local audio capture seam.
//!
//! A [`MicrophoneStream`] is a bundle of [`MediaTrack`]s. Stopping a track
//! flips a shared flag that the capture backend observes, so a stream can be
//! released from any task without touching the device directly.

use crate::config::AudioConstraints;
use crate::error::VoiceError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One captured track of a local media stream.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    kind: String,
    label: String,
    live: Arc<AtomicBool>,
}

impl MediaTrack {
    pub fn new(kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            label: label.into(),
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Stops the track. Returns true if it was live.
    pub fn stop(&self) -> bool {
        self.live.swap(false, Ordering::AcqRel)
    }
}

/// A granted microphone stream.
#[derive(Debug, Clone)]
pub struct MicrophoneStream {
    id: String,
    tracks: Vec<MediaTrack>,
}

impl MicrophoneStream {
    pub fn new(id: impl Into<String>, tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    /// Stops every track and returns how many were still live.
    pub fn stop(&self) -> usize {
        let mut stopped = 0;
        for track in &self.tracks {
            if track.stop() {
                tracing::debug!(kind = track.kind(), label = track.label(), "stopped track");
                stopped += 1;
            }
        }
        stopped
    }
}

/// Reports the current input amplitude of a stream.
pub trait AudioLevelMeter: Send + Sync {
    /// Average amplitude on a 0..=255 scale.
    fn level(&self) -> f32;
}

/// Access to local capture devices.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Requests a microphone stream. Fails with
    /// [`VoiceError::PermissionDenied`] when the user or OS refuses, or
    /// [`VoiceError::Device`] on hardware failure. The prompt behind this
    /// call cannot be cancelled.
    async fn acquire_microphone(
        &self,
        constraints: &AudioConstraints,
    ) -> Result<MicrophoneStream, VoiceError>;

    /// Attaches a level meter to `stream`. Metering is optional; an error
    /// only disables the level signal.
    fn level_meter(&self, stream: &MicrophoneStream) -> Result<Arc<dyn AudioLevelMeter>, VoiceError>;

    /// Stops every capture track that is still live on this device set,
    /// including ones no caller remembers owning. Returns the number stopped.
    fn release_all(&self) -> usize;
}
