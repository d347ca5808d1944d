//! # Error Module
//!
//! Failure conditions surfaced by the audio primitives. Per-cycle analysis
//! problems (silence, degenerate autocorrelation) are never errors; they are
//! reported as a "no signal" reading instead.

use thiserror::Error;

/// Errors raised while acquiring or driving an audio device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    /// The host refused access to the microphone.
    #[error("microphone access was denied")]
    PermissionDenied,

    /// No usable device, or the device is already held by another session.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The output clock could not be created or resumed.
    #[error("audio clock unavailable: {0}")]
    ClockUnavailable(String),

    /// A stream could be opened but failed while starting or running.
    #[error("audio stream error: {0}")]
    Stream(String),
}

impl AudioError {
    /// Maps a cpal stream-construction failure onto the taxonomy.
    ///
    /// cpal has no dedicated permission variant, so backend messages that
    /// mention permission are treated as a denial.
    pub(crate) fn from_build_error(err: cpal::BuildStreamError) -> Self {
        match err {
            cpal::BuildStreamError::DeviceNotAvailable => {
                AudioError::DeviceUnavailable("device not available".to_string())
            }
            cpal::BuildStreamError::BackendSpecific { err } => {
                if err.description.to_lowercase().contains("permission") {
                    AudioError::PermissionDenied
                } else {
                    AudioError::DeviceUnavailable(err.description)
                }
            }
            other => AudioError::Stream(other.to_string()),
        }
    }
}
