// metrotune-core/src/lib.rs

//! The core logic for the practice metronome and chromatic tuner.
//! This crate is responsible for click scheduling on the audio clock,
//! microphone capture and autocorrelation pitch detection. It is completely
//! headless and contains no GUI code.

pub mod clock;
pub mod config;
pub mod detector;
pub mod error;
pub mod fft;
pub mod input;
pub mod output;
pub mod pitch;
pub mod scheduler;
pub mod tuning;

pub use detector::PitchDetector;
pub use error::AudioError;
pub use scheduler::{BeatScheduler, Meter};

use tuning::{NO_NOTE, Note, TuningStatus};

/// Largest deviation the tuner needle shows, in cents.
pub const DISPLAY_CENTS_RANGE: i32 = 50;

/// What the tuner publishes after each analysis cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TunerReading {
    /// Estimated fundamental in Hz; `None` means no signal.
    pub frequency: Option<f32>,
    /// Nearest equal-tempered note.
    pub note: Option<Note>,
    /// Signed deviation from `note`, 0 when there is no signal.
    pub cents: i32,
    pub status: Option<TuningStatus>,
}

impl TunerReading {
    pub const NO_SIGNAL: TunerReading = TunerReading {
        frequency: None,
        note: None,
        cents: 0,
        status: None,
    };

    pub fn has_signal(&self) -> bool {
        self.frequency.is_some()
    }

    /// Pitch class name, or `"-"` without a signal.
    pub fn note_name(&self) -> &'static str {
        self.note.map_or(NO_NOTE, |note| note.name())
    }

    /// Cents limited to the needle's range. Detection never uses this.
    pub fn display_cents(&self) -> i32 {
        self.cents.clamp(-DISPLAY_CENTS_RANGE, DISPLAY_CENTS_RANGE)
    }
}

impl Default for TunerReading {
    fn default() -> Self {
        Self::NO_SIGNAL
    }
}
