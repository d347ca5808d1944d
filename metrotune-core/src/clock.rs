//! # Audio Clock Module
//!
//! The clock abstraction shared by the metronome and the output device.
//! Times are absolute seconds on the audio clock, never wall-clock time, so a
//! tone scheduled for `t` sounds at `t` no matter when the scheduling call
//! itself happened to run.

use std::cell::{Cell, RefCell};
use std::f32::consts::PI;

use crate::error::AudioError;

/// Power state of an output clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    /// Rendering; `current_time` advances.
    Running,
    /// Created but not rendering (power saving, or awaiting user interaction).
    Suspended,
}

/// A synthesized sine burst at an absolute clock time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency: f32,
    pub start_time: f64,
    pub duration: f64,
    pub amplitude: f32,
    /// Gain the exponential envelope reaches at the end of the tone.
    pub decay_floor: f32,
}

impl Tone {
    /// Clock time at which the tone falls silent.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Envelope gain `elapsed` seconds after the tone started.
    pub fn gain_at(&self, elapsed: f64) -> f32 {
        if elapsed < 0.0 || elapsed >= self.duration || self.duration <= 0.0 {
            return 0.0;
        }
        if self.amplitude <= 0.0 || self.decay_floor <= 0.0 {
            return 0.0;
        }
        let progress = (elapsed / self.duration) as f32;
        self.amplitude * (self.decay_floor / self.amplitude).powf(progress)
    }

    /// Output sample value `elapsed` seconds after the tone started.
    pub fn sample_at(&self, elapsed: f64) -> f32 {
        let phase = 2.0 * PI * self.frequency * elapsed as f32;
        phase.sin() * self.gain_at(elapsed)
    }
}

/// A sample-accurate time source that can also schedule tones.
///
/// Implementations use interior mutability: one clock is shared by every
/// scheduler in the process and is only touched from the UI thread.
pub trait AudioClock {
    /// Monotonically increasing time in seconds.
    fn current_time(&self) -> f64;

    /// Queues a tone for playback at `tone.start_time`.
    fn create_tone(&self, tone: Tone);

    fn state(&self) -> ClockState;

    /// Leaves the suspended state. A no-op when already running.
    fn resume(&self) -> Result<(), AudioError>;
}

/// A clock that only moves when told to.
///
/// Every tone handed to it is recorded, which makes scheduling behaviour
/// observable without an audio device.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<f64>,
    state: Cell<ClockState>,
    refuse_resume: Cell<bool>,
    tones: RefCell<Vec<Tone>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// A running clock at time zero.
    pub fn new() -> Self {
        Self {
            now: Cell::new(0.0),
            state: Cell::new(ClockState::Running),
            refuse_resume: Cell::new(false),
            tones: RefCell::new(Vec::new()),
        }
    }

    /// A clock that starts suspended, like a fresh browser-style context.
    pub fn suspended() -> Self {
        let clock = Self::new();
        clock.state.set(ClockState::Suspended);
        clock
    }

    /// Makes subsequent `resume` calls fail until cleared.
    pub fn set_refuse_resume(&self, refuse: bool) {
        self.refuse_resume.set(refuse);
    }

    pub fn advance(&self, seconds: f64) {
        if self.state.get() == ClockState::Running {
            self.now.set(self.now.get() + seconds.max(0.0));
        }
    }

    pub fn set_time(&self, seconds: f64) {
        if seconds > self.now.get() {
            self.now.set(seconds);
        }
    }

    /// All tones scheduled so far, in scheduling order.
    pub fn tones(&self) -> Vec<Tone> {
        self.tones.borrow().clone()
    }
}

impl AudioClock for ManualClock {
    fn current_time(&self) -> f64 {
        self.now.get()
    }

    fn create_tone(&self, tone: Tone) {
        self.tones.borrow_mut().push(tone);
    }

    fn state(&self) -> ClockState {
        self.state.get()
    }

    fn resume(&self) -> Result<(), AudioError> {
        if self.refuse_resume.get() {
            return Err(AudioError::ClockUnavailable(
                "resume refused by host".to_string(),
            ));
        }
        self.state.set(ClockState::Running);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click() -> Tone {
        Tone {
            frequency: 1000.0,
            start_time: 1.0,
            duration: 0.1,
            amplitude: 0.5,
            decay_floor: 0.001,
        }
    }

    #[test]
    fn exponential_envelope_ramps_to_floor() {
        let tone = click();
        assert!((tone.gain_at(0.0) - 0.5).abs() < 1e-6);
        let near_end = tone.gain_at(0.0999);
        assert!(near_end < 0.0011 && near_end > 0.0009, "gain {near_end}");
        assert_eq!(tone.gain_at(0.1), 0.0);
        assert_eq!(tone.gain_at(-0.01), 0.0);
    }

    #[test]
    fn silent_or_degenerate_tones_have_no_gain() {
        let quiet = Tone {
            amplitude: 0.0,
            ..click()
        };
        assert_eq!(quiet.gain_at(0.01), 0.0);
        let instant = Tone {
            duration: 0.0,
            ..click()
        };
        assert_eq!(instant.gain_at(0.0), 0.0);
    }

    #[test]
    fn suspended_manual_clock_does_not_advance_until_resumed() {
        let clock = ManualClock::suspended();
        clock.advance(1.0);
        assert_eq!(clock.current_time(), 0.0);

        clock.resume().unwrap();
        clock.advance(1.0);
        assert_eq!(clock.current_time(), 1.0);
    }

    #[test]
    fn refused_resume_keeps_clock_suspended() {
        let clock = ManualClock::suspended();
        clock.set_refuse_resume(true);
        assert!(clock.resume().is_err());
        assert_eq!(clock.state(), ClockState::Suspended);
    }
}
