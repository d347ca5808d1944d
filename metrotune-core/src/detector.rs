//! # Pitch Detector Module
//!
//! The tuner's state machine. `Idle` until a microphone session is granted,
//! then `Listening`: every `tick` copies the newest window from the input and
//! turns it into a [`TunerReading`]. The caller re-posts `tick` once per frame.

use log::{debug, info, warn};

use crate::TunerReading;
use crate::config::TunerSettings;
use crate::error::AudioError;
use crate::input::{AudioInput, CpalInputGate, InputGate};
use crate::pitch;
use crate::tuning::{self, TuningStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Idle,
    Listening,
}

/// Live pitch estimation over an input obtained from `G`.
pub struct PitchDetector<G: InputGate> {
    gate: G,
    settings: TunerSettings,
    session: Option<G::Input>,
    sample_buffer: Vec<f32>,
    reading: TunerReading,
}

impl PitchDetector<CpalInputGate> {
    /// A detector on the host's default microphone.
    pub fn with_default_input(settings: &TunerSettings) -> Self {
        Self::new(CpalInputGate, settings)
    }
}

impl<G: InputGate> PitchDetector<G> {
    pub fn new(gate: G, settings: &TunerSettings) -> Self {
        let settings = settings.sanitized();
        Self {
            gate,
            sample_buffer: vec![0.0; settings.buffer_size],
            settings,
            session: None,
            reading: TunerReading::NO_SIGNAL,
        }
    }

    /// Requests the microphone and starts listening.
    ///
    /// Does nothing while a session is already open. On error the detector
    /// stays idle and the caller may retry.
    pub fn start_listening(&mut self) -> Result<(), AudioError> {
        if self.session.is_some() {
            return Ok(());
        }

        match self.gate.request_microphone_access(self.settings.buffer_size) {
            Ok(input) => {
                info!("Tuner listening at {} Hz", input.sample_rate());
                self.session = Some(input);
                self.reading = TunerReading::NO_SIGNAL;
                Ok(())
            }
            Err(e) => {
                warn!("Tuner could not start: {}", e);
                Err(e)
            }
        }
    }

    /// Stops listening and releases the input. Safe to call repeatedly.
    pub fn stop_listening(&mut self) {
        if self.session.take().is_some() {
            info!("Tuner stopped");
        }
        self.reading = TunerReading::NO_SIGNAL;
    }

    /// Runs one analysis cycle and returns the new reading.
    pub fn tick(&mut self) -> &TunerReading {
        let Some(input) = &self.session else {
            return &self.reading;
        };

        if !input.is_alive() {
            warn!("Input stream lost");
            self.stop_listening();
            return &self.reading;
        }

        input.live_samples(&mut self.sample_buffer);
        self.reading = analyze(&self.sample_buffer, input.sample_rate(), &self.settings);
        &self.reading
    }

    /// Replaces the detection settings. An open session is reopened when the
    /// window size changes.
    pub fn set_settings(&mut self, settings: &TunerSettings) -> Result<(), AudioError> {
        let settings = settings.sanitized();
        let resized = settings.buffer_size != self.settings.buffer_size;
        self.settings = settings;
        if !resized {
            return Ok(());
        }

        debug!("Tuner window is now {} samples", settings.buffer_size);
        self.sample_buffer = vec![0.0; settings.buffer_size];
        if self.session.is_some() {
            self.stop_listening();
            self.start_listening()?;
        }
        Ok(())
    }

    pub fn state(&self) -> DetectorState {
        if self.session.is_some() {
            DetectorState::Listening
        } else {
            DetectorState::Idle
        }
    }

    pub fn is_listening(&self) -> bool {
        self.session.is_some()
    }

    pub fn reading(&self) -> &TunerReading {
        &self.reading
    }

    pub fn settings(&self) -> &TunerSettings {
        &self.settings
    }
}

/// Turns one window of samples into a reading. Silence and degenerate
/// windows give [`TunerReading::NO_SIGNAL`].
pub fn analyze(samples: &[f32], sample_rate: u32, settings: &TunerSettings) -> TunerReading {
    let Some(frequency) = pitch::detect_pitch(samples, sample_rate, settings) else {
        return TunerReading::NO_SIGNAL;
    };
    let Some((note, cents)) = tuning::nearest_note(frequency) else {
        return TunerReading::NO_SIGNAL;
    };

    TunerReading {
        frequency: Some(frequency),
        note: Some(note),
        cents,
        status: Some(TuningStatus::classify(cents, settings.in_tune_cents)),
    }
}
