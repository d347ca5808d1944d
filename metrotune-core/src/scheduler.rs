//! # Beat Scheduler Module
//!
//! A metronome that schedules clicks slightly ahead of need. Each `tick`
//! queues every pulse that falls inside the lookahead window at an absolute
//! audio-clock time, so jitter in when `tick` runs never reaches the sound.
//! The caller re-posts `tick` once per frame while the scheduler runs.

use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::clock::{AudioClock, ClockState, Tone};
use crate::config::MetronomeSettings;
use crate::error::AudioError;
use crate::output::{self, OutputContext};

pub const MIN_TEMPO: u32 = 40;
pub const MAX_TEMPO: u32 = 240;

/// Horizon within which pulses are queued before they are due, in seconds.
pub const LOOKAHEAD_SECS: f64 = 0.1;

const CLICK_DURATION_SECS: f64 = 0.1;
const CLICK_AMPLITUDE: f32 = 0.5;
const CLICK_DECAY_FLOOR: f32 = 0.001;

const PRIMARY_ACCENT_HZ: f32 = 1000.0;
const SECONDARY_ACCENT_HZ: f32 = 800.0;
const NORMAL_BEAT_HZ: f32 = 500.0;

/// Beats per measure. `SixEight` counts six pulses with a secondary accent
/// on the fourth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Meter {
    Two,
    Three,
    #[default]
    Four,
    SixEight,
}

impl Meter {
    pub const ALL: [Meter; 4] = [Meter::Two, Meter::Three, Meter::Four, Meter::SixEight];

    pub fn beats(self) -> u32 {
        match self {
            Meter::Two => 2,
            Meter::Three => 3,
            Meter::Four => 4,
            Meter::SixEight => 6,
        }
    }

    /// Accent for the pulse at `index`, counted from the start of the meter.
    pub fn accent_for(self, index: u64) -> Accent {
        let beats = u64::from(self.beats());
        if index % beats == 0 {
            Accent::Primary
        } else if self == Meter::SixEight && index % 6 == 3 {
            Accent::Secondary
        } else {
            Accent::Normal
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Meter::Two => "2/4",
            Meter::Three => "3/4",
            Meter::Four => "4/4",
            Meter::SixEight => "6/8",
        }
    }
}

impl TryFrom<u32> for Meter {
    type Error = String;

    fn try_from(beats: u32) -> Result<Self, Self::Error> {
        match beats {
            2 => Ok(Meter::Two),
            3 => Ok(Meter::Three),
            4 => Ok(Meter::Four),
            6 => Ok(Meter::SixEight),
            other => Err(format!("unsupported beats per measure: {other}")),
        }
    }
}

impl From<Meter> for u32 {
    fn from(meter: Meter) -> Self {
        meter.beats()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accent {
    /// First beat of the measure.
    Primary,
    /// Middle of a compound 6/8 measure.
    Secondary,
    Normal,
}

impl Accent {
    pub fn frequency(self) -> f32 {
        match self {
            Accent::Primary => PRIMARY_ACCENT_HZ,
            Accent::Secondary => SECONDARY_ACCENT_HZ,
            Accent::Normal => NORMAL_BEAT_HZ,
        }
    }
}

/// A click that has been handed to the clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    /// Pulses since the counter was last reset.
    pub index: u64,
    /// Absolute clock time at which the click sounds.
    pub time: f64,
    pub beat_in_measure: u32,
    pub accent: Accent,
}

type ClockFactory<C> = Box<dyn Fn() -> Result<Rc<C>, AudioError>>;

/// Lookahead metronome over any [`AudioClock`].
pub struct BeatScheduler<C: AudioClock> {
    acquire_clock: ClockFactory<C>,
    clock: Option<Rc<C>>,
    tempo: u32,
    meter: Meter,
    volume: f32,
    is_running: bool,
    next_pulse_time: f64,
    last_pulse_time: Option<f64>,
    beat_counter: u64,
    /// Scheduled pulses whose time has not yet been reached.
    upcoming: VecDeque<Pulse>,
    current_beat: Option<u32>,
}

impl BeatScheduler<OutputContext> {
    /// A scheduler that plays through the process-wide output device.
    pub fn with_shared_output(settings: &MetronomeSettings) -> Self {
        Self::new(settings, output::shared_context)
    }
}

impl<C: AudioClock> BeatScheduler<C> {
    /// Creates a stopped scheduler. `acquire_clock` is called on the first
    /// `start` (and again after a failed one) to obtain the output clock.
    pub fn new<F>(settings: &MetronomeSettings, acquire_clock: F) -> Self
    where
        F: Fn() -> Result<Rc<C>, AudioError> + 'static,
    {
        let settings = settings.sanitized();
        Self {
            acquire_clock: Box::new(acquire_clock),
            clock: None,
            tempo: settings.tempo,
            meter: settings.beats_per_measure,
            volume: settings.volume,
            is_running: false,
            next_pulse_time: 0.0,
            last_pulse_time: None,
            beat_counter: 0,
            upcoming: VecDeque::new(),
            current_beat: None,
        }
    }

    /// Starts the pulse. Does nothing if already running.
    ///
    /// On error the scheduler stays stopped; calling `start` again retries.
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.is_running {
            return Ok(());
        }

        let clock = match &self.clock {
            Some(clock) => clock.clone(),
            None => {
                let clock = (self.acquire_clock)()?;
                self.clock = Some(clock.clone());
                clock
            }
        };

        if clock.state() == ClockState::Suspended {
            clock.resume()?;
        }

        self.beat_counter = 0;
        self.next_pulse_time = clock.current_time();
        self.last_pulse_time = None;
        self.upcoming.clear();
        self.current_beat = None;
        self.is_running = true;

        info!(
            "Metronome started at {} BPM in {}",
            self.tempo,
            self.meter.label()
        );
        Ok(())
    }

    /// Halts scheduling. The output clock stays open.
    pub fn stop(&mut self) {
        if !self.is_running {
            return;
        }
        self.is_running = false;
        self.upcoming.clear();
        self.current_beat = None;
        info!("Metronome stopped after {} pulses", self.beat_counter);
    }

    /// Sets the tempo, clamped to `[MIN_TEMPO, MAX_TEMPO]`.
    ///
    /// Pulses already queued keep their times; the next unscheduled pulse is
    /// re-spaced from the last queued one at the new interval. A speed-up
    /// that would put it in the past schedules it now, so no beat is skipped.
    pub fn set_tempo(&mut self, bpm: u32) {
        let tempo = clamp_tempo(bpm);
        if tempo == self.tempo {
            return;
        }
        debug!("Tempo {} -> {} BPM", self.tempo, tempo);
        self.tempo = tempo;

        if !self.is_running {
            return;
        }
        if let (Some(last), Some(clock)) = (self.last_pulse_time, &self.clock) {
            self.next_pulse_time = (last + self.beat_interval()).max(clock.current_time());
        }
    }

    /// Adjusts the tempo by `delta` BPM, clamped to the supported range.
    pub fn nudge_tempo(&mut self, delta: i32) {
        let target = (self.tempo as i64 + delta as i64).max(0) as u32;
        self.set_tempo(target);
    }

    /// Changes the meter. The next pulse is counted as beat one.
    pub fn set_beats_per_measure(&mut self, meter: Meter) {
        debug!("Meter {} -> {}", self.meter.label(), meter.label());
        self.meter = meter;
        self.beat_counter = 0;
        self.current_beat = None;
    }

    /// Click loudness in `[0, 1]`.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = clamp_volume(volume);
    }

    /// Runs one scheduling pass and returns the pulses it queued.
    pub fn tick(&mut self) -> Vec<Pulse> {
        let mut scheduled = Vec::new();
        if !self.is_running {
            return scheduled;
        }
        let Some(clock) = self.clock.clone() else {
            return scheduled;
        };

        let now = clock.current_time();
        self.skip_missed_pulses(now);

        while self.next_pulse_time < now + LOOKAHEAD_SECS {
            let pulse = self.schedule_pulse(clock.as_ref());
            scheduled.push(pulse);
        }

        while let Some(pulse) = self.upcoming.front() {
            if pulse.time > now {
                break;
            }
            self.current_beat = Some(pulse.beat_in_measure);
            self.upcoming.pop_front();
        }

        if !scheduled.is_empty() {
            trace!("Scheduled {} pulse(s) at clock {:.4}s", scheduled.len(), now);
        }
        scheduled
    }

    fn schedule_pulse(&mut self, clock: &C) -> Pulse {
        let index = self.beat_counter;
        let accent = self.meter.accent_for(index);
        let pulse = Pulse {
            index,
            time: self.next_pulse_time,
            beat_in_measure: (index % u64::from(self.meter.beats())) as u32,
            accent,
        };

        clock.create_tone(Tone {
            frequency: accent.frequency(),
            start_time: pulse.time,
            duration: CLICK_DURATION_SECS,
            amplitude: CLICK_AMPLITUDE * self.volume,
            decay_floor: CLICK_DECAY_FLOOR,
        });

        self.upcoming.push_back(pulse);
        self.last_pulse_time = Some(pulse.time);
        self.next_pulse_time += self.beat_interval();
        self.beat_counter += 1;
        pulse
    }

    /// Keeps `next_pulse_time` within one lookahead window of `now`. Pulses
    /// that could no longer sound on time are dropped whole, preserving phase.
    fn skip_missed_pulses(&mut self, now: f64) {
        let behind = now - LOOKAHEAD_SECS - self.next_pulse_time;
        if behind <= 0.0 {
            return;
        }
        let interval = self.beat_interval();
        let missed = (behind / interval).ceil() as u64;
        warn!("Scheduler fell behind; skipping {} pulse(s)", missed);
        self.next_pulse_time += missed as f64 * interval;
        self.beat_counter += missed;
    }

    /// Seconds between pulses at the current tempo.
    pub fn beat_interval(&self) -> f64 {
        60.0 / self.tempo as f64
    }

    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn meter(&self) -> Meter {
        self.meter
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn next_pulse_time(&self) -> f64 {
        self.next_pulse_time
    }

    pub fn beat_counter(&self) -> u64 {
        self.beat_counter
    }

    /// Beat within the measure that is sounding now, for the visual flash.
    pub fn current_beat(&self) -> Option<u32> {
        self.current_beat
    }

    pub fn settings(&self) -> MetronomeSettings {
        MetronomeSettings {
            tempo: self.tempo,
            beats_per_measure: self.meter,
            volume: self.volume,
        }
    }
}

pub fn clamp_tempo(bpm: u32) -> u32 {
    bpm.clamp(MIN_TEMPO, MAX_TEMPO)
}

pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0)
}
