//! # Settings Module
//!
//! User-facing configuration for both subsystems, persisted as JSON.
//! Out-of-range values are clamped here, at the boundary, so the scheduler
//! and detector only ever see valid settings.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::pitch::AutocorrelationMethod;
use crate::scheduler::{self, Meter};

/// File name used when no explicit settings path is given.
pub const DEFAULT_SETTINGS_FILE: &str = "metrotune.json";

const MIN_BUFFER_SIZE: usize = 256;
const MAX_BUFFER_SIZE: usize = 16384;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetronomeSettings {
    /// Beats per minute, 40 to 240.
    pub tempo: u32,
    #[serde(deserialize_with = "meter_or_default")]
    pub beats_per_measure: Meter,
    /// Click loudness, 0.0 to 1.0.
    pub volume: f32,
}

impl Default for MetronomeSettings {
    fn default() -> Self {
        Self {
            tempo: 120,
            beats_per_measure: Meter::Four,
            volume: 1.0,
        }
    }
}

impl MetronomeSettings {
    pub fn sanitized(&self) -> Self {
        Self {
            tempo: scheduler::clamp_tempo(self.tempo),
            beats_per_measure: self.beats_per_measure,
            volume: scheduler::clamp_volume(self.volume),
        }
    }
}

/// Detection thresholds. The defaults are hand-tuned and may need
/// calibration for a particular instrument or microphone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerSettings {
    /// Analysis window length in samples; always a power of two.
    pub buffer_size: usize,
    /// RMS below which a window counts as silence.
    pub silence_threshold: f32,
    /// Absolute amplitude used to trim the window towards zero crossings.
    pub trim_threshold: f32,
    /// Largest deviation, in cents, still reported as in tune.
    pub in_tune_cents: i32,
    pub method: AutocorrelationMethod,
}

impl Default for TunerSettings {
    fn default() -> Self {
        Self {
            buffer_size: 2048,
            silence_threshold: 0.01,
            trim_threshold: 0.2,
            in_tune_cents: 5,
            method: AutocorrelationMethod::Direct,
        }
    }
}

impl TunerSettings {
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let buffer_size = self
            .buffer_size
            .clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE)
            .next_power_of_two()
            .min(MAX_BUFFER_SIZE);
        let positive_or = |value: f32, fallback: f32| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                fallback
            }
        };
        Self {
            buffer_size,
            silence_threshold: positive_or(self.silence_threshold, defaults.silence_threshold),
            trim_threshold: positive_or(self.trim_threshold, defaults.trim_threshold),
            in_tune_cents: self.in_tune_cents.clamp(0, 50),
            method: self.method,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub metronome: MetronomeSettings,
    pub tuner: TunerSettings,
}

impl Settings {
    pub fn sanitized(&self) -> Self {
        Self {
            metronome: self.metronome.sanitized(),
            tuner: self.tuner.sanitized(),
        }
    }
}

/// Loads settings from a JSON file. A missing file yields the defaults.
pub fn load_settings(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    if !path.exists() {
        info!("No settings at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    let mut file =
        File::open(path).with_context(|| format!("opening settings {}", path.display()))?;
    let mut data = String::new();
    file.read_to_string(&mut data)
        .with_context(|| format!("reading settings {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&data)
        .with_context(|| format!("parsing settings {}", path.display()))?;

    let sanitized = settings.sanitized();
    if sanitized != settings {
        warn!("Settings in {} were out of range and have been clamped", path.display());
    }
    Ok(sanitized)
}

/// Writes settings as pretty-printed JSON.
pub fn save_settings(settings: &Settings, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json_string = serde_json::to_string_pretty(settings).context("serializing settings")?;
    let mut file =
        File::create(path).with_context(|| format!("creating settings {}", path.display()))?;
    file.write_all(json_string.as_bytes())
        .with_context(|| format!("writing settings {}", path.display()))?;
    Ok(())
}

/// Unknown meters fall back to 4/4 rather than rejecting the whole file.
fn meter_or_default<'de, D>(deserializer: D) -> std::result::Result<Meter, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let beats = u32::deserialize(deserializer)?;
    Ok(Meter::try_from(beats).unwrap_or_else(|e| {
        warn!("{}, falling back to 4/4", e);
        Meter::default()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn saved_settings_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = Settings::default();
        settings.metronome.tempo = 96;
        settings.metronome.beats_per_measure = Meter::SixEight;
        settings.tuner.method = AutocorrelationMethod::Fft;

        save_settings(&settings, &path).unwrap();
        assert_eq!(load_settings(&path).unwrap(), settings);
    }

    #[test]
    fn out_of_range_values_are_clamped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"metronome": {"tempo": 500, "beats_per_measure": 5, "volume": 3.0},
                "tuner": {"buffer_size": 3000, "silence_threshold": -1.0}}"#,
        )
        .unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.metronome.tempo, 240);
        assert_eq!(settings.metronome.beats_per_measure, Meter::Four);
        assert_eq!(settings.metronome.volume, 1.0);
        assert_eq!(settings.tuner.buffer_size, 4096);
        assert_eq!(settings.tuner.silence_threshold, 0.01);
        assert_eq!(settings.tuner.trim_threshold, 0.2);
    }

    #[test]
    fn meter_is_stored_as_beat_count() {
        let json = serde_json::to_string(&MetronomeSettings::default()).unwrap();
        assert!(json.contains("\"beats_per_measure\":4"), "{json}");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(load_settings(&path).is_err());
    }
}
