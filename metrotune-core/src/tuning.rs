//! # Musical Tuning Module
//!
//! Maps frequencies onto the equal-tempered chromatic scale referenced to
//! A4 = 440 Hz, using MIDI note numbers (A4 = 69).

use std::fmt;

/// Reference pitch for A4 in Hz.
pub const A4_FREQUENCY: f32 = 440.0;
/// MIDI note number of A4.
pub const A4_NOTE_NUMBER: i32 = 69;

pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Placeholder shown when there is no pitch.
pub const NO_NOTE: &str = "-";

/// A chromatic pitch identified by its MIDI note number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub number: i32,
}

impl Note {
    pub fn name(&self) -> &'static str {
        note_name(self.number)
    }

    /// Scientific pitch octave (C4 is middle C).
    pub fn octave(&self) -> i32 {
        self.number.div_euclid(12) - 1
    }

    /// Exact equal-tempered frequency of this note.
    pub fn frequency(&self) -> f32 {
        frequency_of(self.number)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name(), self.octave())
    }
}

/// Whether a reading is flat, sharp, or close enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningStatus {
    Flat,
    InTune,
    Sharp,
}

impl TuningStatus {
    /// Classifies `cents` against a symmetric tolerance.
    pub fn classify(cents: i32, tolerance: i32) -> Self {
        if cents > tolerance {
            TuningStatus::Sharp
        } else if cents < -tolerance {
            TuningStatus::Flat
        } else {
            TuningStatus::InTune
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TuningStatus::Flat => "Too Flat",
            TuningStatus::InTune => "In Tune",
            TuningStatus::Sharp => "Too Sharp",
        }
    }
}

/// Nearest note number for `freq`, or `None` for non-positive or
/// non-finite input.
pub fn note_number(freq: f32) -> Option<i32> {
    if !freq.is_finite() || freq <= 0.0 {
        return None;
    }
    let semitones = 12.0 * (freq / A4_FREQUENCY).log2() + A4_NOTE_NUMBER as f32;
    if !semitones.is_finite() {
        return None;
    }
    Some(semitones.round() as i32)
}

pub fn note_name(number: i32) -> &'static str {
    NOTE_NAMES[number.rem_euclid(12) as usize]
}

/// Equal-tempered frequency of a MIDI note number.
pub fn frequency_of(number: i32) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf((number - A4_NOTE_NUMBER) as f32 / 12.0)
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values flat; 100 cents is one
/// semitone.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// Finds the nearest note and the signed deviation from it, rounded down to
/// whole cents.
pub fn nearest_note(freq: f32) -> Option<(Note, i32)> {
    let number = note_number(freq)?;
    let note = Note { number };
    let cents = calculate_cents_deviation(freq, note.frequency()).floor();
    if !cents.is_finite() {
        return None;
    }
    Some((note, cents as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concert_a_maps_to_a4() {
        let (note, cents) = nearest_note(440.0).unwrap();
        assert_eq!(note.number, 69);
        assert_eq!(note.name(), "A");
        assert_eq!(note.to_string(), "A4");
        assert_eq!(cents, 0);
    }

    #[test]
    fn middle_c_is_c4() {
        let (note, _) = nearest_note(261.63).unwrap();
        assert_eq!(note.to_string(), "C4");
    }

    #[test]
    fn slightly_sharp_and_flat_readings() {
        let (_, sharp) = nearest_note(445.0).unwrap();
        assert_eq!(sharp, 19);
        let (_, flat) = nearest_note(435.0).unwrap();
        assert_eq!(flat, -20);
    }

    #[test]
    fn quarter_tone_above_rounds_to_next_semitone() {
        // 52 cents above A4 is nearer A#4.
        let freq = 440.0 * 2.0_f32.powf(52.0 / 1200.0);
        let (note, cents) = nearest_note(freq).unwrap();
        assert_eq!(note.name(), "A#");
        assert!((-49..=-47).contains(&cents), "cents {cents}");
    }

    #[test]
    fn invalid_frequencies_have_no_note() {
        assert_eq!(nearest_note(0.0), None);
        assert_eq!(nearest_note(-12.0), None);
        assert_eq!(nearest_note(f32::NAN), None);
        assert_eq!(nearest_note(f32::INFINITY), None);
    }

    #[test]
    fn status_uses_five_cent_window() {
        assert_eq!(TuningStatus::classify(6, 5), TuningStatus::Sharp);
        assert_eq!(TuningStatus::classify(5, 5), TuningStatus::InTune);
        assert_eq!(TuningStatus::classify(-5, 5), TuningStatus::InTune);
        assert_eq!(TuningStatus::classify(-6, 5), TuningStatus::Flat);
    }

    #[test]
    fn low_notes_wrap_names_correctly() {
        assert_eq!(note_name(-1), "B");
        assert_eq!(Note { number: 0 }.to_string(), "C-1");
    }
}
