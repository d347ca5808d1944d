//! # Pitch Detection Module
//!
//! Time-domain autocorrelation pitch estimation for the tuner.
//!
//! ## Pipeline
//! 1. RMS noise gate
//! 2. Trim towards zero crossings
//! 3. Unnormalized autocorrelation (direct or FFT)
//! 4. Skip the zero-lag lobe, then take the strongest remaining lag
//! 5. Parabolic interpolation for sub-sample accuracy
//!
//! Every degenerate case returns `None` instead of a meaningless frequency.

use serde::{Deserialize, Serialize};

use crate::config::TunerSettings;
use crate::fft;

/// How the autocorrelation is computed. Both produce the same lags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutocorrelationMethod {
    /// Brute-force O(N²) sum.
    #[default]
    Direct,
    /// Zero-padded FFT, O(N log N).
    Fft,
}

/// Root-mean-square amplitude. Zero for an empty buffer.
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Returns the part of `signal` between the first quiet sample from the
/// start and the first quiet sample from the end.
///
/// Each scan covers only its half of the buffer. When no quiet sample is
/// found the corresponding edge is kept (minus the final sample).
pub fn trim_to_threshold(signal: &[f32], threshold: f32) -> &[f32] {
    let size = signal.len();
    if size < 2 {
        return signal;
    }

    let start = (0..size / 2)
        .find(|&i| signal[i].abs() < threshold)
        .unwrap_or(0);
    let end = (1..size / 2)
        .map(|i| size - i)
        .find(|&i| signal[i].abs() < threshold)
        .unwrap_or(size - 1);

    if start >= end {
        return &signal[..0];
    }
    &signal[start..end]
}

/// Unnormalized autocorrelation `c[i] = Σ_j s[j]·s[j+i]` for every lag.
pub fn autocorrelate(signal: &[f32]) -> Vec<f32> {
    let size = signal.len();
    (0..size)
        .map(|lag| {
            signal[..size - lag]
                .iter()
                .zip(&signal[lag..])
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect()
}

/// Integer period estimate from an autocorrelation.
///
/// Walks down the zero-lag lobe to its first dip, then picks the largest
/// positive value beyond it. A peak on the last lag cannot be refined and is
/// rejected.
pub fn find_period(correlation: &[f32]) -> Option<usize> {
    let size = correlation.len();
    if size < 3 {
        return None;
    }

    let mut dip = 0;
    while dip + 1 < size && correlation[dip] > correlation[dip + 1] {
        dip += 1;
    }

    let (period, &peak) = correlation[dip..]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(offset, value)| (dip + offset, value))?;

    if period == 0 || period + 1 >= size || !(peak > 0.0) {
        return None;
    }
    Some(period)
}

/// Refines `period` with the vertex of the parabola through its neighbours.
///
/// `period` must have a neighbour on both sides.
pub fn parabolic_vertex(correlation: &[f32], period: usize) -> f32 {
    let x1 = correlation[period - 1];
    let x2 = correlation[period];
    let x3 = correlation[period + 1];

    let a = (x1 + x3 - 2.0 * x2) / 2.0;
    let b = (x3 - x1) / 2.0;
    if a != 0.0 {
        period as f32 - b / (2.0 * a)
    } else {
        period as f32
    }
}

/// Estimates the fundamental frequency of `signal` in Hz.
///
/// # Returns
/// * `Some(frequency)` - A finite, positive estimate
/// * `None` - Silence, an empty trimmed window, or no usable peak
pub fn detect_pitch(signal: &[f32], sample_rate: u32, settings: &TunerSettings) -> Option<f32> {
    if rms(signal) < settings.silence_threshold {
        return None;
    }

    let trimmed = trim_to_threshold(signal, settings.trim_threshold);
    if trimmed.len() < 3 {
        return None;
    }

    let correlation = match settings.method {
        AutocorrelationMethod::Direct => autocorrelate(trimmed),
        AutocorrelationMethod::Fft => fft::autocorrelate(trimmed),
    };

    let period = find_period(&correlation)?;
    let refined = parabolic_vertex(&correlation, period);
    if !refined.is_finite() || refined <= 0.0 {
        return None;
    }

    let frequency = sample_rate as f32 / refined;
    if frequency.is_finite() && frequency > 0.0 {
        Some(frequency)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(frequency: f32, sample_rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn rms_of_full_scale_square_is_one() {
        let square: Vec<f32> = (0..64).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!((rms(&square) - 1.0).abs() < 1e-6);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn trim_cuts_to_first_quiet_samples() {
        let signal = [0.9, 0.5, 0.1, 0.7, 0.8, 0.6, 0.05, 0.9, 0.9, 0.9];
        let trimmed = trim_to_threshold(&signal, 0.2);
        assert_eq!(trimmed, &[0.1, 0.7, 0.8, 0.6]);
    }

    #[test]
    fn trim_keeps_buffer_without_quiet_samples() {
        let signal = [0.9f32; 8];
        assert_eq!(trim_to_threshold(&signal, 0.2).len(), 7);
    }

    #[test]
    fn autocorrelation_matches_hand_computed_lags() {
        let c = autocorrelate(&[1.0, 2.0, 3.0]);
        assert_eq!(c, vec![14.0, 8.0, 3.0]);
    }

    #[test]
    fn period_skips_zero_lag_lobe() {
        let signal = sine(100.0, 1000, 200, 1.0);
        let c = autocorrelate(&signal);
        assert_eq!(find_period(&c), Some(10));
    }

    #[test]
    fn monotonic_correlation_has_no_period() {
        let c = [5.0, 4.0, 3.0, 2.0, 1.0];
        assert_eq!(find_period(&c), None);
        assert_eq!(find_period(&[0.0; 16]), None);
    }

    #[test]
    fn parabolic_vertex_recovers_true_peak() {
        // y = -(x - 4.3)^2 sampled at 3, 4, 5.
        let c: Vec<f32> = (0..8).map(|x| -((x as f32 - 4.3).powi(2))).collect();
        assert!((parabolic_vertex(&c, 4) - 4.3).abs() < 1e-4);
    }

    #[test]
    fn silence_yields_none() {
        let settings = TunerSettings::default();
        assert_eq!(detect_pitch(&[0.0; 2048], 44_100, &settings), None);
    }

    #[test]
    fn sine_is_detected_within_one_hertz() {
        let settings = TunerSettings::default();
        for &(freq, rate) in &[(440.0, 44_100), (440.0, 48_000), (660.0, 44_100), (880.0, 48_000)] {
            let signal = sine(freq, rate, 2048, 0.8);
            let detected = detect_pitch(&signal, rate, &settings).unwrap();
            assert!(
                (detected - freq).abs() < 1.0,
                "expected {freq} Hz at {rate} Hz, got {detected}"
            );
        }
    }

    #[test]
    fn fft_method_agrees_with_direct() {
        let signal = sine(330.0, 48_000, 2048, 0.6);
        let direct = detect_pitch(&signal, 48_000, &TunerSettings::default()).unwrap();
        let fft_settings = TunerSettings {
            method: AutocorrelationMethod::Fft,
            ..TunerSettings::default()
        };
        let via_fft = detect_pitch(&signal, 48_000, &fft_settings).unwrap();
        assert!((direct - via_fft).abs() < 0.05, "{direct} vs {via_fft}");
    }

    #[test]
    fn constant_offset_is_not_a_pitch() {
        let settings = TunerSettings::default();
        assert_eq!(detect_pitch(&[0.5; 2048], 48_000, &settings), None);
    }
}
