//! # FFT Autocorrelation Module
//!
//! Computes the same unnormalized autocorrelation as
//! [`crate::pitch::autocorrelate`] through the power spectrum
//! (Wiener–Khinchin). The signal is zero-padded to at least twice its length
//! so the circular correlation does not wrap.

use rustfft::{FftPlanner, num_complex::Complex};

/// Autocorrelation for lags `0..signal.len()`.
pub fn autocorrelate(signal: &[f32]) -> Vec<f32> {
    let size = signal.len();
    if size == 0 {
        return Vec::new();
    }

    let fft_len = (2 * size).next_power_of_two();
    let mut planner = FftPlanner::new();
    let forward = planner.plan_fft_forward(fft_len);
    let inverse = planner.plan_fft_inverse(fft_len);

    let mut buffer: Vec<Complex<f32>> = signal
        .iter()
        .map(|&sample| Complex { re: sample, im: 0.0 })
        .chain(std::iter::repeat(Complex { re: 0.0, im: 0.0 }))
        .take(fft_len)
        .collect();

    forward.process(&mut buffer);
    for bin in buffer.iter_mut() {
        *bin = Complex {
            re: bin.norm_sqr(),
            im: 0.0,
        };
    }
    inverse.process(&mut buffer);

    // rustfft leaves the inverse unnormalized.
    let scale = 1.0 / fft_len as f32;
    buffer
        .iter()
        .take(size)
        .map(|c| c.re * scale)
        .collect()
}
