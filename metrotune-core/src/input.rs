//! # Audio Input Module
//!
//! Live microphone capture for the tuner. The cpal callback keeps a rolling
//! window of the most recent samples; the analysis loop copies the newest
//! `N` of them on every cycle.
//!
//! ## Exclusivity
//! At most one [`MicrophoneInput`] exists per process. Requesting a second
//! one while the first is alive fails with `DeviceUnavailable`. Dropping the
//! session pauses the stream and releases the device.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfigRange};
use log::{error, info, warn};

use crate::error::AudioError;

/// Sample rate requested from the input device when it offers a choice.
pub const TARGET_SAMPLE_RATE: u32 = 48_000;

static INPUT_CLAIMED: AtomicBool = AtomicBool::new(false);

/// A source of recent input samples normalized to `[-1, 1]`.
pub trait AudioInput {
    /// Fills `out` with the newest `out.len()` samples, oldest first.
    /// Positions not yet covered by captured audio are zero.
    fn live_samples(&self, out: &mut [f32]);

    fn sample_rate(&self) -> u32;

    /// `false` once the underlying stream has failed.
    fn is_alive(&self) -> bool {
        true
    }
}

/// Grants access to an input device.
pub trait InputGate {
    type Input: AudioInput;

    /// Opens an input session holding at least `buffer_len` recent samples.
    fn request_microphone_access(&self, buffer_len: usize) -> Result<Self::Input, AudioError>;
}

/// Fixed-capacity window over the newest samples.
#[derive(Debug)]
pub struct RollingBuffer {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl RollingBuffer {
    pub fn new(capacity: usize) -> Self {
        let mut samples = VecDeque::with_capacity(capacity);
        samples.resize(capacity, 0.0);
        Self { samples, capacity }
    }

    pub fn push_slice(&mut self, data: &[f32]) {
        let data = if data.len() > self.capacity {
            &data[data.len() - self.capacity..]
        } else {
            data
        };
        let overflow = (self.samples.len() + data.len()).saturating_sub(self.capacity);
        self.samples.drain(..overflow);
        self.samples.extend(data.iter().copied());
    }

    /// Copies the newest `out.len()` samples into `out`.
    pub fn copy_latest(&self, out: &mut [f32]) {
        let available = self.samples.len().min(out.len());
        let pad = out.len() - available;
        out[..pad].fill(0.0);
        let skip = self.samples.len() - available;
        for (dst, src) in out[pad..].iter_mut().zip(self.samples.iter().skip(skip)) {
            *dst = *src;
        }
    }
}

/// The host's default microphone, through cpal.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalInputGate;

impl InputGate for CpalInputGate {
    type Input = MicrophoneInput;

    fn request_microphone_access(&self, buffer_len: usize) -> Result<MicrophoneInput, AudioError> {
        if INPUT_CLAIMED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AudioError::DeviceUnavailable(
                "input already held by another session".to_string(),
            ));
        }

        MicrophoneInput::open(buffer_len).inspect_err(|_| {
            INPUT_CLAIMED.store(false, Ordering::Release);
        })
    }
}

/// A live capture session. Released on drop.
pub struct MicrophoneInput {
    stream: cpal::Stream,
    sample_rate: u32,
    buffer: Arc<Mutex<RollingBuffer>>,
    alive: Arc<AtomicBool>,
}

impl MicrophoneInput {
    fn open(buffer_len: usize) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceUnavailable("No input device available".to_string()))?;

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        info!("Using audio input device: {}", device_name);

        let configs = device
            .supported_input_configs()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?
            .collect::<Vec<_>>();
        let (supported, sample_rate) = find_supported_config(configs, TARGET_SAMPLE_RATE)
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        let config = supported.with_sample_rate(cpal::SampleRate(sample_rate));
        let channels = (config.channels() as usize).max(1);
        let config: cpal::StreamConfig = config.into();

        info!("Selected input: {} Hz, {} channel(s)", sample_rate, channels);

        let buffer = Arc::new(Mutex::new(RollingBuffer::new(buffer_len)));
        let alive = Arc::new(AtomicBool::new(true));
        let callback_buffer = buffer.clone();
        let error_flag = alive.clone();
        let mut mono = Vec::with_capacity(buffer_len);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    mono.clear();
                    mono.extend(
                        data.chunks(channels)
                            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
                    );
                    if let Ok(mut rolling) = callback_buffer.lock() {
                        rolling.push_slice(&mono);
                    }
                },
                move |err| {
                    error!("An error occurred on the input stream: {}", err);
                    error_flag.store(false, Ordering::Release);
                },
                None,
            )
            .map_err(AudioError::from_build_error)?;

        stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        Ok(Self {
            stream,
            sample_rate,
            buffer,
            alive,
        })
    }
}

impl AudioInput for MicrophoneInput {
    fn live_samples(&self, out: &mut [f32]) {
        match self.buffer.lock() {
            Ok(rolling) => rolling.copy_latest(out),
            Err(_) => out.fill(0.0),
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

impl Drop for MicrophoneInput {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            warn!("Error pausing input stream: {}", e);
        }
        INPUT_CLAIMED.store(false, Ordering::Release);
        info!("Microphone released");
    }
}

/// Picks an f32 input configuration, preferring mono and the sample rate
/// closest to `target_rate`. Returns the config and the rate to request.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> anyhow::Result<(SupportedStreamConfigRange, u32)> {
    let best = configs
        .into_iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .min_by_key(|c| {
            let min = c.min_sample_rate().0;
            let max = c.max_sample_rate().0;
            let rate_miss = if target_rate < min {
                min - target_rate
            } else {
                target_rate.saturating_sub(max)
            };
            (rate_miss, c.channels())
        })
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = target_rate.clamp(best.min_sample_rate().0, best.max_sample_rate().0);
    Ok((best, rate))
}
