//! # Audio Output Module
//!
//! A cpal-backed [`AudioClock`]. The clock is derived from the number of
//! frames the device has rendered, so it is sample-accurate and independent
//! of how often the UI thread polls it.
//!
//! Tones travel to the audio callback over a crossbeam channel and are mixed
//! in starting at the exact frame that corresponds to their start time.
//!
//! One output context exists per process. It is created lazily by
//! [`shared_context`] and lives until exit; [`suspend_shared_context`] is the
//! teardown hook that silences it.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfig};
use crossbeam_channel::{Receiver, Sender};
use log::{error, info, warn};
use once_cell::unsync::OnceCell;

use crate::clock::{AudioClock, ClockState, Tone};
use crate::error::AudioError;

/// Tones the renderer can hold without allocating on the audio thread.
const MAX_ACTIVE_TONES: usize = 64;

thread_local! {
    static SHARED_CONTEXT: OnceCell<Rc<OutputContext>> = const { OnceCell::new() };
}

/// Returns the process-wide output context, creating it on first use.
///
/// A failed creation is not cached; the next call tries again.
pub fn shared_context() -> Result<Rc<OutputContext>, AudioError> {
    SHARED_CONTEXT.with(|cell| {
        cell.get_or_try_init(|| {
            OutputContext::open()
                .map(Rc::new)
                .map_err(|e| AudioError::ClockUnavailable(e.to_string()))
        })
        .cloned()
    })
}

/// Suspends the shared context if it was ever created. Call at shutdown.
pub fn suspend_shared_context() {
    SHARED_CONTEXT.with(|cell| {
        if let Some(context) = cell.get() {
            context.suspend();
        }
    });
}

/// The default output device, wrapped as an audio clock.
pub struct OutputContext {
    stream: cpal::Stream,
    sample_rate: u32,
    frames_rendered: Arc<AtomicU64>,
    tone_tx: Sender<Tone>,
    state: Cell<ClockState>,
}

impl OutputContext {
    /// Opens the default output device in the suspended state.
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available"))?;

        info!("Using audio output device: {}", device.name()?);

        let supported = select_output_config(&device)?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config: cpal::StreamConfig = supported.into();

        info!("Output stream: {} Hz, {} channel(s)", sample_rate, channels);

        let frames_rendered = Arc::new(AtomicU64::new(0));
        let (tone_tx, tone_rx) = crossbeam_channel::unbounded();
        let mut renderer = ToneRenderer::new(tone_rx, sample_rate, channels);
        let callback_frames = frames_rendered.clone();

        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let start_frame = callback_frames.load(Ordering::Acquire);
                let frames = renderer.render(data, start_frame);
                callback_frames.store(start_frame + frames, Ordering::Release);
            },
            |err| error!("An error occurred on the output stream: {}", err),
            None,
        )?;

        // Some backends start streams immediately.
        if let Err(e) = stream.pause() {
            warn!("Could not pause new output stream: {}", e);
        }

        Ok(Self {
            stream,
            sample_rate,
            frames_rendered,
            tone_tx,
            state: Cell::new(ClockState::Suspended),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Stops rendering without tearing the stream down.
    pub fn suspend(&self) {
        if self.state.get() == ClockState::Suspended {
            return;
        }
        match self.stream.pause() {
            Ok(()) => {
                info!("Output context suspended");
                self.state.set(ClockState::Suspended);
            }
            Err(e) => warn!("Failed to suspend output stream: {}", e),
        }
    }
}

impl AudioClock for OutputContext {
    fn current_time(&self) -> f64 {
        self.frames_rendered.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn create_tone(&self, tone: Tone) {
        // The receiver only disappears together with the stream.
        let _ = self.tone_tx.send(tone);
    }

    fn state(&self) -> ClockState {
        self.state.get()
    }

    fn resume(&self) -> Result<(), AudioError> {
        if self.state.get() == ClockState::Running {
            return Ok(());
        }
        self.stream
            .play()
            .map_err(|e| AudioError::ClockUnavailable(e.to_string()))?;
        info!("Output context resumed");
        self.state.set(ClockState::Running);
        Ok(())
    }
}

/// Picks an f32 output configuration, preferring the device default.
fn select_output_config(device: &cpal::Device) -> Result<SupportedStreamConfig> {
    if let Ok(default) = device.default_output_config() {
        if default.sample_format() == SampleFormat::F32 {
            return Ok(default);
        }
    }

    device
        .supported_output_configs()?
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .max_by_key(|c| c.max_sample_rate().0)
        .map(|c| c.with_max_sample_rate())
        .ok_or_else(|| anyhow!("No suitable f32 output format found"))
}

/// Mixes queued tones into interleaved output buffers. Lives on the audio
/// thread.
struct ToneRenderer {
    incoming: Receiver<Tone>,
    active: Vec<Tone>,
    sample_rate: f64,
    channels: usize,
}

impl ToneRenderer {
    fn new(incoming: Receiver<Tone>, sample_rate: u32, channels: usize) -> Self {
        Self {
            incoming,
            active: Vec::with_capacity(MAX_ACTIVE_TONES),
            sample_rate: sample_rate as f64,
            channels: channels.max(1),
        }
    }

    /// Fills `data` starting at clock frame `start_frame` and returns the
    /// number of frames written.
    fn render(&mut self, data: &mut [f32], start_frame: u64) -> u64 {
        while let Ok(tone) = self.incoming.try_recv() {
            self.active.push(tone);
        }

        let block_start = start_frame as f64 / self.sample_rate;
        self.active.retain(|tone| tone.end_time() > block_start);

        let mut frames = 0u64;
        for (i, frame) in data.chunks_mut(self.channels).enumerate() {
            let t = (start_frame + i as u64) as f64 / self.sample_rate;
            let value: f32 = self
                .active
                .iter()
                .map(|tone| tone.sample_at(t - tone.start_time))
                .sum();
            let value = value.clamp(-1.0, 1.0);
            for sample in frame.iter_mut() {
                *sample = value;
            }
            frames += 1;
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_at(start_time: f64) -> Tone {
        Tone {
            frequency: 1000.0,
            start_time,
            duration: 0.1,
            amplitude: 0.5,
            decay_floor: 0.001,
        }
    }

    #[test]
    fn renderer_is_silent_before_tone_start() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut renderer = ToneRenderer::new(rx, 1000, 2);
        tx.send(tone_at(1.0)).unwrap();

        let mut block = vec![1.0f32; 200];
        let frames = renderer.render(&mut block, 0);
        assert_eq!(frames, 100);
        assert!(block.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn renderer_writes_tone_into_every_channel() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut renderer = ToneRenderer::new(rx, 48_000, 2);
        tx.send(tone_at(0.0)).unwrap();

        let mut block = vec![0.0f32; 64];
        renderer.render(&mut block, 0);
        assert!(block.iter().any(|&s| s != 0.0));
        for frame in block.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn active_tones_are_preallocated() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut renderer = ToneRenderer::new(rx, 48_000, 1);
        let capacity = renderer.active.capacity();
        assert!(capacity >= MAX_ACTIVE_TONES);

        for i in 0..MAX_ACTIVE_TONES {
            tx.send(tone_at(i as f64 * 0.001)).unwrap();
        }
        let mut block = vec![0.0f32; 32];
        renderer.render(&mut block, 0);
        assert_eq!(renderer.active.len(), MAX_ACTIVE_TONES);
        assert_eq!(renderer.active.capacity(), capacity);
    }

    #[test]
    fn finished_tones_are_dropped() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut renderer = ToneRenderer::new(rx, 1000, 1);
        tx.send(tone_at(0.0)).unwrap();

        let mut block = vec![0.0f32; 10];
        renderer.render(&mut block, 0);
        assert_eq!(renderer.active.len(), 1);

        renderer.render(&mut block, 500);
        assert!(renderer.active.is_empty());
    }
}
