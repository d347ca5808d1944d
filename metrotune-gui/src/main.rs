//! # Metrotune - Practice Metronome and Tuner GUI
//!
//! The desktop front end for `metrotune-core`. It renders the beat indicator
//! and the tuner needle; all timing and analysis happen in the core.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application with dark theme
//! - **Audio Threads**: cpal callbacks owned by the core's output and input
//! - **Updates**: a 16 ms `Tick` subscription re-posts the scheduler and
//!   detector cycles while either is active, and is dropped when both are idle

mod ui;

use std::path::PathBuf;
use std::time::Duration;

use iced::{Element, Subscription, Task, Theme};
use log::{error, info, warn};
use metrotune_core::config::{self, DEFAULT_SETTINGS_FILE, Settings};
use metrotune_core::input::CpalInputGate;
use metrotune_core::output::{self, OutputContext};
use metrotune_core::{BeatScheduler, Meter, PitchDetector, TunerReading};
use ui::main_display::create_main_view;

/// Interval of the per-frame re-post, roughly 60 FPS.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Main entry point for the Metrotune application.
pub fn main() -> iced::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting Metrotune...");
    let result = iced::application("Metrotune", PracticeApp::update, PracticeApp::view)
        .subscription(PracticeApp::subscription)
        .theme(PracticeApp::theme)
        .exit_on_close_request(false)
        .run();
    info!("Application finished with result: {:?}", result);
    result
}

/// Application message types for the Iced GUI framework.
#[derive(Debug, Clone)]
pub enum Message {
    // Panels; opening one closes the other
    ToggleMetronomePanel,
    ToggleTunerPanel,

    // Metronome controls
    ToggleMetronome,
    TempoChanged(u32),
    NudgeTempo(i32),
    MeterSelected(Meter),

    // Continuous update message
    Tick,

    // Application control
    CloseRequested(iced::window::Id),
}

/// UI-specific data needed for rendering the interface.
#[derive(Debug, Clone)]
pub struct AppDisplayData {
    pub metronome_open: bool,
    pub tuner_open: bool,

    pub metronome_running: bool,
    pub tempo: u32,
    pub meter: Meter,
    pub current_beat: Option<u32>,

    pub listening: bool,
    pub reading: TunerReading,

    /// Last device problem, shown until the next successful action.
    pub status_message: Option<String>,
}

/// Main application state.
struct PracticeApp {
    scheduler: BeatScheduler<OutputContext>,
    detector: PitchDetector<CpalInputGate>,
    settings_path: PathBuf,

    // Single source of truth for all display data
    display_data: AppDisplayData,
}

impl Default for PracticeApp {
    /// Loads persisted settings and builds both subsystems stopped. No audio
    /// device is touched until the user starts something.
    fn default() -> Self {
        let settings_path = PathBuf::from(DEFAULT_SETTINGS_FILE);
        let settings = config::load_settings(&settings_path).unwrap_or_else(|e| {
            warn!("Could not load settings, using defaults: {:#}", e);
            Settings::default()
        });

        let scheduler = BeatScheduler::with_shared_output(&settings.metronome);
        let detector = PitchDetector::with_default_input(&settings.tuner);

        let display_data = AppDisplayData {
            metronome_open: true,
            tuner_open: false,
            metronome_running: false,
            tempo: scheduler.tempo(),
            meter: scheduler.meter(),
            current_beat: None,
            listening: false,
            reading: TunerReading::NO_SIGNAL,
            status_message: None,
        };

        Self {
            scheduler,
            detector,
            settings_path,
            display_data,
        }
    }
}

impl PracticeApp {
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::ToggleMetronomePanel => {
                self.display_data.metronome_open = !self.display_data.metronome_open;
                if self.display_data.metronome_open && self.display_data.tuner_open {
                    self.close_tuner();
                }
            }
            Message::ToggleTunerPanel => {
                if self.display_data.tuner_open {
                    self.close_tuner();
                } else {
                    self.display_data.tuner_open = true;
                    self.display_data.metronome_open = false;
                    match self.detector.start_listening() {
                        Ok(()) => self.display_data.status_message = None,
                        Err(e) => {
                            error!("Tuner unavailable: {}", e);
                            self.display_data.status_message = Some(format!("Tuner: {e}"));
                        }
                    }
                }
            }
            Message::ToggleMetronome => {
                if self.scheduler.is_running() {
                    self.scheduler.stop();
                } else {
                    match self.scheduler.start() {
                        Ok(()) => self.display_data.status_message = None,
                        Err(e) => {
                            error!("Metronome unavailable: {}", e);
                            self.display_data.status_message = Some(format!("Metronome: {e}"));
                        }
                    }
                }
            }
            Message::TempoChanged(bpm) => self.scheduler.set_tempo(bpm),
            Message::NudgeTempo(delta) => self.scheduler.nudge_tempo(delta),
            Message::MeterSelected(meter) => self.scheduler.set_beats_per_measure(meter),
            Message::Tick => {
                self.scheduler.tick();
                self.detector.tick();
            }
            Message::CloseRequested(_) => {
                self.shutdown();
                return iced::exit();
            }
        }

        self.refresh_display_data();
        Task::none()
    }

    fn close_tuner(&mut self) {
        self.display_data.tuner_open = false;
        self.detector.stop_listening();
    }

    /// Copies what the view needs out of the subsystems.
    fn refresh_display_data(&mut self) {
        let data = &mut self.display_data;
        data.metronome_running = self.scheduler.is_running();
        data.tempo = self.scheduler.tempo();
        data.meter = self.scheduler.meter();
        data.current_beat = self.scheduler.current_beat();
        data.listening = self.detector.is_listening();
        data.reading = *self.detector.reading();
    }

    /// Stops both subsystems, silences the output and persists settings.
    fn shutdown(&mut self) {
        info!("Window close requested - starting cleanup...");
        self.scheduler.stop();
        self.detector.stop_listening();
        output::suspend_shared_context();

        let settings = Settings {
            metronome: self.scheduler.settings(),
            tuner: *self.detector.settings(),
        };
        match config::save_settings(&settings, &self.settings_path) {
            Ok(()) => info!("Settings saved to {}", self.settings_path.display()),
            Err(e) => error!("Error saving settings: {:#}", e),
        }
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.display_data, self.detector.settings().in_tune_cents)
    }

    /// The frame tick only runs while something needs it; dropping it is
    /// what cancels the re-post when both subsystems stop.
    fn subscription(&self) -> Subscription<Message> {
        let close = iced::window::close_requests().map(Message::CloseRequested);
        if self.scheduler.is_running() || self.detector.is_listening() {
            Subscription::batch([
                iced::time::every(FRAME_INTERVAL).map(|_| Message::Tick),
                close,
            ])
        } else {
            close
        }
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}
