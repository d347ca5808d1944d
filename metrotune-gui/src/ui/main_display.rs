//! # Main Display Module
//!
//! Layout for the practice window: a header with the two panel toggles and
//! whichever of the metronome or tuner panels is open.

use iced::widget::{Space, button, column, container, horizontal_space, row, slider, text};
use iced::{Alignment, Color, Element, Length};
use metrotune_core::Meter;
use metrotune_core::scheduler::{MAX_TEMPO, MIN_TEMPO};
use metrotune_core::tuning::TuningStatus;

use super::{beat_indicator, cent_meter};
use crate::{AppDisplayData, Message};

/// Highlight for the active meter and panel buttons.
const SELECTED_COLOR: Color = iced::color!(0x33, 0x73, 0xCC);
const STOP_COLOR: Color = iced::color!(0xCC, 0x33, 0x33);
const START_COLOR: Color = iced::color!(0x33, 0x99, 0x59);

/// Creates the complete main application view
pub fn create_main_view(data: &AppDisplayData, in_tune_cents: i32) -> Element<'static, Message> {
    let header = row![
        text("Metrotune").size(28),
        horizontal_space(),
        make_toggle_button("Metronome", data.metronome_open, Message::ToggleMetronomePanel),
        Space::with_width(10),
        make_toggle_button("Tuner", data.tuner_open, Message::ToggleTunerPanel),
    ]
    .align_y(Alignment::Center);

    let mut content = column![header, Space::with_height(20)].spacing(10);

    if data.metronome_open {
        content = content.push(create_metronome_panel(data));
    }
    if data.tuner_open {
        content = content.push(create_tuner_panel(data, in_tune_cents));
    }
    if let Some(message) = &data.status_message {
        content = content.push(
            text(message.clone())
                .size(14)
                .color(Color::from_rgb8(0xFF, 0x66, 0x66)),
        );
    }

    container(content.padding(20))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

/// Creates the metronome panel: meter choice, tempo, beat dots and the
/// start/stop control.
fn create_metronome_panel(data: &AppDisplayData) -> Element<'static, Message> {
    let mut meters = row![].spacing(8);
    for meter in Meter::ALL {
        meters = meters.push(make_toggle_button(
            meter.label(),
            meter == data.meter,
            Message::MeterSelected(meter),
        ));
    }

    let tempo_row = row![
        button(text("-").size(20)).on_press(Message::NudgeTempo(-1)),
        Space::with_width(10),
        slider(MIN_TEMPO..=MAX_TEMPO, data.tempo, Message::TempoChanged).width(Length::Fill),
        Space::with_width(10),
        button(text("+").size(20)).on_press(Message::NudgeTempo(1)),
    ]
    .align_y(Alignment::Center);

    let (label, color) = if data.metronome_running {
        ("Stop", STOP_COLOR)
    } else {
        ("Start", START_COLOR)
    };
    let start_stop = button(text(label).size(18))
        .padding([8, 24])
        .style(move |_theme, _status| button::Style {
            background: Some(iced::Background::Color(color)),
            text_color: Color::WHITE,
            ..button::Style::default()
        })
        .on_press(Message::ToggleMetronome);

    let beat = if data.metronome_running {
        data.current_beat
    } else {
        None
    };

    let panel = column![
        text("Metronome").size(18),
        meters,
        row![
            text(data.tempo.to_string()).size(48),
            Space::with_width(8),
            text("BPM").size(16),
        ]
        .align_y(Alignment::End),
        beat_indicator::BeatIndicator::new(data.meter.beats(), beat).view(),
        tempo_row,
        start_stop,
    ]
    .spacing(15)
    .padding(15)
    .align_x(Alignment::Center);

    container(panel).width(Length::Fill).into()
}

/// Creates the tuner panel: note, frequency, needle and tuning status.
fn create_tuner_panel(data: &AppDisplayData, in_tune_cents: i32) -> Element<'static, Message> {
    let reading = data.reading;

    let frequency_text = match reading.frequency {
        Some(hz) => format!("{:.1} Hz", hz),
        None if data.listening => "Listening...".to_string(),
        None => "Microphone off".to_string(),
    };

    let (status_text, status_color) = match reading.status {
        Some(status) => (status.label(), color_for(status)),
        None => ("", Color::WHITE),
    };

    let needle = reading.has_signal().then(|| reading.display_cents());

    let panel = column![
        text("Tuner").size(18),
        text(reading.note_name()).size(64),
        text(frequency_text).size(20),
        Space::with_height(10),
        cent_meter::CentMeter::new(needle, in_tune_cents).view(),
        row![
            text("-50").size(12),
            horizontal_space(),
            text(format!("{:+} cents", reading.display_cents())).size(14),
            horizontal_space(),
            text("+50").size(12),
        ],
        text(status_text).size(18).color(status_color),
    ]
    .spacing(10)
    .padding(15)
    .align_x(Alignment::Center);

    container(panel).width(Length::Fill).into()
}

fn color_for(status: TuningStatus) -> Color {
    match status {
        TuningStatus::InTune => cent_meter::IN_TUNE_COLOR,
        TuningStatus::Sharp => cent_meter::SHARP_COLOR,
        TuningStatus::Flat => cent_meter::FLAT_COLOR,
    }
}

/// Creates a button that is highlighted while `selected`.
fn make_toggle_button(
    label: &'static str,
    selected: bool,
    message: Message,
) -> Element<'static, Message> {
    let mut button = button(text(label).size(14)).padding([6, 12]);

    if selected {
        button = button.style(|_theme, _status| iced::widget::button::Style {
            background: Some(iced::Background::Color(SELECTED_COLOR)),
            text_color: Color::WHITE,
            ..iced::widget::button::Style::default()
        });
    }

    button.on_press(message).into()
}
