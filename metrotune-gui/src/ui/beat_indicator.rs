//! # Beat Indicator Widget
//!
//! One dot per beat of the measure. The downbeat dot is drawn larger and the
//! dot for the beat currently sounding is lit.

use iced::widget::canvas::{self, Geometry, Path};
use iced::widget::container;
use iced::{Color, Element, Point, Rectangle, Renderer, Theme, mouse};

const DOT_RADIUS: f32 = 10.0;
const DOWNBEAT_RADIUS: f32 = 14.0;
const DOT_SPACING: f32 = 44.0;

const IDLE_COLOR: Color = iced::color!(0x55, 0x55, 0x55);
const ACTIVE_COLOR: Color = iced::color!(0x60, 0xA5, 0xFA);
const ACTIVE_DOWNBEAT_COLOR: Color = iced::color!(0xF5, 0x9E, 0x0B);

pub struct BeatIndicator {
    beats: u32,
    /// Zero-based beat within the measure, `None` when stopped.
    active: Option<u32>,
}

impl BeatIndicator {
    pub fn new(beats: u32, active: Option<u32>) -> Self {
        Self { beats, active }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fixed(2.0 * DOWNBEAT_RADIUS + 8.0)),
        )
        .into()
    }
}

impl<Message> canvas::Program<Message> for BeatIndicator {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        let total_width = DOT_SPACING * self.beats.saturating_sub(1) as f32;
        let start_x = (bounds.width - total_width) / 2.0;
        let center_y = bounds.height / 2.0;

        for beat in 0..self.beats {
            let downbeat = beat == 0;
            let radius = if downbeat { DOWNBEAT_RADIUS } else { DOT_RADIUS };
            let color = match (self.active == Some(beat), downbeat) {
                (true, true) => ACTIVE_DOWNBEAT_COLOR,
                (true, false) => ACTIVE_COLOR,
                (false, _) => IDLE_COLOR,
            };

            let center = Point::new(start_x + beat as f32 * DOT_SPACING, center_y);
            frame.fill(&Path::circle(center, radius), color);
        }

        vec![frame.into_geometry()]
    }
}
