//! # Cent Meter Widget
//!
//! A horizontal needle showing how far the detected pitch sits from the
//! nearest note. The scale spans -50 to +50 cents with the center marking
//! perfect tuning; the shaded band is the in-tune window.

use iced::widget::canvas::{self, Geometry, Path, Stroke};
use iced::widget::container;
use iced::{Color, Element, Point, Rectangle, Renderer, Size, Theme, mouse};
use metrotune_core::DISPLAY_CENTS_RANGE;

pub const IN_TUNE_COLOR: Color = iced::color!(0x34, 0xD3, 0x99);
pub const SHARP_COLOR: Color = iced::color!(0xFB, 0x71, 0x85);
pub const FLAT_COLOR: Color = iced::color!(0x38, 0xBD, 0xF8);

pub struct CentMeter {
    /// Needle position, already limited to the display range. `None` hides it.
    cents: Option<i32>,
    in_tune_cents: i32,
}

impl CentMeter {
    /// Creates a new cent meter widget.
    ///
    /// # Arguments
    /// * `cents` - Needle deviation, or `None` when there is no pitch
    /// * `in_tune_cents` - Half-width of the in-tune band
    pub fn new(cents: Option<i32>, in_tune_cents: i32) -> Self {
        Self {
            cents,
            in_tune_cents,
        }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fixed(60.0)),
        )
        .into()
    }

    fn x_for(cents: i32, width: f32) -> f32 {
        let range = DISPLAY_CENTS_RANGE as f32;
        let clamped = (cents as f32).clamp(-range, range);
        (clamped + range) / (2.0 * range) * width
    }
}

impl<Message> canvas::Program<Message> for CentMeter {
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

        let background = Path::rectangle(Point::ORIGIN, bounds.size());
        frame.fill(&background, Color::from_rgb8(0x40, 0x40, 0x40));

        // In-tune band
        let band_left = Self::x_for(-self.in_tune_cents, bounds.width);
        let band_right = Self::x_for(self.in_tune_cents, bounds.width);
        let band = Path::rectangle(
            Point::new(band_left, 0.0),
            Size::new(band_right - band_left, bounds.height),
        );
        frame.fill(&band, Color { a: 0.2, ..IN_TUNE_COLOR });

        let center_x = bounds.width / 2.0;
        let center_line = Path::line(
            Point::new(center_x, 0.0),
            Point::new(center_x, bounds.height),
        );
        frame.stroke(
            &center_line,
            Stroke::default().with_width(2.0).with_color(Color::WHITE),
        );

        if let Some(cents) = self.cents {
            let needle_pos = Self::x_for(cents, bounds.width);
            let color = if cents.abs() <= self.in_tune_cents {
                IN_TUNE_COLOR
            } else if cents > 0 {
                SHARP_COLOR
            } else {
                FLAT_COLOR
            };

            let needle = Path::rectangle(
                Point::new(needle_pos - 2.0, 0.0),
                Size::new(4.0, bounds.height),
            );
            frame.fill(&needle, color);
        }

        vec![frame.into_geometry()]
    }
}
