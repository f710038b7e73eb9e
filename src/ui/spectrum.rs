//! Frequency-bin bar chart.

use iced::mouse;
use iced::widget::canvas::{self, Frame, Geometry};
use iced::{Color, Point, Rectangle, Renderer, Size, Theme};

const BACKGROUND: Color = Color::from_rgb(26.0 / 255.0, 26.0 / 255.0, 26.0 / 255.0);
const START_X: f32 = 5.0;
const BAR_WIDTH_FACTOR: f32 = 5.0;

/// One bar, in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub hue: f32,
}

/// Hue in degrees for a bin value: 60 (yellow) at silence, falling as it grows.
pub fn bin_hue(value: u8) -> f32 {
    60.0 - (value as f32 / 48.0) * 60.0
}

/// Lay out one bar per bin, left to right, each overlapping the previous by
/// one pixel. Bars past the right edge are still produced.
pub fn layout_bars(bins: &[u8], width: f32, height: f32) -> Vec<Bar> {
    if bins.is_empty() {
        return Vec::new();
    }
    let bar_width = (width / bins.len() as f32) * BAR_WIDTH_FACTOR;
    let mut x = START_X;

    bins.iter()
        .map(|&value| {
            let level = value as f32 / 255.0;
            let bar_height = level * level * height;
            let bar = Bar {
                x,
                y: height - bar_height,
                width: bar_width,
                height: bar_height,
                hue: bin_hue(value),
            };
            x += bar_width - 1.0;
            bar
        })
        .collect()
}

/// Fully saturated, half-lightness color for a hue in degrees. Hues wrap.
pub fn hue_color(hue: f32) -> Color {
    let h = hue.rem_euclid(360.0) / 60.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    Color::from_rgb(r, g, b)
}

/// Canvas program over the latest bin snapshot.
pub struct SpectrumView<'a> {
    pub bins: &'a [u8],
}

impl<Message> canvas::Program<Message> for SpectrumView<'_> {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(Point::ORIGIN, bounds.size(), BACKGROUND);

        for bar in layout_bars(self.bins, bounds.width, bounds.height) {
            if bar.height <= 0.0 || bar.x > bounds.width {
                continue;
            }
            frame.fill_rectangle(
                Point::new(bar.x, bar.y),
                Size::new(bar.width, bar.height),
                hue_color(bar.hue),
            );
        }

        vec![frame.into_geometry()]
    }
}
