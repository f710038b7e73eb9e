//! Vertical RMS bar gauges with peak hold.

use iced::mouse;
use iced::widget::canvas::{self, Frame, Geometry, Text};
use iced::{font, Color, Font, Pixels, Point, Rectangle, Renderer, Size, Theme, Vector};

pub const MIN_DB: f64 = -60.0;
pub const MAX_DB: f64 = 6.0;

const BACKGROUND: Color = Color::from_rgb(0.102, 0.102, 0.102);
const BAR_GREEN: Color = Color::from_rgb(0.0, 1.0, 0.0);
const PEAK_GREEN: Color = Color::from_rgb(0.0, 0.502, 0.0);
const CLIP_RED: Color = Color::from_rgb(1.0, 0.0, 0.0);
const LABEL_WARNING: Color = Color::from_rgb(1.0, 1.0, 0.0);

const ZERO_LINE_THICKNESS: f32 = 3.0;
const PEAK_LINE_THICKNESS: f32 = 2.5;
const CLIP_BAR_THICKNESS: f32 = 5.0;
const LABEL_OFFSET: f32 = 50.0;
const LABEL_SIZE: f32 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

/// Y coordinate of the top of a bar showing `db`, in a gauge `height` tall.
///
/// Clamped to the meter range and compressed logarithmically: the floor maps
/// to `height` (empty) and the ceiling to 0 (full).
pub fn db_to_y(height: f32, db: f64) -> f32 {
    let clamped = db.clamp(MIN_DB, MAX_DB);
    let range = MAX_DB - MIN_DB;
    let fill = ((clamped - MIN_DB) / range + 1.0).log10() / 2f64.log10();
    height * (1.0 - fill) as f32
}

/// Readout text; exact negative infinity gets its own glyph.
pub fn format_db(db: f64) -> String {
    if db == f64::NEG_INFINITY {
        "-∞ dB".to_string()
    } else {
        format!("{db:.1} dB")
    }
}

/// Highest value seen per channel and overall since the last reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakHold {
    pub left: f64,
    pub right: f64,
    pub overall: f64,
}

impl Default for PeakHold {
    fn default() -> Self {
        Self {
            left: f64::NEG_INFINITY,
            right: f64::NEG_INFINITY,
            overall: f64::NEG_INFINITY,
        }
    }
}

impl PeakHold {
    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Left => self.left,
            Channel::Right => self.right,
        }
    }

    /// Fold in a new reading. Negative infinity clears the channel and the
    /// overall peak.
    pub fn update(&mut self, channel: Channel, db: f64) -> f64 {
        let slot = match channel {
            Channel::Left => &mut self.left,
            Channel::Right => &mut self.right,
        };
        if db == f64::NEG_INFINITY {
            *slot = f64::NEG_INFINITY;
            self.overall = f64::NEG_INFINITY;
        }
        *slot = slot.max(db);
        let peak = *slot;
        self.overall = self.overall.max(peak);
        peak
    }
}

/// Both channel gauges plus their shared peak tracker.
#[derive(Debug, Clone)]
pub struct Meters {
    pub left: f64,
    pub right: f64,
    pub peaks: PeakHold,
}

impl Default for Meters {
    fn default() -> Self {
        Self::new()
    }
}

impl Meters {
    pub fn new() -> Self {
        Self {
            left: f64::NEG_INFINITY,
            right: f64::NEG_INFINITY,
            peaks: PeakHold::default(),
        }
    }

    /// Record a reading for one gauge.
    pub fn show(&mut self, channel: Channel, db: f64) {
        match channel {
            Channel::Left => self.left = db,
            Channel::Right => self.right = db,
        }
        self.peaks.update(channel, db);
    }

    /// Blank both gauges and forget all peaks.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn gauge(&self, channel: Channel) -> MeterGauge {
        let value = match channel {
            Channel::Left => self.left,
            Channel::Right => self.right,
        };
        MeterGauge {
            value,
            peak: self.peaks.get(channel),
        }
    }
}

/// Everything needed to draw one gauge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterGauge {
    pub value: f64,
    pub peak: f64,
}

/// Resolved drawing positions for a gauge at a given size.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterLayout {
    pub bar_top: f32,
    pub bar_color: Color,
    pub zero_db_y: f32,
    pub peak_y: Option<f32>,
    pub peak_color: Color,
    pub clipping: bool,
    pub label: String,
    pub label_color: Color,
}

impl MeterGauge {
    pub fn layout(&self, height: f32) -> MeterLayout {
        let clipping = self.value >= 0.0;
        MeterLayout {
            bar_top: db_to_y(height, self.value),
            bar_color: if clipping { CLIP_RED } else { BAR_GREEN },
            zero_db_y: db_to_y(height, 0.0),
            peak_y: (!self.peak.is_nan() && self.peak > f64::NEG_INFINITY)
                .then(|| db_to_y(height, self.peak)),
            peak_color: if self.peak >= 0.0 { CLIP_RED } else { PEAK_GREEN },
            clipping,
            label: format_db(self.value),
            label_color: if clipping { LABEL_WARNING } else { Color::WHITE },
        }
    }
}

impl<Message> canvas::Program<Message> for MeterGauge {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let width = bounds.width;
        let height = bounds.height;
        let layout = self.layout(height);
        let mut frame = Frame::new(renderer, bounds.size());

        frame.fill_rectangle(Point::ORIGIN, bounds.size(), BACKGROUND);

        frame.fill_rectangle(
            Point::new(0.0, layout.bar_top),
            Size::new(width, height - layout.bar_top),
            layout.bar_color,
        );

        frame.fill_rectangle(
            Point::new(0.0, layout.zero_db_y),
            Size::new(width, ZERO_LINE_THICKNESS),
            Color::WHITE,
        );

        if let Some(peak_y) = layout.peak_y {
            frame.fill_rectangle(
                Point::new(0.0, peak_y),
                Size::new(width, PEAK_LINE_THICKNESS),
                layout.peak_color,
            );
        }

        if layout.clipping {
            frame.fill_rectangle(
                Point::ORIGIN,
                Size::new(width, CLIP_BAR_THICKNESS),
                CLIP_RED,
            );
        }

        // Readout runs upward along the bar.
        frame.with_save(|frame| {
            frame.translate(Vector::new(width / 2.0, layout.bar_top + LABEL_OFFSET));
            frame.rotate(-std::f32::consts::FRAC_PI_2);
            frame.fill_text(Text {
                content: layout.label.clone(),
                position: Point::new(0.0, -LABEL_SIZE / 2.0),
                color: layout.label_color,
                size: Pixels(LABEL_SIZE),
                font: Font {
                    weight: font::Weight::Bold,
                    ..Font::DEFAULT
                },
                ..Text::default()
            });
        });

        vec![frame.into_geometry()]
    }
}
