//! Streaming pseudo-loudness and per-block RMS measurement.
//!
//! This is a power-based approximation, not ITU-R BS.1770: the "K-weighting"
//! stage is a flat gain and there is no gating beyond a fixed silence floor.
//! Output values are kept identical to the player's historical meter readings.

/// Frames per processing block delivered by the engine.
pub const BLOCK_SIZE: usize = 1024;

/// Lowest loudness value ever reported.
pub const LOUDNESS_FLOOR_DB: f64 = -70.0;

/// Length of the loudness window in seconds of gated samples.
// Historically documented as a 2-second window; the buffer has always held 4.
const WINDOW_SECONDS: u32 = 4;

/// Flat gain standing in for K-weighting.
const K_WEIGHT_GAIN: f64 = 1.5;

/// Filtered samples below this magnitude never enter the window.
const SILENCE_GATE: f64 = 1e-4;

/// Offset applied after converting the mean square to decibels.
const LOUDNESS_OFFSET_DB: f64 = 0.691;

/// Headroom added to block RMS readings.
const RMS_OFFSET_DB: f64 = 6.0;

/// One set of values produced by the monitor, cheap to copy across threads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessReading {
    pub lufs: f64,
    pub rms_left_db: f64,
    pub rms_right_db: f64,
}

impl LoudnessReading {
    /// Reading shown when nothing has been measured yet.
    pub const SILENT: Self = Self {
        lufs: LOUDNESS_FLOOR_DB,
        rms_left_db: f64::NEG_INFINITY,
        rms_right_db: f64::NEG_INFINITY,
    };
}

impl Default for LoudnessReading {
    fn default() -> Self {
        Self::SILENT
    }
}

/// Running loudness state fed one stereo block at a time.
pub struct LoudnessMonitor {
    /// Squared filtered samples; zero-filled slots count toward the mean.
    window: Vec<f32>,
    cursor: usize,
    total_samples: u64,
    sum_of_squares: f64,
    lufs: f64,
    rms_left: f64,
    rms_right: f64,
}

impl LoudnessMonitor {
    pub fn new(sample_rate: u32) -> Self {
        let capacity = (sample_rate as usize * WINDOW_SECONDS as usize).max(1);
        Self {
            window: vec![0.0; capacity],
            cursor: 0,
            total_samples: 0,
            sum_of_squares: 0.0,
            lufs: LOUDNESS_FLOOR_DB,
            rms_left: 0.0,
            rms_right: 0.0,
        }
    }

    /// Consume one planar stereo block. Both channels must be the same length.
    pub fn process(&mut self, left: &[f32], right: &[f32]) {
        debug_assert_eq!(left.len(), right.len());
        let frames = left.len().min(right.len());

        let mut sum_squares_left = 0.0f64;
        let mut sum_squares_right = 0.0f64;

        for (&l, &r) in left.iter().zip(right.iter()) {
            let (l, r) = (l as f64, r as f64);
            let mono = 0.5 * (l + r);
            let filtered = mono * K_WEIGHT_GAIN;

            if filtered.abs() >= SILENCE_GATE {
                let squared = filtered * filtered;
                self.window[self.cursor] = squared as f32;
                self.cursor = (self.cursor + 1) % self.window.len();
                self.total_samples += 1;
                self.sum_of_squares += squared;
            }

            sum_squares_left += l * l;
            sum_squares_right += r * r;
        }

        // Mean over the nominal window, including slots never written.
        let sum: f64 = self.window.iter().map(|&v| v as f64).sum();
        let mean_square = sum / self.window.len() as f64;
        self.lufs = (10.0 * mean_square.log10() - LOUDNESS_OFFSET_DB).max(LOUDNESS_FLOOR_DB);

        if frames > 0 {
            self.rms_left = (sum_squares_left / frames as f64).sqrt();
            self.rms_right = (sum_squares_right / frames as f64).sqrt();
        }
    }

    pub fn lufs(&self) -> f64 {
        self.lufs
    }

    pub fn rms_left_db(&self) -> f64 {
        rms_to_db(self.rms_left)
    }

    pub fn rms_right_db(&self) -> f64 {
        rms_to_db(self.rms_right)
    }

    pub fn reading(&self) -> LoudnessReading {
        LoudnessReading {
            lufs: self.lufs(),
            rms_left_db: self.rms_left_db(),
            rms_right_db: self.rms_right_db(),
        }
    }

    /// Number of window slots.
    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.window.len()
    }

    /// Samples that have passed the silence gate since creation.
    #[cfg(test)]
    pub fn gated_samples(&self) -> u64 {
        self.total_samples
    }

    /// Lifetime sum of gated squared samples.
    #[cfg(test)]
    pub fn sum_of_squares(&self) -> f64 {
        self.sum_of_squares
    }
}

/// Zero RMS maps to negative infinity; callers floor for display.
fn rms_to_db(rms: f64) -> f64 {
    20.0 * rms.log10() + RMS_OFFSET_DB
}
