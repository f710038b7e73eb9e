//! Frequency-bin snapshots in the style of a Web Audio analyser node.
//!
//! Keeps the most recent `fft_size` mono samples, and on request produces
//! `fft_size / 2` byte magnitudes scaled from a fixed decibel range.

use std::sync::Arc;

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::{PlayerError, Result};

pub const DEFAULT_FFT_SIZE: usize = 1024;
pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32768;
/// Sizes offered in the preferences panel.
pub const FFT_SIZE_CHOICES: [usize; 6] = [256, 512, 1024, 2048, 4096, 8192];

const SMOOTHING_TIME_CONSTANT: f32 = 0.8;
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Check that `size` is a power of two the analyser can plan for.
pub fn validate_fft_size(size: usize) -> Result<usize> {
    if size.is_power_of_two() && (MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&size) {
        Ok(size)
    } else {
        Err(PlayerError::InvalidFftSize(size))
    }
}

pub struct SpectrumAnalyser {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    fft_buffer: Vec<Complex<f32>>,
    window: Vec<f32>,
    /// Circular history of the most recent mono samples.
    history: Vec<f32>,
    write_pos: usize,
    smoothed: Vec<f32>,
}

impl SpectrumAnalyser {
    pub fn new(fft_size: usize) -> Result<Self> {
        validate_fft_size(fft_size).map(Self::planned)
    }

    fn planned(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            fft_size,
            fft,
            fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
            window: blackman_window(fft_size),
            history: vec![0.0; fft_size],
            write_pos: 0,
            smoothed: vec![0.0; fft_size / 2],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of bins produced per snapshot.
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Replan for a new size, discarding history and smoothing state.
    pub fn set_fft_size(&mut self, fft_size: usize) -> Result<()> {
        if fft_size != self.fft_size {
            *self = Self::new(fft_size)?;
        }
        Ok(())
    }

    /// Append mono samples to the analysis history.
    pub fn push_samples(&mut self, samples: &[f32]) {
        for &s in samples {
            self.history[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
    }

    /// Forget all buffered audio.
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.smoothed.fill(0.0);
        self.write_pos = 0;
    }

    /// Compute the current spectrum into `out`, writing at most
    /// `frequency_bin_count()` bytes.
    pub fn byte_frequency_data(&mut self, out: &mut [u8]) {
        let n = self.fft_size;

        // Oldest sample sits at write_pos.
        for i in 0..n {
            let sample = self.history[(self.write_pos + i) % n];
            self.fft_buffer[i] = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.fft_buffer);

        let scale = 1.0 / n as f32;
        let range_scale = 255.0 / (MAX_DECIBELS - MIN_DECIBELS);

        for (k, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.fft_buffer[k].norm() * scale;
            let value = SMOOTHING_TIME_CONSTANT * *smoothed
                + (1.0 - SMOOTHING_TIME_CONSTANT) * magnitude;
            *smoothed = if value.is_finite() { value } else { 0.0 };

            if let Some(slot) = out.get_mut(k) {
                let db = 20.0 * smoothed.log10();
                let scaled = (range_scale * (db - MIN_DECIBELS)).floor();
                *slot = if scaled.is_nan() {
                    0
                } else {
                    scaled.clamp(0.0, 255.0) as u8
                };
            }
        }
    }
}

impl Default for SpectrumAnalyser {
    fn default() -> Self {
        Self::planned(DEFAULT_FFT_SIZE)
    }
}

fn blackman_window(n: usize) -> Vec<f32> {
    let alpha = 0.16f32;
    let a0 = 0.5 * (1.0 - alpha);
    let a1 = 0.5;
    let a2 = 0.5 * alpha;
    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            a0 - a1 * (2.0 * std::f32::consts::PI * x).cos()
                + a2 * (4.0 * std::f32::consts::PI * x).cos()
        })
        .collect()
}
