//! Audio-thread side of the analysis graph.
//!
//! Output frames are gathered into fixed planar stereo blocks. Each full
//! block runs through the loudness monitor and is published to the UI as a
//! [`TapFrame`] over a bounded channel; frames are dropped when it is full.

use crossbeam_channel::{Sender, TrySendError};

use super::types::TapFrame;
use crate::analysis::loudness::{LoudnessMonitor, BLOCK_SIZE};

pub struct AnalysisTaps {
    monitor: LoudnessMonitor,
    left: Vec<f32>,
    right: Vec<f32>,
    filled: usize,
    connected: bool,
    frame_tx: Sender<TapFrame>,
}

impl AnalysisTaps {
    pub fn new(sample_rate: u32, frame_tx: Sender<TapFrame>) -> Self {
        Self {
            monitor: LoudnessMonitor::new(sample_rate),
            left: vec![0.0; BLOCK_SIZE],
            right: vec![0.0; BLOCK_SIZE],
            filled: 0,
            connected: false,
            frame_tx,
        }
    }

    pub fn connect(&mut self) {
        self.connected = true;
    }

    /// Safe to call repeatedly. A partial block is discarded.
    pub fn disconnect(&mut self) {
        self.connected = false;
        self.filled = 0;
    }

    #[cfg(test)]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Feed interleaved output frames with `channels` samples each.
    pub fn feed(&mut self, interleaved: &[f32], channels: usize) {
        if !self.connected || channels == 0 {
            return;
        }

        for frame in interleaved.chunks_exact(channels) {
            let l = frame[0];
            let r = if channels > 1 { frame[1] } else { l };
            self.left[self.filled] = l;
            self.right[self.filled] = r;
            self.filled += 1;

            if self.filled == BLOCK_SIZE {
                self.flush_block();
            }
        }
    }

    fn flush_block(&mut self) {
        self.filled = 0;
        self.monitor.process(&self.left, &self.right);

        let mono = self
            .left
            .iter()
            .zip(self.right.iter())
            .map(|(&l, &r)| 0.5 * (l + r))
            .collect();

        let frame = TapFrame {
            reading: self.monitor.reading(),
            mono,
        };
        match self.frame_tx.try_send(frame) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => self.connected = false,
        }
    }
}
