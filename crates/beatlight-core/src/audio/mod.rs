//! Audio analysis stage.
//!
//! Frames flow through [`analyzer::FrameAnalyzer`] (window → spectrum →
//! features) and then into [`beat::BeatDetector`]. Everything here is
//! synchronous and meant to be driven frame by frame from a single thread.

use serde::{Deserialize, Serialize};

pub mod analyzer;
pub mod beat;
pub mod source;
pub mod spectrum;
pub mod window;

use window::WindowFunction;

/// Number of sample frames per [`AudioFrame`] produced by the file source.
pub const FRAME_SIZE: usize = 1024;

/// One block of interleaved 16-bit little-endian PCM plus capture metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    data: Vec<u8>,
    sample_rate: u32,
    channels: u16,
    timestamp_ms: u64,
}

impl AudioFrame {
    /// Create a new frame. The byte buffer is owned by the frame from here on.
    pub fn new(data: Vec<u8>, sample_rate: u32, channels: u16, timestamp_ms: u64) -> Self {
        Self {
            data,
            sample_rate,
            channels,
            timestamp_ms,
        }
    }

    /// Raw interleaved sample bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Capture timestamp in milliseconds
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Number of sample frames (samples per channel) contained in the buffer.
    pub fn sample_frames(&self) -> usize {
        self.data.len() / 2 / usize::from(self.channels.max(1))
    }
}

/// Per-frame feature record derived by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Dominant frequency in Hz
    pub frequency: f64,
    /// Peak absolute sample value (0.0 - 1.0)
    pub amplitude: f64,
    /// RMS energy of the frame (0.0 - 1.0)
    pub energy: f64,
}

impl AnalysisResult {
    /// Create a new feature record
    pub fn new(frequency: f64, amplitude: f64, energy: f64) -> Self {
        Self {
            frequency,
            amplitude,
            energy,
        }
    }
}

/// Configuration for the frame analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate assumed when a frame does not carry one
    pub sample_rate: u32,
    /// Transform size
    pub fft_size: usize,
    /// Window applied before the transform
    pub window: WindowFunction,
    /// Temporal smoothing factor (0.0 = none, towards 1.0 = heavy)
    pub smoothing: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            fft_size: FRAME_SIZE,
            window: WindowFunction::Hann,
            smoothing: 0.5,
        }
    }
}
