//! Frame analyzer
//!
//! Turns raw PCM frames into [`AnalysisResult`] feature records.

use super::spectrum::SpectrumProcessor;
use super::{AnalysisResult, AudioConfig, AudioFrame};
use crate::Result;
use tracing::{debug, trace};

/// Converts audio frames into dominant frequency, amplitude and energy.
pub struct FrameAnalyzer {
    /// Spectrum stage
    spectrum: SpectrumProcessor,

    /// Configuration
    config: AudioConfig,

    /// Sample conversion buffer, reused across frames
    samples: Vec<f64>,

    /// Debug: frames analyzed
    frame_count: u64,
}

impl FrameAnalyzer {
    /// Create an analyzer with a Hann window and 0.5 smoothing.
    pub fn new(sample_rate: u32, fft_size: usize) -> Result<Self> {
        Self::with_config(AudioConfig {
            sample_rate,
            fft_size,
            ..Default::default()
        })
    }

    /// Create an analyzer from a full configuration.
    pub fn with_config(config: AudioConfig) -> Result<Self> {
        let spectrum = SpectrumProcessor::new(config.fft_size, config.window, config.smoothing)?;
        debug!(
            "FrameAnalyzer created: sample_rate={}, fft_size={}",
            config.sample_rate, config.fft_size
        );
        Ok(Self {
            spectrum,
            samples: Vec::with_capacity(config.fft_size),
            config,
            frame_count: 0,
        })
    }

    /// Analyze one frame.
    ///
    /// The frame's own sample rate is used to convert the peak bin into Hz;
    /// the configured rate only applies when the frame reports zero.
    pub fn analyze(&mut self, frame: &AudioFrame) -> AnalysisResult {
        decode_pcm16(frame.data(), frame.channels(), &mut self.samples);

        let spectrum = self.spectrum.compute_spectrum(&self.samples);

        let sample_rate = if frame.sample_rate() > 0 {
            frame.sample_rate()
        } else {
            self.config.sample_rate
        };

        let result = AnalysisResult {
            frequency: dominant_frequency(&spectrum, sample_rate),
            amplitude: peak_amplitude(&self.samples),
            energy: rms(&self.samples),
        };

        self.frame_count += 1;
        if self.frame_count % 100 == 0 {
            trace!(
                "Frame #{}: freq={:.1}Hz energy={:.4}",
                self.frame_count,
                result.frequency,
                result.energy
            );
        }

        result
    }

    /// Analyze raw normalized samples directly (mono, already in [-1, 1]).
    pub fn analyze_samples(&mut self, samples: &[f64], sample_rate: u32) -> AnalysisResult {
        let spectrum = self.spectrum.compute_spectrum(samples);
        AnalysisResult {
            frequency: dominant_frequency(&spectrum, sample_rate),
            amplitude: peak_amplitude(samples),
            energy: rms(samples),
        }
    }

    /// Clear the spectrum smoothing history
    pub fn reset(&mut self) {
        self.spectrum.reset();
        self.frame_count = 0;
    }

    /// Get the analyzer configuration
    pub fn config(&self) -> &AudioConfig {
        &self.config
    }
}

/// Decode interleaved little-endian i16 PCM into normalized mono samples,
/// averaging channels.
pub fn decode_pcm16(data: &[u8], channels: u16, out: &mut Vec<f64>) {
    let channels = usize::from(channels.max(1));
    out.clear();
    out.extend(data.chunks_exact(2 * channels).map(|frame| {
        let sum: f64 = frame
            .chunks_exact(2)
            .map(|b| f64::from(i16::from_le_bytes([b[0], b[1]])) / 32768.0)
            .sum();
        sum / channels as f64
    }));
}

/// Frequency of the strongest bin, using `bin * rate / (2 * len)`.
fn dominant_frequency(spectrum: &[f64], sample_rate: u32) -> f64 {
    if spectrum.is_empty() {
        return 0.0;
    }
    let mut max_index = 0;
    let mut max_value = spectrum[0];
    for (i, &value) in spectrum.iter().enumerate().skip(1) {
        if value > max_value {
            max_value = value;
            max_index = i;
        }
    }
    max_index as f64 * f64::from(sample_rate) / (2.0 * spectrum.len() as f64)
}

/// Calculate RMS from samples
fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f64).sqrt()
}

fn peak_amplitude(samples: &[f64]) -> f64 {
    samples.iter().map(|s| s.abs()).fold(0.0, f64::max)
}
