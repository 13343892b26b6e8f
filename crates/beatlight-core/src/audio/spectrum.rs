//! Smoothed magnitude spectrum
//!
//! Wraps a rustfft plan with a fixed-size input buffer, a window and
//! exponential smoothing against the previous call's output.

use super::window::WindowFunction;
use crate::{CoreError, Result};
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;
use tracing::debug;

/// Computes windowed, smoothed magnitude spectra of real-valued sample buffers.
pub struct SpectrumProcessor {
    /// FFT instance
    fft: Arc<dyn Fft<f64>>,

    /// Transform size
    fft_size: usize,

    /// Window applied before the transform
    window: WindowFunction,

    /// Pre-computed window coefficients
    coefficients: Vec<f64>,

    /// Smoothing factor in [0, 1]
    smoothing: f64,

    /// Complex working buffer
    fft_buffer: Vec<Complex<f64>>,

    /// FFT scratch buffer
    scratch_buffer: Vec<Complex<f64>>,

    /// Smoothing baseline. `None` after `reset()`.
    previous: Option<Vec<f64>>,
}

impl SpectrumProcessor {
    /// Create a new processor.
    ///
    /// The smoothing baseline starts as an all-zero spectrum, so the very
    /// first call is already blended. Only [`reset`](Self::reset) produces an
    /// unsmoothed call.
    pub fn new(fft_size: usize, window: WindowFunction, smoothing: f64) -> Result<Self> {
        if fft_size == 0 {
            return Err(CoreError::InvalidParameter(
                "FFT size must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&smoothing) {
            return Err(CoreError::InvalidParameter(
                "Smoothing must be between 0 and 1".to_string(),
            ));
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch_len = fft.get_inplace_scratch_len();

        debug!(
            "SpectrumProcessor created: fft_size={}, window={:?}, smoothing={}",
            fft_size, window, smoothing
        );

        Ok(Self {
            fft,
            fft_size,
            window,
            coefficients: window.coefficients(fft_size),
            smoothing,
            fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch_buffer: vec![Complex::new(0.0, 0.0); scratch_len],
            previous: Some(vec![0.0; fft_size / 2 + 1]),
        })
    }

    /// Number of bins returned by [`compute_spectrum`](Self::compute_spectrum)
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Transform size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Configured window
    pub fn window(&self) -> WindowFunction {
        self.window
    }

    /// Configured smoothing factor
    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    /// Compute the magnitude spectrum of `samples`.
    ///
    /// Input shorter than the transform size is zero-padded, longer input is
    /// truncated. The input slice is never modified.
    pub fn compute_spectrum(&mut self, samples: &[f64]) -> Vec<f64> {
        let copy_len = samples.len().min(self.fft_size);
        for (i, slot) in self.fft_buffer.iter_mut().enumerate() {
            let value = if i < copy_len { samples[i] } else { 0.0 };
            *slot = Complex::new(value * self.coefficients[i], 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.fft_buffer, &mut self.scratch_buffer);

        // A real input makes DC (and Nyquist for even sizes) purely real, so
        // the complex norm equals |re| there.
        let mut spectrum: Vec<f64> = self.fft_buffer[..self.bin_count()]
            .iter()
            .map(|c| c.norm())
            .collect();

        if self.smoothing > 0.0 {
            if let Some(previous) = &self.previous {
                for (current, prev) in spectrum.iter_mut().zip(previous) {
                    *current = self.smoothing * prev + (1.0 - self.smoothing) * *current;
                }
            }
        }

        self.previous = Some(spectrum.clone());
        spectrum
    }

    /// Clear the smoothing history. The next call is returned unsmoothed.
    pub fn reset(&mut self) {
        self.previous = None;
        debug!("SpectrumProcessor reset");
    }
}
