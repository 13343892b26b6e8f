//! Window functions applied before the spectral transform.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Window shapes used to reduce spectral leakage at the buffer edges.
///
/// For a single-sample buffer the `n - 1` denominator is zero; every variant
/// then uses a coefficient of `1.0`, which leaves the sample untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowFunction {
    /// Rectangular window (identity)
    None,
    /// `0.54 - 0.46 * cos(2πi / (n-1))`
    Hamming,
    /// `0.5 * (1 - cos(2πi / (n-1)))`
    #[default]
    Hann,
    /// `0.42 - 0.5 * cos(2πi / (n-1)) + 0.08 * cos(4πi / (n-1))`
    Blackman,
}

impl WindowFunction {
    /// Coefficient for sample `i` of a window of length `n`.
    pub fn coefficient(self, i: usize, n: usize) -> f64 {
        if n <= 1 {
            return 1.0;
        }
        let phase = 2.0 * PI * i as f64 / (n - 1) as f64;
        match self {
            WindowFunction::None => 1.0,
            WindowFunction::Hamming => 0.54 - 0.46 * phase.cos(),
            WindowFunction::Hann => 0.5 * (1.0 - phase.cos()),
            WindowFunction::Blackman => 0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos(),
        }
    }

    /// Multiply `samples` by the window in place.
    pub fn apply(self, samples: &mut [f64]) {
        if self == WindowFunction::None {
            return;
        }
        let n = samples.len();
        for (i, sample) in samples.iter_mut().enumerate() {
            *sample *= self.coefficient(i, n);
        }
    }

    /// Pre-compute the coefficients for a window of length `n`.
    pub fn coefficients(self, n: usize) -> Vec<f64> {
        (0..n).map(|i| self.coefficient(i, n)).collect()
    }
}
