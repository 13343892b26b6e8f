//! Beatlight Core - Audio Analysis
//!
//! This crate contains the analysis half of the Beatlight pipeline:
//! - Window functions and the smoothed magnitude spectrum
//! - Frame analysis (dominant frequency, amplitude, RMS energy)
//! - Energy-based beat detection with BPM tracking
//! - WAV file frame source
//! - Logging configuration shared with the application crate

#![warn(missing_docs)]

use thiserror::Error;

pub mod audio;
pub mod logging;

// --- Re-exports grouped by category ---

// Audio System
pub use audio::{
    analyzer::FrameAnalyzer,
    beat::BeatDetector,
    source::FileAudioSource,
    spectrum::SpectrumProcessor,
    window::WindowFunction,
    AnalysisResult, AudioConfig, AudioFrame,
};

// Logging & Diagnostics
pub use logging::LogConfig;

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid constructor or configuration argument
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// WAV decoding error
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Frames were requested from a source that has not been started
    #[error("Audio source not started")]
    SourceNotStarted,

    /// The audio file uses a sample format the pipeline cannot read
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidParameter("FFT size must be positive".to_string());
        assert_eq!(err.to_string(), "Invalid parameter: FFT size must be positive");
        assert_eq!(
            CoreError::SourceNotStarted.to_string(),
            "Audio source not started"
        );
    }
}
