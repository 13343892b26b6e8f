//! WAV file frame source
//!
//! Reads 16-bit PCM WAV files in blocks of [`FRAME_SIZE`] sample frames and
//! hands them out as [`AudioFrame`]s.

use super::{AudioFrame, FRAME_SIZE};
use crate::{CoreError, Result};
use hound::{SampleFormat, WavReader, WavSpec};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Audio source backed by a WAV file on disk.
pub struct FileAudioSource {
    path: PathBuf,
    reader: Option<WavReader<BufReader<File>>>,
    spec: Option<WavSpec>,
    frame_count: u64,
    position: u64,
}

impl FileAudioSource {
    /// Create a source for `path`. Nothing is opened until [`start`](Self::start).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reader: None,
            spec: None,
            frame_count: 0,
            position: 0,
        }
    }

    /// Open the file and validate its format.
    pub fn start(&mut self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(CoreError::InvalidParameter("Invalid file path".to_string()));
        }
        if !self.path.exists() {
            return Err(CoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Audio file not found: {}", self.path.display()),
            )));
        }

        let reader = WavReader::open(&self.path)?;
        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(CoreError::UnsupportedFormat(format!(
                "{:?} {}-bit (only 16-bit PCM is supported)",
                spec.sample_format, spec.bits_per_sample
            )));
        }

        info!(
            "Opened {}: {} Hz, {} channel(s), {} samples",
            self.path.display(),
            spec.sample_rate,
            spec.channels,
            reader.len()
        );

        self.reader = Some(reader);
        self.spec = Some(spec);
        self.frame_count = 0;
        self.position = 0;
        Ok(())
    }

    /// Read the next frame. Returns `Ok(None)` at end of file.
    pub fn poll_frame(&mut self) -> Result<Option<AudioFrame>> {
        let spec = self.spec.ok_or(CoreError::SourceNotStarted)?;
        let reader = self.reader.as_mut().ok_or(CoreError::SourceNotStarted)?;

        let wanted = FRAME_SIZE * usize::from(spec.channels);
        let mut data = Vec::with_capacity(wanted * 2);
        for sample in reader.samples::<i16>().take(wanted) {
            data.extend_from_slice(&sample?.to_le_bytes());
        }

        if data.is_empty() {
            debug!("End of {} after {} frames", self.path.display(), self.frame_count);
            return Ok(None);
        }

        let timestamp_ms = self.position * 1000 / u64::from(spec.sample_rate.max(1));
        let frame = AudioFrame::new(data, spec.sample_rate, spec.channels, timestamp_ms);
        self.position += frame.sample_frames() as u64;
        self.frame_count += 1;
        Ok(Some(frame))
    }

    /// Close the file. Calling this on a stopped source does nothing.
    pub fn stop(&mut self) {
        if self.reader.take().is_some() {
            debug!("Closed {}", self.path.display());
        }
    }

    /// Whether the source is open
    pub fn is_running(&self) -> bool {
        self.reader.is_some()
    }

    /// WAV format, available after `start()`
    pub fn spec(&self) -> Option<WavSpec> {
        self.spec
    }

    /// Number of frames read since `start()`
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavWriter;
    use tempfile::TempDir;

    fn write_wav(dir: &TempDir, name: &str, channels: u16, frames: usize) -> PathBuf {
        let path = dir.path().join(name);
        let spec = WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for i in 0..frames * usize::from(channels) {
            writer.write_sample((i % 100) as i16).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn test_poll_before_start_fails() {
        let mut source = FileAudioSource::new("missing.wav");
        assert!(matches!(source.poll_frame(), Err(CoreError::SourceNotStarted)));
    }

    #[test]
    fn test_missing_file() {
        let mut source = FileAudioSource::new("/definitely/not/here.wav");
        assert!(source.start().is_err());
        assert!(!source.is_running());
    }

    #[test]
    fn test_reads_frames_until_eof() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "stereo.wav", 2, FRAME_SIZE * 2 + 100);

        let mut source = FileAudioSource::new(&path);
        source.start().unwrap();

        let first = source.poll_frame().unwrap().unwrap();
        assert_eq!(first.channels(), 2);
        assert_eq!(first.sample_rate(), 8000);
        assert_eq!(first.sample_frames(), FRAME_SIZE);
        assert_eq!(first.timestamp_ms(), 0);

        let second = source.poll_frame().unwrap().unwrap();
        assert_eq!(second.timestamp_ms(), 128);

        let last = source.poll_frame().unwrap().unwrap();
        assert_eq!(last.sample_frames(), 100);

        assert!(source.poll_frame().unwrap().is_none());
        assert_eq!(source.frame_count(), 3);

        source.stop();
        source.stop();
        assert!(!source.is_running());
    }

    #[test]
    fn test_rejects_float_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.5f32).unwrap();
        writer.finalize().unwrap();

        let mut source = FileAudioSource::new(&path);
        assert!(matches!(source.start(), Err(CoreError::UnsupportedFormat(_))));
    }
}
