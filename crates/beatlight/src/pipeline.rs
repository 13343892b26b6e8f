//! Audio-to-light pipeline
//!
//! A reader thread pulls frames from a WAV file at playback speed and hands
//! them over a bounded channel to the analysis loop, which runs
//! analyzer -> beat detector -> effect -> router for every frame.

use anyhow::{Context, Result};
use beatlight_control::{EffectFrame, EffectRouter, LightEffect};
use beatlight_core::audio::beat::ENERGY_HISTORY_SIZE;
use beatlight_core::{AudioConfig, AudioFrame, BeatDetector, FileAudioSource, FrameAnalyzer};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace};

/// Frames buffered between the reader and the analysis loop
const FRAME_QUEUE_DEPTH: usize = 8;
/// How often the loop re-checks the stop flag while idle
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What happened to one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub beat: bool,
    pub updates: usize,
}

/// Totals for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunStats {
    pub frames: u64,
    pub beats: u64,
    pub updates: u64,
}

pub struct Pipeline {
    analyzer: FrameAnalyzer,
    detector: BeatDetector,
    effect: Box<dyn LightEffect>,
    router: EffectRouter,
    lights: Vec<String>,
    stats: RunStats,
}

impl Pipeline {
    pub fn new(
        audio: &AudioConfig,
        effect: Box<dyn LightEffect>,
        router: EffectRouter,
    ) -> Result<Self> {
        let analyzer =
            FrameAnalyzer::with_config(audio.clone()).context("Invalid audio configuration")?;
        let lights = router.light_ids();
        Ok(Self {
            analyzer,
            detector: BeatDetector::new(),
            effect,
            router,
            lights,
            stats: RunStats::default(),
        })
    }

    /// Analyze one frame observed at `now` and route the resulting updates.
    pub fn process_frame(&mut self, frame: &AudioFrame, now: Instant) -> FrameReport {
        let analysis = self.analyzer.analyze(frame);
        let beat = self.detector.is_beat_at(&analysis, now);
        let updates = self.effect.update(&analysis, beat, &self.lights);
        let count = updates.len();

        if !updates.is_empty() {
            self.router
                .route_frame(&EffectFrame::new(updates, frame.timestamp_ms()));
        }

        self.stats.frames += 1;
        self.stats.updates += count as u64;
        if beat {
            self.stats.beats += 1;
            debug!("Beat at {}ms (energy {:.3})", frame.timestamp_ms(), analysis.energy);
        }
        if self.stats.frames % ENERGY_HISTORY_SIZE as u64 == 0 {
            info!(
                "t={:.1}s bpm={:.1} freq={:.0}Hz energy={:.3}",
                frame.timestamp_ms() as f64 / 1000.0,
                self.detector.bpm_at(now),
                analysis.frequency,
                analysis.energy
            );
        }

        FrameReport {
            beat,
            updates: count,
        }
    }

    /// Consume frames until the channel closes or `stop` is raised.
    pub fn run(&mut self, frames: &Receiver<AudioFrame>, stop: &AtomicBool) -> RunStats {
        while !stop.load(Ordering::Relaxed) {
            match frames.recv_timeout(POLL_INTERVAL) {
                Ok(frame) => {
                    let report = self.process_frame(&frame, Instant::now());
                    trace!("beat={} updates={}", report.beat, report.updates);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.stats()
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn lights(&self) -> &[String] {
        &self.lights
    }
}

/// Open `path` and start a reader thread feeding frames into the returned
/// channel. With `pace` set, frames are released at playback speed.
///
/// Opening happens on the calling thread so format errors surface here.
pub fn spawn_reader(
    path: &Path,
    stop: Arc<AtomicBool>,
    pace: bool,
) -> Result<(Receiver<AudioFrame>, JoinHandle<u64>)> {
    let mut source = FileAudioSource::new(path);
    source
        .start()
        .with_context(|| format!("Failed to open audio file {:?}", path))?;

    let (tx, rx) = bounded(FRAME_QUEUE_DEPTH);
    let handle = thread::Builder::new()
        .name("beatlight-reader".to_string())
        .spawn(move || {
            let started = Instant::now();
            while !stop.load(Ordering::Relaxed) {
                let frame = match source.poll_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) => {
                        error!("Audio read failed: {}", e);
                        break;
                    }
                };

                if pace {
                    let due = started + Duration::from_millis(frame.timestamp_ms());
                    let now = Instant::now();
                    if due > now {
                        thread::sleep(due - now);
                    }
                }

                if tx.send(frame).is_err() {
                    break;
                }
            }
            source.stop();
            info!("Reader finished after {} frames", source.frame_count());
            source.frame_count()
        })
        .context("Failed to spawn reader thread")?;

    Ok((rx, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatlight_control::{BeatPulseEffect, LightUpdate, LowEffectSink};
    use hound::{SampleFormat, WavSpec, WavWriter};
    use parking_lot::Mutex;
    use std::f64::consts::PI;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Vec<LightUpdate>>>);

    impl LowEffectSink for Recorder {
        fn update_lights(&self, updates: Vec<LightUpdate>) {
            self.0.lock().push(updates);
        }
    }

    fn sine(amplitude: f64) -> Vec<i16> {
        (0..1024)
            .map(|i| {
                let phase = 2.0 * PI * 110.0 * i as f64 / 44100.0;
                (phase.sin() * amplitude * 32767.0) as i16
            })
            .collect()
    }

    fn frame(samples: &[i16], timestamp_ms: u64) -> AudioFrame {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        AudioFrame::new(data, 44100, 1, timestamp_ms)
    }

    fn pipeline() -> (Pipeline, Arc<Recorder>) {
        let mut router = EffectRouter::new();
        router
            .load_light_map_from_str(
                r#"{"lights":[{"id":"1","controlType":"LOW_HTTP"},{"id":"2","controlType":"LOW_HTTP"}]}"#,
            )
            .unwrap();
        let recorder = Arc::new(Recorder::default());
        router.set_low_sink(recorder.clone());
        let pipeline = Pipeline::new(
            &AudioConfig::default(),
            Box::new(BeatPulseEffect::default()),
            router,
        )
        .unwrap();
        (pipeline, recorder)
    }

    #[test]
    fn test_beat_reaches_sink() {
        let (mut pipeline, recorder) = pipeline();
        assert_eq!(pipeline.lights(), &["1".to_string(), "2".to_string()]);

        let start = Instant::now();
        let quiet = sine(0.05);
        for i in 0..20u64 {
            let now = start + Duration::from_millis(i * 23);
            let report = pipeline.process_frame(&frame(&quiet, i * 23), now);
            assert!(!report.beat);
            assert_eq!(report.updates, 0);
        }

        let now = start + Duration::from_millis(460);
        let report = pipeline.process_frame(&frame(&sine(0.9), 460), now);
        assert!(report.beat);
        assert_eq!(report.updates, 2);

        let batches = recorder.0.lock();
        assert_eq!(batches.len(), 1);
        assert!(batches[0].iter().all(|u| u.brightness == Some(254)));
        assert_eq!(pipeline.stats().beats, 1);
        assert_eq!(pipeline.stats().frames, 21);
    }

    #[test]
    fn test_reader_feeds_run_loop() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("clip.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..5 {
            for s in sine(0.3) {
                writer.write_sample(s).unwrap();
            }
        }
        writer.finalize().unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let (frames, reader) = spawn_reader(&path, stop.clone(), false).unwrap();
        let (mut pipeline, _) = pipeline();
        let stats = pipeline.run(&frames, &stop);

        assert_eq!(reader.join().unwrap(), 5);
        assert_eq!(stats.frames, 5);
    }

    #[test]
    fn test_reader_rejects_missing_file() {
        let stop = Arc::new(AtomicBool::new(false));
        assert!(spawn_reader(Path::new("/no/such.wav"), stop, false).is_err());
    }
}
