//! Energy-based beat detection with BPM tracking

use super::AnalysisResult;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Energy values kept for the rolling average (~1s of 1024-sample frames)
pub const ENERGY_HISTORY_SIZE: usize = 43;
/// Energy must exceed the rolling average by this factor
pub const BEAT_THRESHOLD_MULTIPLIER: f64 = 1.3;
/// Minimum time between beats (prevents double-triggers) - 300 BPM max
pub const MIN_BEAT_INTERVAL: Duration = Duration::from_millis(200);
/// Beat timestamps used for BPM estimation
pub const BPM_HISTORY_SIZE: usize = 8;
/// BPM drops to zero when no beat arrives for this long
pub const BPM_TIMEOUT: Duration = Duration::from_millis(3000);

/// Detects beats from per-frame energy and estimates tempo.
///
/// The `*_at` variants take an explicit instant so callers (and tests) can
/// drive the detector on their own clock; the plain variants use
/// [`Instant::now`].
#[derive(Debug, Clone, Default)]
pub struct BeatDetector {
    energy_history: VecDeque<f64>,
    beat_timestamps: VecDeque<Instant>,
    last_beat_time: Option<Instant>,
    current_bpm: f64,
}

impl BeatDetector {
    /// Create a detector with empty history
    pub fn new() -> Self {
        Self {
            energy_history: VecDeque::with_capacity(ENERGY_HISTORY_SIZE + 1),
            beat_timestamps: VecDeque::with_capacity(BPM_HISTORY_SIZE + 1),
            last_beat_time: None,
            current_bpm: 0.0,
        }
    }

    /// Decide whether `result` is a beat, using the current time.
    pub fn is_beat(&mut self, result: &AnalysisResult) -> bool {
        self.is_beat_at(result, Instant::now())
    }

    /// Decide whether `result`, observed at `now`, is a beat.
    pub fn is_beat_at(&mut self, result: &AnalysisResult, now: Instant) -> bool {
        let energy = result.energy;

        if let Some(last) = self.last_beat_time {
            if now.saturating_duration_since(last) < MIN_BEAT_INTERVAL {
                self.push_energy(energy);
                return false;
            }
        }

        // Average excludes the current sample
        let average = self.average_energy();
        self.push_energy(energy);

        let threshold = average * BEAT_THRESHOLD_MULTIPLIER;
        if energy > threshold && average > 0.0 {
            self.last_beat_time = Some(now);
            self.beat_timestamps.push_back(now);
            if self.beat_timestamps.len() > BPM_HISTORY_SIZE {
                self.beat_timestamps.pop_front();
            }
            self.update_bpm();
            trace!(
                "Beat: energy={:.4} threshold={:.4} bpm={:.1}",
                energy,
                threshold,
                self.current_bpm
            );
            return true;
        }

        false
    }

    /// Current BPM estimate, using the current time for the timeout check.
    pub fn bpm(&mut self) -> f64 {
        self.bpm_at(Instant::now())
    }

    /// Current BPM estimate as of `now`.
    ///
    /// Returns 0 (and forgets the beat timestamps) once no beat has been seen
    /// for longer than [`BPM_TIMEOUT`].
    pub fn bpm_at(&mut self, now: Instant) -> f64 {
        let timed_out = match self.last_beat_time {
            Some(last) => now.saturating_duration_since(last) > BPM_TIMEOUT,
            None => true,
        };
        if timed_out {
            self.current_bpm = 0.0;
            self.beat_timestamps.clear();
        }
        self.current_bpm
    }

    /// Number of energy values currently in the rolling window
    pub fn energy_history_len(&self) -> usize {
        self.energy_history.len()
    }

    /// Number of beat timestamps currently tracked
    pub fn beat_count(&self) -> usize {
        self.beat_timestamps.len()
    }

    /// Reset the detector state
    pub fn reset(&mut self) {
        self.energy_history.clear();
        self.beat_timestamps.clear();
        self.last_beat_time = None;
        self.current_bpm = 0.0;
        debug!("BeatDetector reset");
    }

    fn push_energy(&mut self, energy: f64) {
        self.energy_history.push_back(energy);
        if self.energy_history.len() > ENERGY_HISTORY_SIZE {
            self.energy_history.pop_front();
        }
    }

    fn average_energy(&self) -> f64 {
        if self.energy_history.is_empty() {
            return 0.0;
        }
        self.energy_history.iter().sum::<f64>() / self.energy_history.len() as f64
    }

    fn update_bpm(&mut self) {
        if self.beat_timestamps.len() < 2 {
            self.current_bpm = 0.0;
            return;
        }
        let (Some(first), Some(last)) = (self.beat_timestamps.front(), self.beat_timestamps.back())
        else {
            return;
        };

        let span_ms = last.saturating_duration_since(*first).as_secs_f64() * 1000.0;
        let average_interval = span_ms / (self.beat_timestamps.len() - 1) as f64;
        if average_interval > 0.0 {
            self.current_bpm = 60000.0 / average_interval;
        }
    }
}
