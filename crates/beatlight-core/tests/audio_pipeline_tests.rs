use beatlight_core::audio::beat::{BPM_HISTORY_SIZE, ENERGY_HISTORY_SIZE};
use beatlight_core::{AnalysisResult, AudioFrame, BeatDetector, FrameAnalyzer};
use std::time::{Duration, Instant};

fn energy(value: f64) -> AnalysisResult {
    AnalysisResult::new(100.0, value, value)
}

/// Fill the rolling history with a quiet baseline, one frame every 23ms.
fn prime(detector: &mut BeatDetector, start: Instant, frames: usize, level: f64) -> Instant {
    let mut now = start;
    for _ in 0..frames {
        assert!(!detector.is_beat_at(&energy(level), now));
        now += Duration::from_millis(23);
    }
    now
}

fn pcm_frame(samples: &[f64], sample_rate: u32) -> AudioFrame {
    let data = samples
        .iter()
        .flat_map(|s| ((s * 32767.0) as i16).to_le_bytes())
        .collect();
    AudioFrame::new(data, sample_rate, 1, 0)
}

#[test]
fn test_constant_low_energy_never_beats() {
    let mut detector = BeatDetector::new();
    let start = Instant::now();
    for i in 0..1000 {
        let now = start + Duration::from_millis(i * 23);
        assert!(!detector.is_beat_at(&energy(0.05), now));
    }
    assert_eq!(detector.energy_history_len(), ENERGY_HISTORY_SIZE);
    assert_eq!(detector.bpm_at(start + Duration::from_secs(30)), 0.0);
}

#[test]
fn test_spike_detected_then_locked_out() {
    let mut detector = BeatDetector::new();
    let now = prime(&mut detector, Instant::now(), ENERGY_HISTORY_SIZE, 0.1);

    assert!(detector.is_beat_at(&energy(0.5), now));
    // Identical spike 100ms later falls inside the 200ms window
    assert!(!detector.is_beat_at(&energy(0.5), now + Duration::from_millis(100)));
    assert!(!detector.is_beat_at(&energy(0.5), now + Duration::from_millis(199)));
}

#[test]
fn test_spike_after_lockout_is_detected() {
    let mut detector = BeatDetector::new();
    let now = prime(&mut detector, Instant::now(), ENERGY_HISTORY_SIZE, 0.1);

    assert!(detector.is_beat_at(&energy(0.5), now));
    // Average is still dominated by the 0.1 baseline
    assert!(detector.is_beat_at(&energy(0.5), now + Duration::from_millis(200)));
}

#[test]
fn test_energy_just_at_threshold_is_not_a_beat() {
    let mut detector = BeatDetector::new();
    let now = prime(&mut detector, Instant::now(), 10, 0.5);
    // Exactly 1.3x the average, must be strictly greater
    assert!(!detector.is_beat_at(&energy(0.5 * 1.3), now));
}

#[test]
fn test_bpm_from_regular_beats() {
    let mut detector = BeatDetector::new();
    let start = Instant::now();
    let interval = Duration::from_millis(500);
    let mut beat_time = prime(&mut detector, start, 20, 0.05);

    for _ in 0..6 {
        assert!(detector.is_beat_at(&energy(1.0), beat_time));
        // Quiet frames between beats keep the average low
        for step in 1..=5 {
            let quiet = beat_time + Duration::from_millis(step * 50);
            assert!(!detector.is_beat_at(&energy(0.05), quiet));
        }
        beat_time += interval;
    }

    let bpm = detector.bpm_at(beat_time - interval);
    assert!((bpm - 120.0).abs() < 0.5, "bpm was {}", bpm);
    assert!(detector.beat_count() <= BPM_HISTORY_SIZE);
}

#[test]
fn test_bpm_requires_two_beats() {
    let mut detector = BeatDetector::new();
    let now = prime(&mut detector, Instant::now(), 10, 0.1);
    assert!(detector.is_beat_at(&energy(1.0), now));
    assert_eq!(detector.bpm_at(now), 0.0);
}

#[test]
fn test_bpm_resets_after_timeout() {
    let mut detector = BeatDetector::new();
    let mut now = prime(&mut detector, Instant::now(), 10, 0.1);
    assert!(detector.is_beat_at(&energy(1.0), now));
    now += Duration::from_millis(400);
    assert!(detector.is_beat_at(&energy(1.0), now));

    assert!(detector.bpm_at(now + Duration::from_millis(3000)) > 0.0);
    assert_eq!(detector.bpm_at(now + Duration::from_millis(3001)), 0.0);
    assert_eq!(detector.beat_count(), 0);
}

#[test]
fn test_beat_timestamps_bounded() {
    let mut detector = BeatDetector::new();
    let mut now = prime(&mut detector, Instant::now(), 5, 0.01);
    for _ in 0..20 {
        detector.is_beat_at(&energy(0.01), now);
        now += Duration::from_millis(300);
        detector.is_beat_at(&energy(1.0), now);
        now += Duration::from_millis(1);
    }
    assert!(detector.beat_count() <= BPM_HISTORY_SIZE);
}

#[test]
fn test_frames_through_analyzer_and_detector() {
    let sample_rate = 44100;
    let mut analyzer = FrameAnalyzer::new(sample_rate, 1024).unwrap();
    let mut detector = BeatDetector::new();
    let start = Instant::now();

    let quiet: Vec<f64> = (0..1024)
        .map(|i| (2.0 * std::f64::consts::PI * 220.0 * i as f64 / 44100.0).sin() * 0.05)
        .collect();
    let loud: Vec<f64> = quiet.iter().map(|s| s * 16.0).collect();

    let mut now = start;
    for _ in 0..ENERGY_HISTORY_SIZE {
        let result = analyzer.analyze(&pcm_frame(&quiet, sample_rate));
        assert!(!detector.is_beat_at(&result, now));
        now += Duration::from_millis(23);
    }

    let result = analyzer.analyze(&pcm_frame(&loud, sample_rate));
    assert!(result.energy > 0.5);
    assert!(detector.is_beat_at(&result, now));
}
