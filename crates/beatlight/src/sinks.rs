//! Transport sinks that only log, for `--dry-run`

use beatlight_control::{EffectFrame, FastEffectSink, LightUpdate, LowEffectSink};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Default)]
pub struct LoggingFastSink {
    frames: AtomicU64,
}

impl LoggingFastSink {
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl FastEffectSink for LoggingFastSink {
    fn send_frame(&self, frame: &EffectFrame) {
        let n = self.frames.fetch_add(1, Ordering::Relaxed);
        debug!(
            "[dry-run] fast frame #{} at {}ms: {} updates",
            n,
            frame.timestamp,
            frame.len()
        );
    }
}

#[derive(Default)]
pub struct LoggingLowSink {
    updates: AtomicU64,
}

impl LoggingLowSink {
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }
}

impl LowEffectSink for LoggingLowSink {
    fn update_lights(&self, updates: Vec<LightUpdate>) {
        self.updates
            .fetch_add(updates.len() as u64, Ordering::Relaxed);
        for update in &updates {
            debug!("[dry-run] low update {:?}", update);
        }
    }
}
