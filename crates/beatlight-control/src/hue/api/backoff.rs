//! Per-light backoff after `429 Too Many Requests`

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// First exponential backoff step
pub const INITIAL_BACKOFF_MS: u64 = 1000;
/// Upper bound for exponential backoff
pub const MAX_BACKOFF_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffState {
    /// Updates for the light are dropped until this instant
    pub until: Instant,
    /// Last exponential step, seed for the next one
    pub last_duration_ms: Option<u64>,
}

/// Backoff state keyed by light id. A light without an entry is not backed off.
#[derive(Debug, Default)]
pub struct BackoffTable {
    lights: HashMap<String, BackoffState>,
}

impl BackoffTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an update for `light_id` may be sent at `now`
    pub fn is_allowed(&self, light_id: &str, now: Instant) -> bool {
        self.lights
            .get(light_id)
            .map_or(true, |state| now >= state.until)
    }

    pub fn get(&self, light_id: &str) -> Option<&BackoffState> {
        self.lights.get(light_id)
    }

    /// Forget everything about `light_id` after a successful request
    pub fn clear(&mut self, light_id: &str) {
        self.lights.remove(light_id);
    }

    /// Record a 429 for `light_id` and return the chosen backoff.
    ///
    /// A valid integer `Retry-After` (seconds) is honored as-is and does not
    /// touch the exponential sequence. Otherwise the light's previous step is
    /// doubled, starting at 1s and saturating at 10s.
    pub fn record_rate_limited(
        &mut self,
        light_id: &str,
        retry_after: Option<&str>,
        now: Instant,
    ) -> Duration {
        let previous = self.lights.get(light_id).and_then(|s| s.last_duration_ms);

        let (backoff_ms, last_duration_ms) = match retry_after.and_then(parse_retry_after) {
            Some(seconds) => (seconds.saturating_mul(1000), previous),
            None => {
                let next = match previous {
                    Some(prev) => prev.saturating_mul(2).min(MAX_BACKOFF_MS),
                    None => INITIAL_BACKOFF_MS,
                };
                (next, Some(next))
            }
        };

        let backoff = Duration::from_millis(backoff_ms);
        self.lights.insert(
            light_id.to_string(),
            BackoffState {
                until: now + backoff,
                last_duration_ms,
            },
        );
        backoff
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }
}

/// Integer seconds only; HTTP-date values fall back to exponential backoff.
fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_seconds() {
        let mut table = BackoffTable::new();
        let now = Instant::now();
        let backoff = table.record_rate_limited("1", Some("2"), now);
        assert_eq!(backoff, Duration::from_millis(2000));
        assert!(!table.is_allowed("1", now + Duration::from_millis(1999)));
        assert!(table.is_allowed("1", now + Duration::from_millis(2000)));
        assert_eq!(table.get("1").unwrap().last_duration_ms, None);
    }

    #[test]
    fn test_exponential_sequence_saturates() {
        let mut table = BackoffTable::new();
        let now = Instant::now();
        let steps: Vec<u64> = (0..6)
            .map(|_| table.record_rate_limited("1", None, now).as_millis() as u64)
            .collect();
        assert_eq!(steps, vec![1000, 2000, 4000, 8000, 10_000, 10_000]);
    }

    #[test]
    fn test_invalid_header_falls_back_to_exponential() {
        let mut table = BackoffTable::new();
        let now = Instant::now();
        assert_eq!(
            table.record_rate_limited("1", Some("Wed, 21 Oct 2015 07:28:00 GMT"), now),
            Duration::from_millis(1000)
        );
        assert_eq!(
            table.record_rate_limited("1", Some("-5"), now),
            Duration::from_millis(2000)
        );
        // Retry-After keeps the exponential seed for the next escalation
        table.record_rate_limited("1", Some("1"), now);
        assert_eq!(
            table.record_rate_limited("1", None, now),
            Duration::from_millis(4000)
        );
    }

    #[test]
    fn test_clear_and_isolation() {
        let mut table = BackoffTable::new();
        let now = Instant::now();
        table.record_rate_limited("a", None, now);
        assert!(!table.is_allowed("a", now));
        assert!(table.is_allowed("b", now));

        table.clear("a");
        assert!(table.is_allowed("a", now));
        assert!(table.is_empty());
        assert_eq!(
            table.record_rate_limited("a", None, now),
            Duration::from_millis(1000)
        );
    }
}
