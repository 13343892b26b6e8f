//! Request (HTTP) transport controller
//!
//! Queues light updates (at most one per light) and flushes them on a fixed
//! timer, one request per update, with a global minimum spacing between
//! requests and per-light backoff when the bridge answers
//! `429 Too Many Requests`.

use super::api::backoff::{BackoffState, BackoffTable};
use super::api::client::{HueHttpClient, LightStateBody, LightStateClient};
use super::models::{LightUpdate, LowEffectConfig};
use super::router::LowEffectSink;
use crate::{ControlError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// How long `stop()` waits for an in-flight flush before aborting it
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

struct Inner<C> {
    client: C,
    pending: Mutex<Vec<LightUpdate>>,
    backoff: Mutex<BackoffTable>,
    last_request: Mutex<Option<Instant>>,
    min_request_interval: Duration,
    /// Serializes flushes so that at most one request is in flight
    flush_lock: tokio::sync::Mutex<()>,
}

struct FlushTask {
    handle: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

/// Batched, rate-limited HTTP light controller.
pub struct LowEffectController<C: LightStateClient = HueHttpClient> {
    config: LowEffectConfig,
    inner: Arc<Inner<C>>,
    task: Mutex<Option<FlushTask>>,
    running: AtomicBool,
}

impl LowEffectController<HueHttpClient> {
    /// Controller talking to the bridge named in `config`
    pub fn new(config: LowEffectConfig) -> Result<Self> {
        let client = HueHttpClient::new(&config)?;
        Self::with_client(config, client)
    }
}

impl<C: LightStateClient> LowEffectController<C> {
    pub fn with_client(config: LowEffectConfig, client: C) -> Result<Self> {
        config.validate()?;
        let min_request_interval = Duration::from_millis(config.min_request_interval_ms());
        Ok(Self {
            config,
            inner: Arc::new(Inner {
                client,
                pending: Mutex::new(Vec::new()),
                backoff: Mutex::new(BackoffTable::new()),
                last_request: Mutex::new(None),
                min_request_interval,
                flush_lock: tokio::sync::Mutex::new(()),
            }),
            task: Mutex::new(None),
            running: AtomicBool::new(false),
        })
    }

    /// Spawn the flush task on the current tokio runtime.
    ///
    /// The first flush happens one batch window after start.
    pub fn start(&self) -> Result<()> {
        let mut task = self.task.lock();
        if task.is_some() {
            warn!("LowEffectController already running");
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ControlError::Config(format!("No tokio runtime: {}", e)))?;

        let window = Duration::from_millis(self.config.batch_window_ms);
        let inner = Arc::clone(&self.inner);
        let (shutdown, mut shutdown_rx) = oneshot::channel();

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + window, window);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => inner.flush().await,
                }
            }
            debug!("Flush task finished");
        });

        *task = Some(FlushTask { handle, shutdown });
        self.running.store(true, Ordering::SeqCst);
        info!(
            "LowEffectController started with batch window {}ms and rate limit {} req/s",
            self.config.batch_window_ms, self.config.requests_per_second
        );
        Ok(())
    }

    /// Stop the flush task, waiting up to [`STOP_TIMEOUT`] for a flush in
    /// progress before aborting it. Pending updates are discarded.
    pub async fn stop(&self) {
        let task = self.task.lock().take();
        let Some(FlushTask {
            mut handle,
            shutdown,
        }) = task
        else {
            return;
        };
        self.running.store(false, Ordering::SeqCst);

        // Receiver is gone if the task already ended
        let _ = shutdown.send(());
        if tokio::time::timeout(STOP_TIMEOUT, &mut handle).await.is_err() {
            warn!("Flush task did not finish within {:?}, aborting", STOP_TIMEOUT);
            handle.abort();
        }

        let dropped = std::mem::take(&mut *self.inner.pending.lock()).len();
        if dropped > 0 {
            debug!("Discarded {} pending updates", dropped);
        }
        info!("LowEffectController stopped");
    }

    /// Queue updates for the next flush.
    ///
    /// A light holds at most one queued update: a newer update for a light
    /// that is already queued is merged into it and keeps its queue position.
    pub fn update_lights(&self, updates: Vec<LightUpdate>) {
        if updates.is_empty() {
            return;
        }
        let count = updates.len();
        let mut merged = 0;
        let mut pending = self.inner.pending.lock();
        for update in updates {
            match pending
                .iter_mut()
                .find(|queued| queued.light_id == update.light_id)
            {
                Some(queued) => {
                    queued.merge(update);
                    merged += 1;
                }
                None => pending.push(update),
            }
        }
        debug!(
            "Added {} updates to pending queue ({} merged, {} queued)",
            count,
            merged,
            pending.len()
        );
    }

    /// Run one flush now. The timer task calls this every batch window.
    pub async fn flush(&self) {
        self.inner.flush().await;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Current backoff state of `light_id`, if any
    pub fn backoff_state(&self, light_id: &str) -> Option<BackoffState> {
        self.inner.backoff.lock().get(light_id).copied()
    }

    pub fn config(&self) -> &LowEffectConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.inner.client
    }
}

impl<C: LightStateClient> Inner<C> {
    async fn flush(&self) {
        let _flushing = self.flush_lock.lock().await;

        let batch = std::mem::take(&mut *self.pending.lock());
        if batch.is_empty() {
            return;
        }
        debug!("Processing batch of {} updates", batch.len());

        for update in batch {
            self.wait_for_slot().await;

            let now = Instant::now();
            if !self.backoff.lock().is_allowed(&update.light_id, now) {
                debug!("Light {} is in backoff, dropping update", update.light_id);
                continue;
            }

            *self.last_request.lock() = Some(now);
            self.send(&update).await;
        }
    }

    /// Sleep until the global request spacing allows another request
    async fn wait_for_slot(&self) {
        let last = *self.last_request.lock();
        if let Some(last) = last {
            let next_slot = last + self.min_request_interval;
            if next_slot > Instant::now() {
                tokio::time::sleep_until(next_slot).await;
            }
        }
    }

    async fn send(&self, update: &LightUpdate) {
        let body = LightStateBody::from(update);
        let light_id = update.light_id.as_str();

        match self.client.put_state(light_id, &body).await {
            Ok(resp) if resp.is_success() => {
                debug!("Updated light {}", light_id);
                self.backoff.lock().clear(light_id);
            }
            Ok(resp) if resp.is_rate_limited() => {
                let backoff = self.backoff.lock().record_rate_limited(
                    light_id,
                    resp.retry_after.as_deref(),
                    Instant::now(),
                );
                warn!(
                    "HTTP 429 for light {}, backing off for {}ms",
                    light_id,
                    backoff.as_millis()
                );
            }
            Ok(resp) => {
                warn!(
                    "HTTP request failed with status {} for light {}",
                    resp.status, light_id
                );
            }
            Err(e) => {
                error!("Failed to send update for light {}: {}", light_id, e);
            }
        }
    }
}

impl<C: LightStateClient> LowEffectSink for LowEffectController<C> {
    fn update_lights(&self, updates: Vec<LightUpdate>) {
        LowEffectController::update_lights(self, updates);
    }
}

impl<C: LightStateClient> Drop for LowEffectController<C> {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hue::api::client::StateResponse;

    struct AlwaysOk;

    impl LightStateClient for AlwaysOk {
        async fn put_state(&self, _: &str, _: &LightStateBody) -> Result<StateResponse> {
            Ok(StateResponse::new(200))
        }
    }

    fn config() -> LowEffectConfig {
        LowEffectConfig {
            bridge_host: "bridge.local".to_string(),
            api_key: "key".to_string(),
            batch_window_ms: 100,
            requests_per_second: 10.0,
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut bad = config();
        bad.requests_per_second = -1.0;
        assert!(LowEffectController::with_client(bad, AlwaysOk).is_err());
    }

    #[test]
    fn test_start_requires_runtime() {
        let controller = LowEffectController::with_client(config(), AlwaysOk).unwrap();
        assert!(matches!(controller.start(), Err(ControlError::Config(_))));
        assert!(!controller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_lifecycle() {
        let controller = LowEffectController::with_client(config(), AlwaysOk).unwrap();
        controller.start().unwrap();
        controller.start().unwrap();
        assert!(controller.is_running());

        controller.update_lights(vec![LightUpdate::new("1")]);
        controller.update_lights(Vec::new());
        assert_eq!(controller.pending_count(), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(controller.pending_count(), 0);

        controller.stop().await;
        controller.stop().await;
        assert!(!controller.is_running());
    }
}
