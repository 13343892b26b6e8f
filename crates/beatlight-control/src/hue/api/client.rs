use crate::hue::models::{LightUpdate, LowEffectConfig};
use crate::{ControlError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::trace;

/// Connect and request timeout for bridge calls
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// JSON body of a light state request. Absent fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightStateBody {
    /// 0-254
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
    /// 0-65535
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hue: Option<u16>,
    /// 0-254
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transitiontime: Option<i32>,
}

impl From<&LightUpdate> for LightStateBody {
    fn from(update: &LightUpdate) -> Self {
        Self {
            bri: update.brightness.map(|b| b.clamp(0, 254) as u8),
            hue: update.hue.map(|h| scale(h, 65535.0) as u16),
            sat: update.saturation.map(|s| scale(s, 254.0) as u8),
            transitiontime: update.transition_time,
        }
    }
}

/// Map a normalized value onto `0..=max`, rounding to nearest.
fn scale(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    (value * max).round().clamp(0.0, max)
}

/// Status line of a bridge response plus the headers the backoff logic needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateResponse {
    pub status: u16,
    /// Raw `Retry-After` header value
    pub retry_after: Option<String>,
}

impl StateResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// Sends one light state request to a bridge.
///
/// Implemented by [`HueHttpClient`] for real bridges; tests plug in scripted
/// clients.
pub trait LightStateClient: Send + Sync + 'static {
    fn put_state(
        &self,
        light_id: &str,
        body: &LightStateBody,
    ) -> impl Future<Output = Result<StateResponse>> + Send;
}

/// reqwest-backed bridge client (`PUT /api/{key}/lights/{id}/state`)
pub struct HueHttpClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HueHttpClient {
    pub fn new(config: &LowEffectConfig) -> Result<Self> {
        if config.bridge_host.trim().is_empty() {
            return Err(ControlError::InvalidParameter(
                "Bridge host cannot be empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: format!("http://{}", config.bridge_host.trim()),
            api_key: config.api_key.clone(),
        })
    }

    fn state_url(&self, light_id: &str) -> String {
        format!(
            "{}/api/{}/lights/{}/state",
            self.base_url, self.api_key, light_id
        )
    }
}

impl LightStateClient for HueHttpClient {
    async fn put_state(&self, light_id: &str, body: &LightStateBody) -> Result<StateResponse> {
        let resp = self
            .client
            .put(self.state_url(light_id))
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if !resp.status().is_success() {
            // Body is only useful for diagnostics
            let text = resp.text().await.unwrap_or_default();
            trace!("Bridge answered {} for light {}: {}", status, light_id, text);
        }

        Ok(StateResponse {
            status,
            retry_after,
        })
    }
}
