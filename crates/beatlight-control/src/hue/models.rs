//! Light update and transport configuration types

use crate::{ControlError, Result};
use serde::{Deserialize, Serialize};

/// Desired state change for a single light.
///
/// Every field except the id is optional; an absent field means "leave
/// unchanged", which is not the same as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightUpdate {
    pub light_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<i32>,
    /// Normalized hue in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<f64>,
    /// Normalized saturation in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f64>,
    /// Bridge transition time, in units of 100ms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_time: Option<i32>,
}

impl LightUpdate {
    /// An update for `light_id` with every field absent
    pub fn new(light_id: impl Into<String>) -> Self {
        Self {
            light_id: light_id.into(),
            brightness: None,
            hue: None,
            saturation: None,
            transition_time: None,
        }
    }

    pub fn with_brightness(mut self, brightness: i32) -> Self {
        self.brightness = Some(brightness);
        self
    }

    pub fn with_hue(mut self, hue: f64) -> Self {
        self.hue = Some(hue);
        self
    }

    pub fn with_saturation(mut self, saturation: f64) -> Self {
        self.saturation = Some(saturation);
        self
    }

    pub fn with_transition_time(mut self, transition_time: i32) -> Self {
        self.transition_time = Some(transition_time);
        self
    }

    /// Fold a newer update for the same light into this one. Fields present
    /// in `newer` win, absent ones keep the current value.
    pub fn merge(&mut self, newer: LightUpdate) {
        debug_assert_eq!(self.light_id, newer.light_id);
        self.brightness = newer.brightness.or(self.brightness);
        self.hue = newer.hue.or(self.hue);
        self.saturation = newer.saturation.or(self.saturation);
        self.transition_time = newer.transition_time.or(self.transition_time);
    }
}

/// An ordered batch of light updates produced for one analysis frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EffectFrame {
    pub updates: Vec<LightUpdate>,
    /// Creation time in milliseconds
    pub timestamp: u64,
    /// Assigned by the fast transport when the frame goes on the wire
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
}

impl EffectFrame {
    pub fn new(updates: Vec<LightUpdate>, timestamp: u64) -> Self {
        Self {
            updates,
            timestamp,
            sequence: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }
}

/// Transport class a light is driven through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlType {
    /// Streaming UDP packets
    #[serde(rename = "FAST_UDP")]
    FastUdp,
    /// Rate-limited HTTP requests
    #[serde(rename = "LOW_HTTP")]
    LowHttp,
}

impl ControlType {
    /// Parse the light map spelling (`FAST_UDP` / `LOW_HTTP`)
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "FAST_UDP" => Some(Self::FastUdp),
            "LOW_HTTP" => Some(Self::LowHttp),
            _ => None,
        }
    }
}

/// Settings for the UDP streaming transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastEffectConfig {
    pub target_host: String,
    pub target_port: u16,
}

impl Default for FastEffectConfig {
    fn default() -> Self {
        Self {
            target_host: "127.0.0.1".to_string(),
            target_port: 2100,
        }
    }
}

impl FastEffectConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target_host.trim().is_empty() {
            return Err(ControlError::InvalidParameter(
                "Target host cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` string for address resolution
    pub fn target(&self) -> String {
        format!("{}:{}", self.target_host, self.target_port)
    }
}

/// Settings for the HTTP request transport
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowEffectConfig {
    pub bridge_host: String,
    pub api_key: String,
    /// Flush period in milliseconds
    pub batch_window_ms: u64,
    /// Global request rate limit
    pub requests_per_second: f64,
}

impl Default for LowEffectConfig {
    fn default() -> Self {
        Self {
            bridge_host: String::new(),
            api_key: String::new(),
            batch_window_ms: 100,
            requests_per_second: 10.0,
        }
    }
}

impl std::fmt::Debug for LowEffectConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LowEffectConfig")
            .field("bridge_host", &self.bridge_host)
            .field("api_key", &"***REDACTED***")
            .field("batch_window_ms", &self.batch_window_ms)
            .field("requests_per_second", &self.requests_per_second)
            .finish()
    }
}

impl LowEffectConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bridge_host.trim().is_empty() {
            return Err(ControlError::InvalidParameter(
                "Bridge host cannot be empty".to_string(),
            ));
        }
        if self.batch_window_ms == 0 {
            return Err(ControlError::InvalidParameter(
                "Batch window must be positive".to_string(),
            ));
        }
        if !(self.requests_per_second > 0.0 && self.requests_per_second.is_finite()) {
            return Err(ControlError::InvalidParameter(format!(
                "Requests per second must be positive, got {}",
                self.requests_per_second
            )));
        }
        Ok(())
    }

    /// Minimum spacing between two requests, truncated to whole milliseconds
    pub fn min_request_interval_ms(&self) -> u64 {
        (1000.0 / self.requests_per_second) as u64
    }
}
