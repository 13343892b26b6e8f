//! Application configuration (`beatlight.toml`)

use anyhow::{Context, Result};
use beatlight_control::{FastEffectConfig, LowEffectConfig};
use beatlight_core::{AudioConfig, LogConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which effect turns analysis results into light updates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    /// Flash on every beat, fade in between
    #[default]
    Pulse,
    /// Brightness follows energy, hue follows pitch
    Energy,
}

/// Top-level configuration. Every section is optional in the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub effect: EffectKind,
    pub fast: FastEffectConfig,
    pub low: LowEffectConfig,
    /// Light map consulted by the router
    pub light_map: PathBuf,
    pub log: LogConfig,
}

impl AppConfig {
    /// Load a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config file {:?}", path))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatlight_core::WindowFunction;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.audio, AudioConfig::default());
        assert_eq!(config.effect, EffectKind::Pulse);
        assert_eq!(config.low.batch_window_ms, 100);
        assert_eq!(config.fast.target_port, 2100);
    }

    #[test]
    fn test_parse_sections() {
        let config = AppConfig::from_toml(
            r#"
            effect = "energy"
            light_map = "lights/lightmap.json"

            [audio]
            fft_size = 2048
            window = "blackman"

            [fast]
            target_host = "10.0.0.5"
            target_port = 2101

            [low]
            bridge_host = "10.0.0.2"
            api_key = "abc"
            requests_per_second = 5.0

            [log]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.effect, EffectKind::Energy);
        assert_eq!(config.light_map, PathBuf::from("lights/lightmap.json"));
        assert_eq!(config.audio.fft_size, 2048);
        assert_eq!(config.audio.window, WindowFunction::Blackman);
        assert_eq!(config.audio.smoothing, 0.5);
        assert_eq!(config.fast.target(), "10.0.0.5:2101");
        assert_eq!(config.low.api_key, "abc");
        assert_eq!(config.low.batch_window_ms, 100);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_unknown_effect_rejected() {
        assert!(AppConfig::from_toml("effect = \"strobe\"").is_err());
    }

    #[test]
    fn test_debug_hides_api_key() {
        let mut config = AppConfig::default();
        config.low.api_key = "very-secret".to_string();
        assert!(!format!("{:?}", config).contains("very-secret"));
    }

    #[test]
    fn test_load_round_trip_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("beatlight.toml");
        let mut config = AppConfig::default();
        config.low.bridge_host = "bridge".to_string();
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.low.bridge_host, "bridge");
        assert!(AppConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
