//! Light map file (`lightmap.json`)
//!
//! ```json
//! {
//!   "bridges": [{ "id": "bridge-1", "ip": "192.168.1.10" }],
//!   "lights": [
//!     { "id": "1", "controlType": "FAST_UDP", "x": 0.2, "y": 0.5, "bridgeId": "bridge-1" },
//!     { "id": "2", "controlType": "LOW_HTTP", "name": "Hallway" }
//!   ]
//! }
//! ```

use super::models::ControlType;
use crate::{ControlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Light id to transport class
pub type ControlTypeMap = HashMap<String, ControlType>;

/// Parsed light map document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightMap {
    #[serde(default)]
    pub bridges: Vec<BridgeEntry>,
    #[serde(default)]
    pub lights: Vec<LightEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// One light as written in the file. The control type is kept as raw text so
/// that a single bad entry does not reject the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightEntry {
    pub id: String,
    #[serde(default)]
    pub control_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl LightMap {
    /// Read and parse a light map file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ControlError::Config(format!(
                "Light map not found: {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a light map from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| ControlError::Config(format!("Invalid light map: {}", e)))
    }

    /// Build the routing table, skipping entries with an unknown control type.
    ///
    /// A light listed twice keeps its last entry.
    pub fn control_types(&self) -> ControlTypeMap {
        let mut map = ControlTypeMap::with_capacity(self.lights.len());
        for light in &self.lights {
            match ControlType::parse(&light.control_type) {
                Some(control_type) => {
                    debug!("Light {} uses {:?}", light.id, control_type);
                    map.insert(light.id.clone(), control_type);
                }
                None => warn!(
                    "Invalid control type '{}' for light '{}', skipping",
                    light.control_type, light.id
                ),
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "bridges": [{ "id": "b1", "ip": "10.0.0.2", "username": "ignored" }],
        "lights": [
            { "id": "1", "controlType": "FAST_UDP", "x": 0.1, "y": 0.9, "bridgeId": "b1" },
            { "id": "2", "controlType": "LOW_HTTP", "name": "Desk" },
            { "id": "3", "controlType": "SLOW_CARRIER_PIGEON" },
            { "id": "4" }
        ]
    }"#;

    #[test]
    fn test_parse_and_build_control_types() {
        let map = LightMap::from_json(SAMPLE).unwrap();
        assert_eq!(map.lights.len(), 4);
        assert_eq!(map.bridges[0].ip.as_deref(), Some("10.0.0.2"));
        assert_eq!(map.lights[0].x, Some(0.1));

        let types = map.control_types();
        assert_eq!(types.len(), 2);
        assert_eq!(types.get("1"), Some(&ControlType::FastUdp));
        assert_eq!(types.get("2"), Some(&ControlType::LowHttp));
        assert!(!types.contains_key("3"));
        assert!(!types.contains_key("4"));
    }

    #[test]
    fn test_missing_lights_is_empty() {
        let map = LightMap::from_json("{}").unwrap();
        assert!(map.control_types().is_empty());
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = LightMap::from_json("{ lights: ").unwrap_err();
        assert!(matches!(err, ControlError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let map = LightMap::load(file.path()).unwrap();
        assert_eq!(map.control_types().len(), 2);

        let missing = LightMap::load(Path::new("/no/such/lightmap.json"));
        assert!(matches!(missing, Err(ControlError::Config(_))));
    }
}
