//! Effect router
//!
//! Splits each [`EffectFrame`] by the transport configured for each light and
//! hands the halves to whichever sinks are attached.

use super::lightmap::{ControlTypeMap, LightMap};
use super::models::{ControlType, EffectFrame, LightUpdate};
use crate::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Receives the streaming half of a routed frame.
pub trait FastEffectSink: Send + Sync {
    fn send_frame(&self, frame: &EffectFrame);
}

/// Receives the request half of a routed frame.
pub trait LowEffectSink: Send + Sync {
    fn update_lights(&self, updates: Vec<LightUpdate>);
}

/// Routes light updates to the fast or low transport.
#[derive(Default)]
pub struct EffectRouter {
    control_types: ControlTypeMap,
    fast: Option<Arc<dyn FastEffectSink>>,
    low: Option<Arc<dyn LowEffectSink>>,
}

impl EffectRouter {
    /// Router with an empty light map and no sinks
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_control_types(control_types: ControlTypeMap) -> Self {
        Self {
            control_types,
            ..Self::default()
        }
    }

    /// Replace the routing table with the contents of a light map file.
    ///
    /// On error the current table is left untouched.
    pub fn load_light_map(&mut self, path: &Path) -> Result<usize> {
        let map = LightMap::load(path)?;
        Ok(self.apply(&map))
    }

    /// Same as [`load_light_map`](Self::load_light_map) for in-memory JSON.
    pub fn load_light_map_from_str(&mut self, json: &str) -> Result<usize> {
        let map = LightMap::from_json(json)?;
        Ok(self.apply(&map))
    }

    fn apply(&mut self, map: &LightMap) -> usize {
        self.control_types = map.control_types();
        info!("Loaded {} lights from light map", self.control_types.len());
        self.control_types.len()
    }

    pub fn set_fast_sink(&mut self, sink: Arc<dyn FastEffectSink>) {
        self.fast = Some(sink);
    }

    pub fn set_low_sink(&mut self, sink: Arc<dyn LowEffectSink>) {
        self.low = Some(sink);
    }

    /// Split `frame` by transport, preserving the relative order of updates.
    ///
    /// Updates for lights missing from the map are dropped. A half is only
    /// forwarded when it is non-empty and a sink is attached for it.
    pub fn route_frame(&self, frame: &EffectFrame) {
        if frame.is_empty() {
            return;
        }

        let mut fast_updates = Vec::new();
        let mut low_updates = Vec::new();

        for update in &frame.updates {
            match self.control_types.get(&update.light_id) {
                Some(ControlType::FastUdp) => fast_updates.push(update.clone()),
                Some(ControlType::LowHttp) => low_updates.push(update.clone()),
                None => warn!("Unknown light ID: {}, skipping", update.light_id),
            }
        }

        if !fast_updates.is_empty() {
            if let Some(fast) = &self.fast {
                debug!("Routing {} updates to fast transport", fast_updates.len());
                fast.send_frame(&EffectFrame::new(fast_updates, frame.timestamp));
            }
        }

        if !low_updates.is_empty() {
            if let Some(low) = &self.low {
                debug!("Routing {} updates to low transport", low_updates.len());
                low.update_lights(low_updates);
            }
        }
    }

    pub fn control_type(&self, light_id: &str) -> Option<ControlType> {
        self.control_types.get(light_id).copied()
    }

    /// Number of lights in the routing table
    pub fn light_count(&self) -> usize {
        self.control_types.len()
    }

    /// Configured light ids, sorted
    pub fn light_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.control_types.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Whether any light uses `control_type`
    pub fn uses(&self, control_type: ControlType) -> bool {
        self.control_types.values().any(|t| *t == control_type)
    }
}
