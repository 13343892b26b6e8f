//! Beatlight Control - light transport layer
//!
//! Takes batches of [`LightUpdate`]s produced by effects and delivers them to
//! the lights over one of two transports:
//! - **Fast**: one binary UDP packet per frame, unreliable, sequence-numbered
//! - **Low**: one HTTP request per light, batched, rate limited, with
//!   per-light backoff when the bridge answers `429 Too Many Requests`
//!
//! The [`EffectRouter`] decides per light which transport to use, based on a
//! light map loaded at startup.
//!
//! ## Modules
//!
//! - [`hue`] - light map, router, transports and effects
//! - [`error`] - Error types

#![allow(missing_docs)]

/// Error types
pub mod error;

/// Light transport and effect generation
pub mod hue;

// Re-exports
pub use error::{ControlError, Result};
pub use hue::api::client::{HueHttpClient, LightStateBody, LightStateClient, StateResponse};
pub use hue::controller::LowEffectController;
pub use hue::effects::{BeatPulseEffect, EnergyEffect, LightEffect};
pub use hue::lightmap::{ControlTypeMap, LightMap};
pub use hue::models::{
    ControlType, EffectFrame, FastEffectConfig, LightUpdate, LowEffectConfig,
};
pub use hue::router::{EffectRouter, FastEffectSink, LowEffectSink};
pub use hue::stream::controller::{FastEffectController, TransportStats};
