//! Light control: routing, transports and effects

pub mod api;
pub mod controller;
pub mod effects;
pub mod lightmap;
pub mod models;
pub mod router;
pub mod stream;
