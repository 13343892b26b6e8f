//! UDP streaming transport

pub mod controller;
pub mod protocol;
