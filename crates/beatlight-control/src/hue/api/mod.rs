//! Bridge REST access and rate-limit bookkeeping

pub mod backoff;
pub mod client;
