//! Outbound HTTP layer.

pub mod http;
