//! License API wire protocol: request building and typed responses.

pub mod models;
pub mod request;
