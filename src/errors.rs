//! License client error types.

use thiserror::Error;

/// Errors returned by license operations.
///
/// None of these are fatal to the host: transport and empty-response
/// failures can be retried later, rejections carry the server's text.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Network failure, timeout, or a non-200 HTTP status.
    #[error("License server transport error: {0}")]
    Transport(String),

    /// The server answered with a structured business error
    /// (invalid key, no activations left, ...).
    #[error("{0}")]
    Rejected(String),

    /// HTTP 200 with an empty or unparseable body.
    #[error("License server returned an empty or unreadable response")]
    EmptyResponse,

    /// A required identifier or setting is absent.
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    /// Deactivation was requested but no matching key is activated locally.
    #[error("No activated API key matches the deactivation request")]
    NotActivated,

    /// The persistence collaborator failed.
    #[error("Store I/O error: {0}")]
    Store(String),
}

impl LicenseError {
    /// Whether retrying the same operation later could succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::EmptyResponse | Self::Store(_))
    }
}
