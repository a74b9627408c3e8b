//! HTTP transport for the license API.
//!
//! The client never talks to reqwest directly; it goes through
//! [`HttpTransport`] so hosts and tests can substitute their own.

use crate::config::ClientConfig;
use crate::LicenseError;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use reqwest::Url;
use std::time::Duration;

/// Raw HTTP response: status and body, nothing interpreted yet.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,

    /// Raw response body.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Build a response from parts.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is exactly 200.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Get the body as a UTF-8 string.
    pub fn body_str(&self) -> Result<&str, LicenseError> {
        std::str::from_utf8(&self.body).map_err(|_| LicenseError::EmptyResponse)
    }
}

/// Outbound HTTP collaborator.
///
/// Implementations POST to `url` (all arguments are already in the query
/// string) and give up after `timeout`. Transport failures are reported as
/// [`LicenseError::Transport`]; non-200 statuses are returned as-is.
pub trait HttpTransport: Send + Sync {
    /// Send an empty-bodied POST.
    fn post(&self, url: &Url, timeout: Duration) -> Result<RawResponse, LicenseError>;
}

/// Blocking reqwest transport.
pub struct ReqwestTransport {
    client: Client,
    user_agent: String,
}

impl ReqwestTransport {
    /// Create a transport for the configured product.
    pub fn new(config: &ClientConfig) -> Result<Self, LicenseError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LicenseError::Transport(format!("Failed to create client: {}", e)))?;

        Ok(Self {
            client,
            user_agent: build_user_agent(config),
        })
    }

    /// The User-Agent sent with every request.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl HttpTransport for ReqwestTransport {
    fn post(&self, url: &Url, timeout: Duration) -> Result<RawResponse, LicenseError> {
        let response = self
            .client
            .post(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .timeout(timeout)
            .send()
            .map_err(|e| LicenseError::Transport(format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| LicenseError::Transport(format!("Failed to read body: {}", e)))?
            .to_vec();

        Ok(RawResponse { status, body })
    }
}

/// Build a User-Agent string from config.
///
/// Format: `<title>/<version> wcam-client/<crate version>`
pub fn build_user_agent(config: &ClientConfig) -> String {
    let title: String = config
        .software_title
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let product = if title.is_empty() { "software" } else { title.as_str() };

    format!(
        "{}/{} wcam-client/{}",
        product,
        config.software_version,
        env!("CARGO_PKG_VERSION")
    )
}
