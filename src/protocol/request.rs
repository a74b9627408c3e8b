//! Request construction for the `wc-am-api` endpoint.
//!
//! Every call is a POST to `<api_url>?wc-api=wc-am-api&wc_am_action=<action>&...`
//! with all arguments carried in the query string.

use crate::LicenseError;
use reqwest::Url;
use std::fmt::Display;

/// Remote API action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Consume an activation slot for this instance.
    Activate,
    /// Release this instance's activation slot.
    Deactivate,
    /// Query the activation state of this instance.
    Status,
    /// Ask for the latest package.
    Update,
    /// Ask for the details shown in the "view details" dialog.
    PluginInformation,
}

impl Action {
    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::Status => "status",
            Self::Update => "update",
            Self::PluginInformation => "plugininformation",
        }
    }
}

/// A single API request: the action plus its ordered arguments.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    action: Action,
    params: Vec<(&'static str, String)>,
}

impl ApiRequest {
    /// Start a request for `action`.
    pub fn new(action: Action) -> Self {
        Self {
            action,
            params: Vec::new(),
        }
    }

    /// Append an argument.
    pub fn param(mut self, name: &'static str, value: impl Display) -> Self {
        self.params.push((name, value.to_string()));
        self
    }

    /// Append an argument only when present.
    pub fn opt_param<T: Display>(self, name: &'static str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.param(name, v),
            None => self,
        }
    }

    /// The action this request performs.
    pub fn action(&self) -> Action {
        self.action
    }

    /// Look up an argument by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Build the target URL under `api_url`.
    pub fn to_url(&self, api_url: &str) -> Result<Url, LicenseError> {
        let mut url = Url::parse(api_url.trim()).map_err(|e| {
            LicenseError::ConfigurationMissing(format!("api_url is not a valid URL: {}", e))
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("wc-api", "wc-am-api");
            query.append_pair("wc_am_action", self.action.as_str());
            for (name, value) in &self.params {
                query.append_pair(name, value);
            }
        }

        Ok(url)
    }
}
