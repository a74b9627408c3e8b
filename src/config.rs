//! License client configuration.

use crate::identity::{ProductId, ProductKind};
use crate::LicenseError;
use reqwest::Url;
use std::time::Duration;

/// Timeout applied to every license server request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration supplied by the host application.
///
/// Nothing here triggers network I/O; [`crate::LicenseClient::new`] only
/// resolves identity and storage keys from it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Product id on the license server. When `None`, the operator may
    /// enter one through the settings form.
    pub product_id: Option<ProductId>,

    /// Parent product id for variable products.
    pub product_parent_id: Option<u64>,

    /// Installed software version (semantic version).
    pub software_version: String,

    /// Whether the licensed software is a plugin or a theme.
    pub kind: ProductKind,

    /// Root URL of the store running the API Manager.
    pub api_url: String,

    /// Home URL of this installation; sent without scheme as `object`.
    pub site_url: String,

    /// Main file basename relative to the plugin/theme root,
    /// e.g. `my-plugin/my-plugin.php`.
    pub main_file: String,

    /// Display name of the licensed software.
    pub software_title: String,

    /// Localization namespace. Not sent to the server.
    pub text_domain: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), LicenseError> {
        if self.api_url.trim().is_empty() {
            return Err(LicenseError::ConfigurationMissing(
                "api_url cannot be empty".to_string(),
            ));
        }
        Url::parse(self.api_url.trim()).map_err(|e| {
            LicenseError::ConfigurationMissing(format!("api_url is not a valid URL: {}", e))
        })?;
        if self.software_version.trim().is_empty() {
            return Err(LicenseError::ConfigurationMissing(
                "software_version cannot be empty".to_string(),
            ));
        }
        if self.main_file.trim().is_empty() {
            return Err(LicenseError::ConfigurationMissing(
                "main_file cannot be empty".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(LicenseError::ConfigurationMissing(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ClientConfig {
        ClientConfig {
            product_id: Some(ProductId::Numeric(64)),
            product_parent_id: None,
            software_version: "1.2.0".to_string(),
            kind: ProductKind::Plugin,
            api_url: "https://store.example.com".to_string(),
            site_url: "https://blog.example.org".to_string(),
            main_file: "rup-plugin/rup-plugin.php".to_string(),
            software_title: "RUP Plugin".to_string(),
            text_domain: "rup-plugin".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn missing_api_url() {
        let config = ClientConfig {
            api_url: String::new(),
            ..test_config()
        };
        assert!(matches!(
            config.validate(),
            Err(LicenseError::ConfigurationMissing(_))
        ));
    }

    #[test]
    fn unparseable_api_url() {
        let config = ClientConfig {
            api_url: "not a url".to_string(),
            ..test_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_version_and_file() {
        let no_version = ClientConfig {
            software_version: " ".to_string(),
            ..test_config()
        };
        assert!(no_version.validate().is_err());

        let no_file = ClientConfig {
            main_file: String::new(),
            ..test_config()
        };
        assert!(no_file.validate().is_err());
    }

    #[test]
    fn default_timeout_is_fifteen_seconds() {
        assert_eq!(DEFAULT_TIMEOUT.as_secs(), 15);
    }
}
