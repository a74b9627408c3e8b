//! Product identity: product ids, slugs and storage key derivation.

use crate::LicenseError;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Prefix shared by every per-product storage key.
pub const DATA_KEY_PREFIX: &str = "wc_am_client_";

/// Prefix of the key holding an operator-entered product id.
pub const PRODUCT_ID_KEY_PREFIX: &str = "wc_am_product_id_";

/// Kind of licensed software.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductKind {
    /// A plugin, identified by `<dir>/<main-file>.php`.
    Plugin,
    /// A theme, identified by its directory.
    Theme,
}

impl FromStr for ProductKind {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plugin" => Ok(Self::Plugin),
            "theme" => Ok(Self::Theme),
            other => Err(LicenseError::ConfigurationMissing(format!(
                "product kind must be \"plugin\" or \"theme\", got {:?}",
                other
            ))),
        }
    }
}

/// Product identifier on the license server.
///
/// API Manager 2.x uses numeric ids; older stores used free-form strings,
/// which are passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductId {
    /// Numeric product id.
    Numeric(u64),
    /// Legacy string product id.
    Named(String),
}

impl ProductId {
    /// Parse a raw value. Empty strings and zero mean "no product id".
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.parse::<u64>() {
            Ok(0) => None,
            Ok(n) => Some(Self::Numeric(n)),
            Err(_) => Some(Self::Named(raw.to_string())),
        }
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{}", n),
            Self::Named(s) => f.write_str(s),
        }
    }
}

/// Lower-case a name and replace space, underscore, `&`, `?` and `-`
/// with underscores so it can be used inside a storage key.
pub fn normalize_key(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '_' | '&' | '?' | '-' => '_',
            other => other,
        })
        .collect()
}

/// Names derived from the main file basename (e.g. `my-plugin/my-plugin.php`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareNames {
    /// Directory name; used as the update slug and the fallback identifier.
    pub slug: String,
    /// Name the host knows the software by: the basename for plugins,
    /// the directory for themes.
    pub plugin_name: String,
}

impl SoftwareNames {
    /// Derive names from the main file basename relative to the host's
    /// plugin or theme root.
    pub fn derive(basename: &str, kind: ProductKind) -> Result<Self, LicenseError> {
        let trimmed = basename.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(LicenseError::ConfigurationMissing(
                "main file basename cannot be empty".to_string(),
            ));
        }

        let path = Path::new(trimmed);
        let dir = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty());

        // Single-file plugins have no directory; fall back to the file stem.
        let slug = match dir {
            Some(d) => d.to_string(),
            None => path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(trimmed)
                .to_string(),
        };

        let plugin_name = match kind {
            ProductKind::Plugin => trimmed.to_string(),
            ProductKind::Theme => slug.clone(),
        };

        Ok(Self { slug, plugin_name })
    }
}

/// Strip the scheme from the host's home URL; the result is sent as `object`.
pub fn site_object(home_url: &str) -> String {
    let url = home_url.trim();
    let lower = url.to_ascii_lowercase();
    for scheme in ["https://", "http://"] {
        if lower.starts_with(scheme) {
            return url[scheme.len()..].to_string();
        }
    }
    url.to_string()
}

/// Short, stable fingerprint of an API key for log lines.
pub fn key_fingerprint(api_key: &str) -> String {
    let hash = Sha256::digest(api_key.as_bytes());
    hex::encode(&hash[..4])
}
