//! Typed responses for each API action.
//!
//! Bodies are decoded once, here. The server is a PHP application, so the
//! decoders accept its habits: counts as numeric strings, `[]` in place of
//! an empty object, and loosely typed `data.activated`.

use crate::LicenseError;
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// `data` object shared by activate, deactivate and status responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseData {
    /// Whether this instance is activated.
    #[serde(default, deserialize_with = "truthy")]
    pub activated: bool,

    /// Human-readable error text.
    #[serde(default, deserialize_with = "lenient_string")]
    pub error: Option<String>,

    /// Machine-readable error code; present on every business error.
    #[serde(default, deserialize_with = "lenient_string")]
    pub error_code: Option<String>,

    /// Informational message.
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,

    /// Activations bought with this key.
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_activations_purchased: Option<u64>,

    /// Activations currently in use.
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_activations: Option<u64>,

    /// Activations still available.
    #[serde(default, deserialize_with = "lenient_count")]
    pub activations_remaining: Option<u64>,
}

impl ResponseData {
    /// Server-provided error text when the payload carries an error.
    pub fn error_text(&self) -> Option<String> {
        if self.error_code.is_none() && self.error.is_none() {
            return None;
        }
        Some(describe_error(
            self.error.as_deref(),
            self.message.as_deref(),
            self.error_code.as_deref(),
        ))
    }
}

/// Response to `activate`.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivateResponse {
    /// Request succeeded.
    pub success: bool,

    /// An activation slot is now held by this instance.
    #[serde(default)]
    pub activated: bool,

    /// Server message shown to the operator.
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,

    /// Details.
    #[serde(default, deserialize_with = "lenient_object")]
    pub data: ResponseData,
}

impl ActivateResponse {
    /// Activation confirmed by the server.
    pub fn is_confirmed(&self) -> bool {
        self.success && self.activated
    }
}

/// Response to `deactivate`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeactivateResponse {
    /// Request succeeded.
    pub success: bool,

    /// The activation slot was released.
    #[serde(default)]
    pub deactivated: bool,

    /// Activations left on the key after release.
    #[serde(default, deserialize_with = "lenient_count")]
    pub activations_remaining: Option<u64>,

    /// Server message.
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,

    /// Details.
    #[serde(default, deserialize_with = "lenient_object")]
    pub data: ResponseData,
}

impl DeactivateResponse {
    /// Deactivation confirmed by the server.
    pub fn is_confirmed(&self) -> bool {
        self.success && self.deactivated
    }
}

/// Response to `status`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    /// Request succeeded.
    pub success: bool,

    /// `"active"` or `"inactive"`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub status_check: Option<String>,

    /// Details, including `activated`.
    #[serde(default, deserialize_with = "lenient_object")]
    pub data: ResponseData,
}

impl StatusResponse {
    /// Whether the server reports this instance as activated.
    pub fn is_activated(&self) -> bool {
        self.data.activated
    }
}

/// Package descriptor returned by `update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatePackage {
    /// Server-side package id.
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    /// Update slug.
    #[serde(default, deserialize_with = "lenient_string")]
    pub slug: Option<String>,
    /// Plugin basename the package applies to.
    #[serde(default, deserialize_with = "lenient_string")]
    pub plugin: Option<String>,
    /// Version offered.
    #[serde(default, deserialize_with = "lenient_string")]
    pub new_version: Option<String>,
    /// Product page.
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
    /// Highest host version the package was tested with.
    #[serde(default, deserialize_with = "lenient_string")]
    pub tested: Option<String>,
    /// Download URL of the package archive.
    #[serde(default, deserialize_with = "lenient_string")]
    pub package: Option<String>,
    /// Notice displayed next to the update.
    #[serde(default, deserialize_with = "lenient_string")]
    pub upgrade_notice: Option<String>,
}

/// `data` object of an `update` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateData {
    /// Offered package.
    #[serde(default, deserialize_with = "lenient_option")]
    pub package: Option<UpdatePackage>,
    /// Error text.
    #[serde(default, deserialize_with = "lenient_string")]
    pub error: Option<String>,
    /// Error code.
    #[serde(default, deserialize_with = "lenient_string")]
    pub error_code: Option<String>,
    /// Message, used as error text when `error` is absent.
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
}

/// Response to `update`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateResponse {
    /// Request succeeded. Some error replies leave it out.
    #[serde(default)]
    pub success: bool,
    /// Details.
    #[serde(default, deserialize_with = "lenient_object")]
    pub data: UpdateData,
}

impl UpdateResponse {
    /// Error text to surface, if the server reported an error code.
    pub fn error_text(&self) -> Option<String> {
        self.data.error_code.as_ref()?;
        self.data
            .error
            .clone()
            .or_else(|| self.data.message.clone())
    }
}

/// Response to `plugininformation`: the details dialog contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Display name.
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    /// Update slug.
    #[serde(default, deserialize_with = "lenient_string")]
    pub slug: Option<String>,
    /// Latest version.
    #[serde(default, deserialize_with = "lenient_string")]
    pub version: Option<String>,
    /// Author line.
    #[serde(default, deserialize_with = "lenient_string")]
    pub author: Option<String>,
    /// Author profile URL.
    #[serde(default, deserialize_with = "lenient_string")]
    pub author_profile: Option<String>,
    /// Product homepage.
    #[serde(default, deserialize_with = "lenient_string")]
    pub homepage: Option<String>,
    /// Minimum host version.
    #[serde(default, deserialize_with = "lenient_string")]
    pub requires: Option<String>,
    /// Highest host version tested.
    #[serde(default, deserialize_with = "lenient_string")]
    pub tested: Option<String>,
    /// Minimum PHP version on the host.
    #[serde(default, deserialize_with = "lenient_string")]
    pub requires_php: Option<String>,
    /// Last update date as sent by the server.
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_updated: Option<String>,
    /// Package download URL.
    #[serde(default, deserialize_with = "lenient_string")]
    pub download_link: Option<String>,
    /// Dialog tabs (description, changelog, ...), keyed by tab name.
    #[serde(default, deserialize_with = "lenient_object")]
    pub sections: BTreeMap<String, String>,
    /// Banner image URLs keyed by size.
    #[serde(default, deserialize_with = "lenient_object")]
    pub banners: BTreeMap<String, String>,
}

/// Decode a response body.
///
/// An empty or undecodable body maps to [`LicenseError::EmptyResponse`].
pub fn parse_reply<T: DeserializeOwned>(body: &[u8]) -> Result<T, LicenseError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(LicenseError::EmptyResponse);
    }
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "undecodable license server response");
        LicenseError::EmptyResponse
    })
}

/// Pick the most specific error text the server gave us.
pub fn describe_error(error: Option<&str>, message: Option<&str>, code: Option<&str>) -> String {
    error
        .or(message)
        .map(str::to_string)
        .or_else(|| code.map(|c| format!("License server error {}", c)))
        .unwrap_or_else(|| "License server rejected the request".to_string())
}

fn truthy<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_object<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient_option(d)?.unwrap_or_default())
}

fn lenient_option<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(d)? {
        v @ Value::Object(_) => serde_json::from_value(v)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activate_success() {
        let body = br#"{"success":true,"activated":true,"message":"1 out of 5 activations remaining","data":{"total_activations_purchased":5,"total_activations":"4","activations_remaining":1}}"#;
        let reply: ActivateResponse = parse_reply(body).unwrap();
        assert!(reply.is_confirmed());
        assert_eq!(reply.message.as_deref(), Some("1 out of 5 activations remaining"));
        assert_eq!(reply.data.total_activations, Some(4));
        assert_eq!(reply.data.activations_remaining, Some(1));
    }

    #[test]
    fn activate_rejection_carries_error_text() {
        let body = br#"{"success":false,"data":{"error_code":100,"error":"The API Key provided could not be found."}}"#;
        let reply: ActivateResponse = parse_reply(body).unwrap();
        assert!(!reply.is_confirmed());
        assert_eq!(reply.data.error_code.as_deref(), Some("100"));
        assert_eq!(
            reply.data.error_text().as_deref(),
            Some("The API Key provided could not be found.")
        );
    }

    #[test]
    fn php_empty_array_is_accepted_as_data() {
        let reply: DeactivateResponse =
            parse_reply(br#"{"success":true,"deactivated":true,"activations_remaining":"3","data":[]}"#)
                .unwrap();
        assert!(reply.is_confirmed());
        assert_eq!(reply.activations_remaining, Some(3));
        assert!(reply.data.error_text().is_none());
    }

    #[test]
    fn status_activated_is_truthy() {
        for (raw, expected) in [
            ("true", true),
            ("1", true),
            ("\"yes\"", true),
            ("false", false),
            ("0", false),
            ("\"0\"", false),
            ("\"\"", false),
            ("null", false),
        ] {
            let body = format!(r#"{{"success":true,"status_check":"active","data":{{"activated":{}}}}}"#, raw);
            let reply: StatusResponse = parse_reply(body.as_bytes()).unwrap();
            assert_eq!(reply.is_activated(), expected, "activated = {}", raw);
        }
    }

    #[test]
    fn status_without_data() {
        let reply: StatusResponse = parse_reply(br#"{"success":false}"#).unwrap();
        assert!(!reply.is_activated());
    }

    #[test]
    fn update_package_decodes() {
        let body = br#"{"success":true,"data":{"package":{"id":12,"slug":"rup-plugin","plugin":"rup-plugin/rup-plugin.php","new_version":"1.3.0","url":"https://store.example.com/p","tested":"6.6","package":"https://store.example.com/dl.zip","upgrade_notice":""}}}"#;
        let reply: UpdateResponse = parse_reply(body).unwrap();
        let package = reply.data.package.unwrap();
        assert_eq!(package.id.as_deref(), Some("12"));
        assert_eq!(package.new_version.as_deref(), Some("1.3.0"));
        assert_eq!(package.package.as_deref(), Some("https://store.example.com/dl.zip"));
    }

    #[test]
    fn update_error_prefers_error_then_message() {
        let with_error: UpdateResponse = parse_reply(
            br#"{"success":false,"data":{"error_code":"101","error":"Key expired","message":"ignored"}}"#,
        )
        .unwrap();
        assert_eq!(with_error.error_text().as_deref(), Some("Key expired"));

        let with_message: UpdateResponse =
            parse_reply(br#"{"success":false,"data":{"error_code":"101","message":"Renew"}}"#).unwrap();
        assert_eq!(with_message.error_text().as_deref(), Some("Renew"));

        let no_code: UpdateResponse =
            parse_reply(br#"{"success":false,"data":{"error":"x"}}"#).unwrap();
        assert!(no_code.error_text().is_none());
    }

    #[test]
    fn package_info_sections() {
        let body = br#"{"name":"RUP Plugin","slug":"rup-plugin","version":"1.3.0","sections":{"description":"<p>Hi</p>","changelog":"<ul></ul>"},"banners":[]}"#;
        let info: PackageInfo = parse_reply(body).unwrap();
        assert_eq!(info.name.as_deref(), Some("RUP Plugin"));
        assert_eq!(info.sections.len(), 2);
        assert!(info.banners.is_empty());
    }

    #[test]
    fn empty_and_malformed_bodies() {
        assert!(matches!(
            parse_reply::<ActivateResponse>(b""),
            Err(LicenseError::EmptyResponse)
        ));
        assert!(matches!(
            parse_reply::<ActivateResponse>(b"  \n"),
            Err(LicenseError::EmptyResponse)
        ));
        assert!(matches!(
            parse_reply::<ActivateResponse>(b"<html>500</html>"),
            Err(LicenseError::EmptyResponse)
        ));
        assert!(matches!(
            parse_reply::<ActivateResponse>(br#"{"activated":true}"#),
            Err(LicenseError::EmptyResponse)
        ));
    }

    #[test]
    fn describe_error_fallbacks() {
        assert_eq!(describe_error(Some("a"), Some("b"), Some("1")), "a");
        assert_eq!(describe_error(None, Some("b"), Some("1")), "b");
        assert_eq!(describe_error(None, None, Some("1")), "License server error 1");
        assert_eq!(describe_error(None, None, None), "License server rejected the request");
    }
}
