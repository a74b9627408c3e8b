//! Update offers.
//!
//! Update checks run opportunistically, so nothing here fails: every problem
//! becomes "no update" plus an optional diagnostic.

pub mod version;

pub use crate::protocol::models::{PackageInfo, UpdatePackage};

use crate::protocol::models::UpdateResponse;
use crate::LicenseError;

/// Result of an update check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateCheck {
    /// Package strictly newer than the installed version, if any.
    pub available: Option<UpdatePackage>,
    /// Message worth showing the operator (server error, bad version...).
    pub diagnostic: Option<String>,
}

impl UpdateCheck {
    /// No update and nothing to report.
    pub fn none() -> Self {
        Self::default()
    }

    /// No update, with a reason.
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            available: None,
            diagnostic: Some(diagnostic.into()),
        }
    }
}

/// Decide what an `update` reply offers relative to `current_version`.
pub fn evaluate(reply: Result<UpdateResponse, LicenseError>, current_version: &str) -> UpdateCheck {
    let reply = match reply {
        Ok(reply) => reply,
        Err(LicenseError::EmptyResponse) => return UpdateCheck::none(),
        Err(e) => return UpdateCheck::failed(e.to_string()),
    };

    let diagnostic = reply.error_text();
    if !reply.success {
        return UpdateCheck {
            available: None,
            diagnostic,
        };
    }

    let Some(package) = reply.data.package else {
        return UpdateCheck {
            available: None,
            diagnostic,
        };
    };

    let Some(new_version) = package.new_version.as_deref() else {
        return UpdateCheck::failed("Update package has no version");
    };

    match version::is_newer(new_version, current_version) {
        Ok(true) => UpdateCheck {
            available: Some(package),
            diagnostic,
        },
        Ok(false) => UpdateCheck {
            available: None,
            diagnostic,
        },
        Err(e) => UpdateCheck::failed(format!(
            "Cannot compare versions {:?} and {:?}: {}",
            new_version, current_version, e
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::models::parse_reply;

    fn reply_with(new_version: &str) -> Result<UpdateResponse, LicenseError> {
        let body = format!(
            r#"{{"success":true,"data":{{"package":{{"slug":"rup-plugin","new_version":"{}","package":"https://store.example.com/dl.zip"}}}}}}"#,
            new_version
        );
        parse_reply(body.as_bytes())
    }

    #[test]
    fn newer_package_is_offered() {
        let check = evaluate(reply_with("1.3.0"), "1.2.0");
        let package = check.available.unwrap();
        assert_eq!(package.new_version.as_deref(), Some("1.3.0"));
        assert!(check.diagnostic.is_none());
    }

    #[test]
    fn same_version_is_not_offered() {
        assert!(evaluate(reply_with("1.3.0"), "1.3.0").available.is_none());
    }

    #[test]
    fn older_version_is_not_offered() {
        assert!(evaluate(reply_with("1.9.9"), "2.0.0").available.is_none());
    }

    #[test]
    fn server_error_is_surfaced() {
        let reply = parse_reply(
            br#"{"success":false,"data":{"error_code":"100","error":"The API Key is invalid"}}"#,
        );
        let check = evaluate(reply, "1.0.0");
        assert!(check.available.is_none());
        assert_eq!(check.diagnostic.as_deref(), Some("The API Key is invalid"));
    }

    #[test]
    fn error_without_success_flag_is_surfaced() {
        let reply = parse_reply(
            br#"{"data":{"error_code":"101","error":"The API Key has expired"}}"#,
        );
        let check = evaluate(reply, "1.0.0");
        assert!(check.available.is_none());
        assert_eq!(check.diagnostic.as_deref(), Some("The API Key has expired"));
    }

    #[test]
    fn unparseable_version_degrades() {
        let check = evaluate(reply_with("next"), "1.0.0");
        assert!(check.available.is_none());
        assert!(check.diagnostic.unwrap().contains("Cannot compare versions"));
    }

    #[test]
    fn transport_failure_degrades() {
        let check = evaluate(Err(LicenseError::Transport("timed out".into())), "1.0.0");
        assert!(check.available.is_none());
        assert!(check.diagnostic.unwrap().contains("timed out"));
    }

    #[test]
    fn empty_body_is_silent() {
        assert_eq!(evaluate(Err(LicenseError::EmptyResponse), "1.0.0"), UpdateCheck::none());
    }

    #[test]
    fn success_without_package() {
        let check = evaluate(parse_reply(br#"{"success":true,"data":[]}"#), "1.0.0");
        assert_eq!(check, UpdateCheck::none());
    }
}
