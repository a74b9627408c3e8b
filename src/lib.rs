//! # wcam-client
//!
//! **License activation and update client for the WooCommerce API Manager.**
//!
//! Distributed software uses this crate to tie one installation to a
//! customer's API key on the vendor's store, to ask whether that activation
//! is still live, and to learn about newer releases.
//!
//! ## Features
//!
//! - **Activation lifecycle** - activate, deactivate, switch keys; the old
//!   key's slot is released before a new key is activated
//! - **Conservative local state** - the product only reads as Activated
//!   after the server confirmed it
//! - **Per-request status memo** - live status costs at most one round trip
//!   per host request
//! - **Update offers** - semver comparison against the installed version
//! - **Lenient decoding** - tolerates the loose typing of PHP JSON output
//!
//! ## Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//! use wcam_client::{ClientConfig, FileStore, LicenseClient, ProductId, ProductKind};
//!
//! fn main() -> Result<(), wcam_client::LicenseError> {
//!     let config = ClientConfig {
//!         product_id: Some(ProductId::Numeric(64)),
//!         product_parent_id: None,
//!         software_version: "1.2.0".to_string(),
//!         kind: ProductKind::Plugin,
//!         api_url: "https://store.example.com".to_string(),
//!         site_url: "https://blog.example.org".to_string(),
//!         main_file: "my-plugin/my-plugin.php".to_string(),
//!         software_title: "My Plugin".to_string(),
//!         text_domain: "my-plugin".to_string(),
//!         timeout: wcam_client::config::DEFAULT_TIMEOUT,
//!     };
//!
//!     let store = Arc::new(FileStore::new("my-plugin")?);
//!     let client = LicenseClient::new(config, store)?;
//!     client.on_install()?;
//!
//!     let outcome = client.activate("API-KEY-HERE")?;
//!     println!("{}", outcome.message);
//!
//!     if let Some(package) = client.check_installed_for_update().available {
//!         println!("update available: {:?}", package.new_version);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Host integration
//!
//! The host supplies persistence ([`OptionStore`]) and may supply its own
//! HTTP layer ([`HttpTransport`]). It calls the lifecycle methods at the
//! matching moments:
//!
//! - [`LicenseClient::on_install`] when the software is installed
//! - [`LicenseClient::save_settings`] when the settings form is submitted
//! - [`LicenseClient::begin_request`] at the start of each host request
//! - [`LicenseClient::uninstall`] when the software is removed
//!
//! Client-side licensing can always be bypassed by someone who controls the
//! installation; this crate does not try to prevent that.

#![warn(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;
pub mod identity;

// Protocol layer
pub mod protocol;

// Client layer
pub mod client;

// Persistence
pub mod state;
pub mod store;

// Updates
pub mod update;

// Manager (main public API)
pub mod manager;

// Re-exports for public API
pub use client::http::{HttpTransport, RawResponse, ReqwestTransport};
pub use clock::{Clock, SystemClock};
pub use config::ClientConfig;
pub use errors::LicenseError;
pub use identity::{ProductId, ProductKind};
pub use manager::{
    ActivationDetails, ActivationOutcome, DeactivationOutcome, LicenseClient, SettingsInput,
};
pub use state::{ActivationStatus, DiagnosticRecord, LicenseState};
pub use store::{FileStore, MemoryStore, OptionStore};
pub use update::{PackageInfo, UpdateCheck, UpdatePackage};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
