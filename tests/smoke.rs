//! Basic smoke test: public API surface and offline behavior.

use std::sync::Arc;
use wcam_client::{
    ActivationStatus, ClientConfig, LicenseClient, LicenseError, MemoryStore, ProductId,
    ProductKind,
};

fn config() -> ClientConfig {
    ClientConfig {
        product_id: Some(ProductId::Numeric(64)),
        product_parent_id: None,
        software_version: "1.0.0".to_string(),
        kind: ProductKind::Theme,
        api_url: "https://store.example.com".to_string(),
        site_url: "http://localhost:8080".to_string(),
        main_file: "storefront-child/style.css".to_string(),
        software_title: "Storefront Child".to_string(),
        text_domain: "storefront-child".to_string(),
        timeout: wcam_client::config::DEFAULT_TIMEOUT,
    }
}

#[test]
fn client_builds_without_network() {
    let client = LicenseClient::new(config(), Arc::new(MemoryStore::new())).unwrap();

    assert_eq!(client.slug(), "storefront-child");
    assert_eq!(client.plugin_name(), "storefront-child");
    assert_eq!(client.site_object(), "localhost:8080");
    assert_eq!(client.status(false), ActivationStatus::Deactivated);
    assert!(client.last_error().is_none());
}

#[test]
fn empty_key_is_refused_before_any_request() {
    let client = LicenseClient::new(config(), Arc::new(MemoryStore::new())).unwrap();
    assert!(matches!(
        client.activate(""),
        Err(LicenseError::ConfigurationMissing(_))
    ));
}
