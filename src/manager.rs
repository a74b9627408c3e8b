//! License client - the main public API.
//!
//! `LicenseClient` drives the activation lifecycle of one product on one
//! installation:
//! - activate / deactivate an API key against the store's license API
//! - live and stored status, with a per-request status memo
//! - update and package-information queries
//!
//! The host owns storage ([`OptionStore`]) and may supply its own HTTP
//! transport ([`HttpTransport`]). Lifecycle points (install, settings save,
//! start of a request, uninstall) are plain methods the host calls.

use crate::client::http::{HttpTransport, RawResponse, ReqwestTransport};
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::identity::{
    key_fingerprint, normalize_key, site_object, ProductId, SoftwareNames, DATA_KEY_PREFIX,
    PRODUCT_ID_KEY_PREFIX,
};
use crate::protocol::models::{
    parse_reply, ActivateResponse, DeactivateResponse, PackageInfo, StatusResponse,
    UpdateResponse,
};
use crate::protocol::request::{Action, ApiRequest};
use crate::state::{ActivationStatus, LicenseState, StateKeys, StateStore};
use crate::store::OptionStore;
use crate::update::{self, UpdateCheck};
use crate::LicenseError;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};

/// Successful activation.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationOutcome {
    /// Server message, e.g. "1 out of 5 activations remaining".
    pub message: String,
    /// Activations bought with this key.
    pub total_activations_purchased: Option<u64>,
    /// Activations in use, including this one.
    pub total_activations: Option<u64>,
    /// Activations left.
    pub activations_remaining: Option<u64>,
}

/// Successful deactivation.
#[derive(Debug, Clone, PartialEq)]
pub struct DeactivationOutcome {
    /// Activations left after releasing this one.
    pub activations_remaining: Option<u64>,
    /// Server message.
    pub message: Option<String>,
}

/// Activation counters from a live status check.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationDetails {
    /// Server says this instance is activated.
    pub activated: bool,
    /// `"active"` / `"inactive"`.
    pub status_check: Option<String>,
    /// Activations bought with this key.
    pub total_activations_purchased: Option<u64>,
    /// Activations in use.
    pub total_activations: Option<u64>,
    /// Activations left.
    pub activations_remaining: Option<u64>,
    /// Error text when the status request was refused.
    pub error: Option<String>,
}

/// Values submitted from the settings form.
#[derive(Debug, Clone, Default)]
pub struct SettingsInput {
    /// API key field.
    pub api_key: String,
    /// Product id field, shown only when the host did not configure one.
    pub product_id: Option<u64>,
}

/// Raw status body memoized for the current request.
#[derive(Debug, Clone)]
pub struct CachedStatus {
    /// Response body; empty when the request failed or was not sent.
    pub raw: String,
    /// When the body was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl CachedStatus {
    fn decode(&self) -> Option<StatusResponse> {
        parse_reply(self.raw.as_bytes()).ok()
    }
}

/// License client for one product.
///
/// Create one per product and reuse it. Construction performs no I/O
/// beyond reading the operator-entered product id from the store.
pub struct LicenseClient {
    config: ClientConfig,
    clock: Arc<dyn Clock>,
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn OptionStore>,
    state: StateStore,
    names: SoftwareNames,
    site: String,
    product_id: Mutex<Option<ProductId>>,
    /// Store key of the operator-entered product id; `None` when the host
    /// supplied one.
    operator_product_key: Option<String>,
    status_cache: Mutex<Option<CachedStatus>>,
}

impl LicenseClient {
    /// Create a client using the default reqwest transport.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Configuration validation fails
    /// - HTTP client creation fails
    /// - The store cannot be read
    pub fn new(config: ClientConfig, store: Arc<dyn OptionStore>) -> Result<Self, LicenseError> {
        config.validate()?;
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Self::build(config, store, transport, Arc::new(SystemClock))
    }

    /// Create a client with a host-supplied transport.
    pub fn with_transport(
        config: ClientConfig,
        store: Arc<dyn OptionStore>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, LicenseError> {
        config.validate()?;
        Self::build(config, store, transport, Arc::new(SystemClock))
    }

    /// Create a client with a custom clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn new_with_clock(
        config: ClientConfig,
        store: Arc<dyn OptionStore>,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LicenseError> {
        config.validate()?;
        Self::build(config, store, transport, clock)
    }

    fn build(
        config: ClientConfig,
        store: Arc<dyn OptionStore>,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LicenseError> {
        let names = SoftwareNames::derive(&config.main_file, config.kind)?;

        // Explicit id > operator-entered id > none. Without an explicit id
        // the storage namespace comes from the directory name so it stays
        // stable whatever the operator enters later.
        let (product_id, data_key, operator_product_key) = match &config.product_id {
            Some(id) => (
                Some(id.clone()),
                format!("{}{}", DATA_KEY_PREFIX, normalize_key(&id.to_string())),
                None,
            ),
            None => {
                let identifier = normalize_key(&names.slug);
                let operator_key = format!("{}{}", PRODUCT_ID_KEY_PREFIX, identifier);
                let chosen = store
                    .get(&operator_key)?
                    .and_then(|raw| ProductId::parse(&raw));
                (
                    chosen,
                    format!("{}{}", DATA_KEY_PREFIX, identifier),
                    Some(operator_key),
                )
            }
        };

        let state = StateStore::new(store.clone(), StateKeys::new(data_key));
        let site = site_object(&config.site_url);

        Ok(Self {
            config,
            clock,
            transport,
            store,
            state,
            names,
            site,
            product_id: Mutex::new(product_id),
            operator_product_key,
            status_cache: Mutex::new(None),
        })
    }

    /// Install hook: seed default state.
    ///
    /// On a fresh install (no key record or no instance id) this generates
    /// the instance id, ticks the deactivate checkbox and marks the product
    /// Deactivated. An existing instance id is kept.
    pub fn on_install(&self) -> Result<(), LicenseError> {
        let fresh = !self.state.has_api_key_record()? || self.state.instance_id()?.is_none();
        if fresh {
            self.state.ensure_instance_id()?;
            self.state.set_deactivate_checkbox(true)?;
            self.state.set_status(ActivationStatus::Deactivated)?;
            tracing::debug!(data_key = %self.data_key(), "seeded license state");
        }
        Ok(())
    }

    /// Start of a host request: forget the memoized status.
    pub fn begin_request(&self) {
        *lock(&self.status_cache) = None;
    }

    /// Settings form submission.
    ///
    /// Adopts an operator-entered product id when the host did not
    /// configure one, then activates the key if local status is
    /// Deactivated, the deactivate checkbox is on, or the key changed.
    /// Returns `Ok(None)` when the submitted key is already active.
    pub fn save_settings(
        &self,
        input: &SettingsInput,
    ) -> Result<Option<ActivationOutcome>, LicenseError> {
        if let (Some(key), Some(id)) = (&self.operator_product_key, input.product_id) {
            if id > 0 {
                self.store.set(key, &id.to_string())?;
                *lock(&self.product_id) = Some(ProductId::Numeric(id));
            }
        }

        let api_key = input.api_key.trim();
        let current = self.state.api_key()?;
        let status = self.state.status()?;

        if api_key.is_empty() {
            if !current.is_empty() && status.is_activated() {
                self.release_previous_key(&current);
            }
            // No key, no activation.
            self.state.set_api_key("")?;
            self.state.set_status(ActivationStatus::Deactivated)?;
            self.begin_request();
            return Err(LicenseError::ConfigurationMissing(
                "api_key cannot be empty".to_string(),
            ));
        }

        let needs_activation = !status.is_activated()
            || self.state.deactivate_checkbox()?
            || current != api_key;

        if !needs_activation {
            return Ok(None);
        }

        self.activate(api_key).map(Some)
    }

    /// Uninstall hook.
    ///
    /// Releases the activation slot when possible, then deletes every
    /// stored value for this product. Local state ends up Deactivated even
    /// if the server could not be reached.
    pub fn uninstall(&self) -> Result<(), LicenseError> {
        let api_key = self.state.api_key()?;
        if !api_key.is_empty() && self.state.status()?.is_activated() {
            self.release_previous_key(&api_key);
        }

        self.state.purge()?;
        if let Some(key) = &self.operator_product_key {
            self.store.delete(key)?;
            *lock(&self.product_id) = None;
        }
        self.begin_request();

        tracing::info!(data_key = %self.data_key(), "license state removed");
        Ok(())
    }

    /// Activate `api_key` for this installation.
    ///
    /// A different key that is currently Activated is deactivated first,
    /// best effort. Every call performs a full round trip; the server decides
    /// whether another activation slot is consumed.
    ///
    /// # Errors
    /// - `ConfigurationMissing` - empty key or no product id (no request sent)
    /// - `Transport` - network failure or non-200 status
    /// - `EmptyResponse` - empty or unreadable body
    /// - `Rejected` - the server refused, with its message
    ///
    /// On every failure the product is marked Deactivated and a diagnostic
    /// is recorded.
    pub fn activate(&self, api_key: &str) -> Result<ActivationOutcome, LicenseError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(LicenseError::ConfigurationMissing(
                "api_key cannot be empty".to_string(),
            ));
        }
        let product_id = self.require_product_id()?;

        let previous = self.state.api_key()?;
        if !previous.is_empty() && previous != api_key && self.state.status()?.is_activated() {
            self.release_previous_key(&previous);
        }

        let instance = self.state.ensure_instance_id()?;
        self.state.set_api_key(api_key)?;
        self.begin_request();

        let request = ApiRequest::new(Action::Activate)
            .param("product_id", &product_id)
            .opt_param("product_parent_id", self.config.product_parent_id)
            .param("instance", &instance)
            .param("object", &self.site)
            .param("software_version", &self.config.software_version)
            .param("api_key", api_key);

        let reply = match self
            .send(&request)
            .and_then(|raw| parse_reply::<ActivateResponse>(&raw.body))
        {
            Ok(reply) => reply,
            Err(e) => {
                self.record_activation_failure(api_key, &e.to_string());
                return Err(e);
            }
        };

        if reply.is_confirmed() {
            let message = reply
                .message
                .clone()
                .unwrap_or_else(|| format!("{} activated", self.config.software_title));

            self.state.set_status(ActivationStatus::Activated)?;
            self.state.set_deactivate_checkbox(false)?;
            self.state.record_success(&message)?;
            self.state.clear_error()?;

            tracing::info!(
                product = %product_id,
                key = %key_fingerprint(api_key),
                "API key activated"
            );

            return Ok(ActivationOutcome {
                message,
                total_activations_purchased: reply.data.total_activations_purchased,
                total_activations: reply.data.total_activations,
                activations_remaining: reply.data.activations_remaining,
            });
        }

        let message = reply
            .data
            .error_text()
            .or(reply.message)
            .unwrap_or_else(|| "The license server did not confirm the activation".to_string());
        self.record_activation_failure(api_key, &message);
        Err(LicenseError::Rejected(message))
    }

    /// Deactivate `api_key` on the server.
    ///
    /// Only valid while Activated with the same key stored. Local state
    /// changes only after the server confirms; failures leave it untouched.
    pub fn deactivate(&self, api_key: &str) -> Result<DeactivationOutcome, LicenseError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(LicenseError::ConfigurationMissing(
                "api_key cannot be empty".to_string(),
            ));
        }
        if !self.state.status()?.is_activated() || self.state.api_key()? != api_key {
            return Err(LicenseError::NotActivated);
        }

        let reply = self.send_deactivate(api_key)?;
        if !reply.is_confirmed() {
            let message = reply
                .data
                .error_text()
                .or(reply.message)
                .unwrap_or_else(|| {
                    "The license server did not confirm the deactivation".to_string()
                });
            tracing::warn!(key = %key_fingerprint(api_key), error = %message, "deactivation refused");
            return Err(LicenseError::Rejected(message));
        }

        self.state.set_status(ActivationStatus::Deactivated)?;
        self.state.set_deactivate_checkbox(false)?;
        self.begin_request();

        tracing::info!(key = %key_fingerprint(api_key), "API key deactivated");
        Ok(DeactivationOutcome {
            activations_remaining: reply
                .activations_remaining
                .or(reply.data.activations_remaining),
            message: reply.message,
        })
    }

    /// Deactivate whatever key is stored (the deactivate checkbox path).
    pub fn deactivate_current(&self) -> Result<DeactivationOutcome, LicenseError> {
        let api_key = self.state.api_key()?;
        self.deactivate(&api_key)
    }

    /// Activation status.
    ///
    /// `live = false` reads the stored status without network I/O.
    /// `live = true` asks the server once per request (see
    /// [`begin_request`](Self::begin_request)); any failure reads as
    /// Deactivated. A live result is never written back.
    pub fn status(&self, live: bool) -> ActivationStatus {
        if !live {
            return self.state.status().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "cannot read stored activation status");
                ActivationStatus::Deactivated
            });
        }

        match self.live_status() {
            Some(reply) if reply.is_activated() => ActivationStatus::Activated,
            _ => ActivationStatus::Deactivated,
        }
    }

    /// Activation counters from the live status.
    pub fn activation_details(&self) -> Option<ActivationDetails> {
        let reply = self.live_status()?;
        let error = if reply.success {
            None
        } else {
            reply.data.error_text()
        };
        Some(ActivationDetails {
            activated: reply.is_activated(),
            status_check: reply.status_check,
            total_activations_purchased: reply.data.total_activations_purchased,
            total_activations: reply.data.total_activations,
            activations_remaining: reply.data.activations_remaining,
            error,
        })
    }

    /// Memoized status body, if any.
    pub fn cached_status(&self) -> Option<CachedStatus> {
        lock(&self.status_cache).clone()
    }

    fn live_status(&self) -> Option<StatusResponse> {
        let mut cache = lock(&self.status_cache);
        if let Some(cached) = cache.as_ref() {
            tracing::trace!(
                age_ms = self.clock.since(cached.fetched_at).num_milliseconds(),
                "reusing memoized status"
            );
            return cached.decode();
        }

        let raw = match self.fetch_status() {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "live status check failed");
                String::new()
            }
        };
        let cached = CachedStatus {
            raw,
            fetched_at: self.clock.now_utc(),
        };
        let decoded = cached.decode();
        *cache = Some(cached);
        decoded
    }

    fn fetch_status(&self) -> Result<String, LicenseError> {
        let api_key = self.state.api_key()?;
        if api_key.is_empty() {
            return Ok(String::new());
        }

        let request = ApiRequest::new(Action::Status)
            .param("api_key", &api_key)
            .opt_param("product_id", self.product_id())
            .opt_param("product_parent_id", self.config.product_parent_id)
            .opt_param("instance", self.state.instance_id()?)
            .param("object", &self.site);

        let raw = self.send(&request)?;
        Ok(raw.body_str()?.to_string())
    }

    /// Ask the server for a package newer than `current_version`.
    ///
    /// Never fails: problems come back as [`UpdateCheck::diagnostic`].
    pub fn check_for_update(&self, current_version: &str) -> UpdateCheck {
        let reply = self
            .update_request(current_version)
            .and_then(|request| self.send(&request))
            .and_then(|raw| parse_reply::<UpdateResponse>(&raw.body));

        let check = update::evaluate(reply, current_version);
        if let Some(diagnostic) = &check.diagnostic {
            tracing::warn!(slug = %self.names.slug, %diagnostic, "update check");
        }
        if let Some(package) = &check.available {
            tracing::info!(
                slug = %self.names.slug,
                new_version = package.new_version.as_deref().unwrap_or_default(),
                "update available"
            );
        }
        check
    }

    /// Update check against the installed version.
    pub fn check_installed_for_update(&self) -> UpdateCheck {
        self.check_for_update(&self.config.software_version)
    }

    fn update_request(&self, current_version: &str) -> Result<ApiRequest, LicenseError> {
        Ok(ApiRequest::new(Action::Update)
            .param("slug", &self.names.slug)
            .param("plugin_name", &self.names.plugin_name)
            .param("version", current_version)
            .opt_param("product_id", self.product_id())
            .opt_param("product_parent_id", self.config.product_parent_id)
            .param("api_key", self.state.api_key()?)
            .opt_param("instance", self.state.instance_id()?))
    }

    /// Details for the "view details" dialog.
    ///
    /// Answers only for this client's own slug; `None` on any failure.
    pub fn fetch_package_info(&self, slug: &str) -> Option<PackageInfo> {
        if slug != self.names.slug {
            return None;
        }

        let result = self
            .info_request()
            .and_then(|request| self.send(&request))
            .and_then(|raw| parse_reply::<PackageInfo>(&raw.body));

        match result {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(slug, error = %e, "package information request failed");
                None
            }
        }
    }

    fn info_request(&self) -> Result<ApiRequest, LicenseError> {
        Ok(ApiRequest::new(Action::PluginInformation)
            .param("plugin_name", &self.names.plugin_name)
            .param("version", &self.config.software_version)
            .opt_param("product_id", self.product_id())
            .opt_param("product_parent_id", self.config.product_parent_id)
            .param("api_key", self.state.api_key()?)
            .opt_param("instance", self.state.instance_id()?)
            .param("object", &self.site))
    }

    /// Whether the host may auto-update the item with `item_slug`.
    ///
    /// `None` for other products (the host keeps its own decision).
    /// `false` when host auto-updates are disabled or the license is not
    /// Activated both locally and live.
    pub fn auto_update_decision(&self, item_slug: &str, host_updates_disabled: bool) -> Option<bool> {
        if item_slug != self.names.slug {
            return None;
        }
        if host_updates_disabled {
            return Some(false);
        }
        Some(self.status(false).is_activated() && self.status(true).is_activated())
    }

    /// Stored status is Activated.
    pub fn is_activated(&self) -> bool {
        self.status(false).is_activated()
    }

    /// Message of the last failed activation.
    pub fn last_error(&self) -> Option<String> {
        self.state
            .last_error()
            .ok()
            .flatten()
            .map(|record| record.message)
    }

    /// Server message of the last successful activation.
    pub fn last_success_message(&self) -> Option<String> {
        self.state.last_success().ok().flatten()
    }

    /// Snapshot of the persisted state.
    pub fn state(&self) -> Result<LicenseState, LicenseError> {
        self.state.load(
            self.product_id(),
            self.config.product_parent_id,
            &self.config.software_version,
        )
    }

    /// Resolved product id.
    pub fn product_id(&self) -> Option<ProductId> {
        lock(&self.product_id).clone()
    }

    /// Storage namespace, e.g. `wc_am_client_64`.
    pub fn data_key(&self) -> &str {
        &self.state.keys().data_key
    }

    /// Update slug (directory name).
    pub fn slug(&self) -> &str {
        &self.names.slug
    }

    /// Name the host knows the software by.
    pub fn plugin_name(&self) -> &str {
        &self.names.plugin_name
    }

    /// Site identifier sent as `object`.
    pub fn site_object(&self) -> &str {
        &self.site
    }

    /// Where the operator renews an expired key.
    pub fn renew_license_url(&self) -> String {
        format!("{}/my-account", self.config.api_url.trim().trim_end_matches('/'))
    }

    /// Get the current configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn require_product_id(&self) -> Result<ProductId, LicenseError> {
        self.product_id().ok_or_else(|| {
            LicenseError::ConfigurationMissing(
                "product_id was neither configured nor entered".to_string(),
            )
        })
    }

    /// POST `request`; anything but HTTP 200 is a transport failure.
    fn send(&self, request: &ApiRequest) -> Result<RawResponse, LicenseError> {
        let url = request.to_url(&self.config.api_url)?;
        tracing::debug!(action = request.action().as_str(), "license API request");

        let raw = self.transport.post(&url, self.config.timeout)?;
        if !raw.is_ok() {
            return Err(LicenseError::Transport(format!(
                "License server answered HTTP {}",
                raw.status
            )));
        }
        Ok(raw)
    }

    fn send_deactivate(&self, api_key: &str) -> Result<DeactivateResponse, LicenseError> {
        let request = ApiRequest::new(Action::Deactivate)
            .param("product_id", self.require_product_id()?)
            .opt_param("product_parent_id", self.config.product_parent_id)
            .opt_param("instance", self.state.instance_id()?)
            .param("object", &self.site)
            .param("api_key", api_key);

        let raw = self.send(&request)?;
        parse_reply(&raw.body)
    }

    /// Best-effort release of a key that is being replaced or removed.
    ///
    /// A confirmed release is persisted as Deactivated.
    fn release_previous_key(&self, api_key: &str) {
        match self.send_deactivate(api_key) {
            Ok(reply) if reply.is_confirmed() => {
                tracing::info!(key = %key_fingerprint(api_key), "previous API key deactivated");
                if let Err(e) = self
                    .state
                    .set_status(ActivationStatus::Deactivated)
                    .and_then(|()| self.state.set_deactivate_checkbox(false))
                {
                    tracing::warn!(error = %e, "cannot persist released key status");
                }
                self.begin_request();
            }
            Ok(reply) => {
                tracing::warn!(
                    key = %key_fingerprint(api_key),
                    error = %reply.data.error_text().unwrap_or_default(),
                    "previous API key was not deactivated"
                );
            }
            Err(e) => {
                tracing::warn!(
                    key = %key_fingerprint(api_key),
                    error = %e,
                    "previous API key could not be deactivated"
                );
            }
        }
    }

    /// Mark Deactivated and keep the message for the settings page.
    /// Store failures here are logged so the caller sees the original error.
    fn record_activation_failure(&self, api_key: &str, message: &str) {
        tracing::warn!(key = %key_fingerprint(api_key), error = %message, "activation failed");

        if let Err(e) = self.state.set_status(ActivationStatus::Deactivated) {
            tracing::warn!(error = %e, "cannot persist activation status");
        }
        if let Err(e) = self.state.record_error(message, self.clock.as_ref()) {
            tracing::warn!(error = %e, "cannot persist activation error");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
