//! Persisted license state and its mapping onto store keys.

use crate::clock::Clock;
use crate::identity::ProductId;
use crate::store::OptionStore;
use crate::LicenseError;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Length of a generated instance id.
pub const INSTANCE_ID_LEN: usize = 12;

const ACTIVATED: &str = "Activated";
const DEACTIVATED: &str = "Deactivated";
const CHECKBOX_ON: &str = "on";
const CHECKBOX_OFF: &str = "off";

/// Last confirmed local activation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationStatus {
    /// The server confirmed an activation for this instance.
    Activated,
    /// Anything else.
    #[default]
    Deactivated,
}

impl ActivationStatus {
    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activated => ACTIVATED,
            Self::Deactivated => DEACTIVATED,
        }
    }

    /// Read a stored value. Anything but `"Activated"` is Deactivated.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some(ACTIVATED) => Self::Activated,
            _ => Self::Deactivated,
        }
    }

    /// Shorthand for `== Activated`.
    pub fn is_activated(&self) -> bool {
        matches!(self, Self::Activated)
    }
}

impl fmt::Display for ActivationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed activation, kept for display on the settings page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    /// What went wrong.
    pub message: String,
    /// When it was recorded. Absent for records written by older clients.
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Store keys for one product, all derived from its `data_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateKeys {
    /// Namespace root, e.g. `wc_am_client_64`.
    pub data_key: String,
    /// Entered API key.
    pub api_key: String,
    /// `Activated` / `Deactivated`.
    pub activated: String,
    /// Instance id.
    pub instance: String,
    /// Deactivate checkbox, `on` / `off`.
    pub deactivate_checkbox: String,
    /// JSON [`DiagnosticRecord`] of the last failed activation.
    pub activate_error: String,
    /// Message of the last successful activation.
    pub activate_success: String,
}

impl StateKeys {
    /// Derive every key from `data_key`.
    pub fn new(data_key: impl Into<String>) -> Self {
        let data_key = data_key.into();
        Self {
            api_key: format!("{}_api_key", data_key),
            activated: format!("{}_activated", data_key),
            instance: format!("{}_instance", data_key),
            deactivate_checkbox: format!("{}_deactivate_checkbox", data_key),
            activate_error: format!("{}_activate_error", data_key),
            activate_success: format!("{}_activate_success", data_key),
            data_key,
        }
    }

    fn all(&self) -> [&str; 6] {
        [
            self.api_key.as_str(),
            self.activated.as_str(),
            self.instance.as_str(),
            self.deactivate_checkbox.as_str(),
            self.activate_error.as_str(),
            self.activate_success.as_str(),
        ]
    }
}

/// Snapshot of everything persisted for one product.
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseState {
    /// Resolved product id, if any.
    pub product_id: Option<ProductId>,
    /// Parent product id.
    pub product_parent_id: Option<u64>,
    /// Installation identity on the server; `None` until first generated.
    pub instance_id: Option<String>,
    /// Entered API key; empty when none is configured.
    pub api_key: String,
    /// Last confirmed activation state.
    pub activation_status: ActivationStatus,
    /// Deactivate checkbox: the operator wants the slot released or the
    /// key has not been activated since install.
    pub deactivate_checkbox: bool,
    /// Installed software version.
    pub software_version: String,
    /// Last failed activation.
    pub last_activation_error: Option<DiagnosticRecord>,
    /// Server message of the last successful activation.
    pub last_activation_success: Option<String>,
}

/// Reads and writes [`LicenseState`] fields through an [`OptionStore`].
#[derive(Clone)]
pub struct StateStore {
    store: Arc<dyn OptionStore>,
    keys: StateKeys,
}

impl StateStore {
    /// Bind the store to one product's keys.
    pub fn new(store: Arc<dyn OptionStore>, keys: StateKeys) -> Self {
        Self { store, keys }
    }

    /// Keys in use.
    pub fn keys(&self) -> &StateKeys {
        &self.keys
    }

    /// Load a full snapshot.
    pub fn load(
        &self,
        product_id: Option<ProductId>,
        product_parent_id: Option<u64>,
        software_version: &str,
    ) -> Result<LicenseState, LicenseError> {
        Ok(LicenseState {
            product_id,
            product_parent_id,
            instance_id: self.instance_id()?,
            api_key: self.api_key()?,
            activation_status: self.status()?,
            deactivate_checkbox: self.deactivate_checkbox()?,
            software_version: software_version.to_string(),
            last_activation_error: self.last_error()?,
            last_activation_success: self.store.get(&self.keys.activate_success)?,
        })
    }

    /// Stored API key, empty when none.
    pub fn api_key(&self) -> Result<String, LicenseError> {
        Ok(self.store.get(&self.keys.api_key)?.unwrap_or_default())
    }

    /// Whether an API key record exists at all, even an empty one.
    pub fn has_api_key_record(&self) -> Result<bool, LicenseError> {
        Ok(self.store.get(&self.keys.api_key)?.is_some())
    }

    /// Replace the stored API key.
    pub fn set_api_key(&self, api_key: &str) -> Result<(), LicenseError> {
        self.store.set(&self.keys.api_key, api_key)
    }

    /// Stored activation status.
    pub fn status(&self) -> Result<ActivationStatus, LicenseError> {
        Ok(ActivationStatus::from_stored(
            self.store.get(&self.keys.activated)?.as_deref(),
        ))
    }

    /// Persist the activation status.
    pub fn set_status(&self, status: ActivationStatus) -> Result<(), LicenseError> {
        self.store.set(&self.keys.activated, status.as_str())
    }

    /// Stored instance id, if generated.
    pub fn instance_id(&self) -> Result<Option<String>, LicenseError> {
        Ok(self
            .store
            .get(&self.keys.instance)?
            .filter(|id| !id.is_empty()))
    }

    /// Return the instance id, generating and persisting one if absent.
    /// An existing id is never replaced.
    pub fn ensure_instance_id(&self) -> Result<String, LicenseError> {
        if let Some(id) = self.instance_id()? {
            return Ok(id);
        }
        let id = generate_instance_id();
        self.store.set(&self.keys.instance, &id)?;
        tracing::debug!(instance = %id, "generated instance id");
        Ok(id)
    }

    /// Deactivate checkbox state.
    pub fn deactivate_checkbox(&self) -> Result<bool, LicenseError> {
        Ok(self.store.get(&self.keys.deactivate_checkbox)?.as_deref() == Some(CHECKBOX_ON))
    }

    /// Set the deactivate checkbox.
    pub fn set_deactivate_checkbox(&self, on: bool) -> Result<(), LicenseError> {
        let value = if on { CHECKBOX_ON } else { CHECKBOX_OFF };
        self.store.set(&self.keys.deactivate_checkbox, value)
    }

    /// Last failed activation.
    pub fn last_error(&self) -> Result<Option<DiagnosticRecord>, LicenseError> {
        let Some(raw) = self.store.get(&self.keys.activate_error)? else {
            return Ok(None);
        };
        // Plain strings are accepted as messages without a timestamp.
        Ok(Some(serde_json::from_str(&raw).unwrap_or(DiagnosticRecord {
            message: raw,
            recorded_at: None,
        })))
    }

    /// Record a failed activation.
    pub fn record_error(&self, message: &str, clock: &dyn Clock) -> Result<(), LicenseError> {
        let record = DiagnosticRecord {
            message: message.to_string(),
            recorded_at: Some(clock.now_utc()),
        };
        let json = serde_json::to_string(&record)
            .map_err(|e| LicenseError::Store(format!("Failed to serialize diagnostic: {}", e)))?;
        self.store.set(&self.keys.activate_error, &json)
    }

    /// Drop the failed-activation record.
    pub fn clear_error(&self) -> Result<(), LicenseError> {
        self.store.delete(&self.keys.activate_error)
    }

    /// Message of the last successful activation.
    pub fn last_success(&self) -> Result<Option<String>, LicenseError> {
        self.store.get(&self.keys.activate_success)
    }

    /// Record a successful activation message.
    pub fn record_success(&self, message: &str) -> Result<(), LicenseError> {
        self.store.set(&self.keys.activate_success, message)
    }

    /// Delete every key of this product.
    pub fn purge(&self) -> Result<(), LicenseError> {
        for key in self.keys.all() {
            self.store.delete(key)?;
        }
        Ok(())
    }
}

/// Random alphanumeric instance id.
pub fn generate_instance_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INSTANCE_ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::store::MemoryStore;

    fn state_store() -> (Arc<MemoryStore>, StateStore) {
        let memory = Arc::new(MemoryStore::new());
        let store = StateStore::new(memory.clone(), StateKeys::new("wc_am_client_64"));
        (memory, store)
    }

    #[test]
    fn keys_are_namespaced() {
        let keys = StateKeys::new("wc_am_client_64");
        assert_eq!(keys.activated, "wc_am_client_64_activated");
        assert_eq!(keys.instance, "wc_am_client_64_instance");
        assert_eq!(keys.deactivate_checkbox, "wc_am_client_64_deactivate_checkbox");
        assert_eq!(keys.api_key, "wc_am_client_64_api_key");
    }

    #[test]
    fn fresh_state_is_deactivated_and_empty() {
        let (_, store) = state_store();
        let state = store.load(Some(ProductId::Numeric(64)), None, "1.0.0").unwrap();
        assert_eq!(state.activation_status, ActivationStatus::Deactivated);
        assert!(state.api_key.is_empty());
        assert!(state.instance_id.is_none());
        assert!(!state.deactivate_checkbox);
        assert!(state.last_activation_error.is_none());
    }

    #[test]
    fn status_parsing_is_strict() {
        assert_eq!(ActivationStatus::from_stored(Some("Activated")), ActivationStatus::Activated);
        assert_eq!(ActivationStatus::from_stored(Some("activated")), ActivationStatus::Deactivated);
        assert_eq!(ActivationStatus::from_stored(None), ActivationStatus::Deactivated);
    }

    #[test]
    fn instance_id_is_generated_once() {
        let (_, store) = state_store();
        let first = store.ensure_instance_id().unwrap();
        let second = store.ensure_instance_id().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), INSTANCE_ID_LEN);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn error_record_roundtrip_and_legacy_string() {
        let (memory, store) = state_store();
        let clock = MockClock::from_rfc3339("2025-01-15T12:00:00Z");

        store.record_error("Connection refused", &clock).unwrap();
        let record = store.last_error().unwrap().unwrap();
        assert_eq!(record.message, "Connection refused");
        assert_eq!(record.recorded_at, Some(clock.now_utc()));

        memory.set("wc_am_client_64_activate_error", "Error code: 500").unwrap();
        let legacy = store.last_error().unwrap().unwrap();
        assert_eq!(legacy.message, "Error code: 500");
        assert!(legacy.recorded_at.is_none());

        store.clear_error().unwrap();
        assert!(store.last_error().unwrap().is_none());
    }

    #[test]
    fn purge_removes_everything() {
        let (memory, store) = state_store();
        let clock = MockClock::from_rfc3339("2025-01-15T12:00:00Z");
        store.set_api_key("KEY").unwrap();
        store.set_status(ActivationStatus::Activated).unwrap();
        store.ensure_instance_id().unwrap();
        store.set_deactivate_checkbox(true).unwrap();
        store.record_error("x", &clock).unwrap();
        store.record_success("ok").unwrap();
        memory.set("unrelated", "kept").unwrap();

        store.purge().unwrap();

        assert_eq!(memory.len(), 1);
        assert_eq!(store.status().unwrap(), ActivationStatus::Deactivated);
    }
}
