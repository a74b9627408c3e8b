//! Key-value persistence for license state.
//!
//! The host owns storage; the client only needs get/set/delete on string
//! keys. No transactions are assumed, only read-after-write on one key.

pub mod file;
pub mod memory;

use crate::LicenseError;

/// Persistent key-value store provided by the host.
pub trait OptionStore: Send + Sync {
    /// Read a value; `Ok(None)` when the key was never written or was deleted.
    fn get(&self, key: &str) -> Result<Option<String>, LicenseError>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), LicenseError>;

    /// Remove a key. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), LicenseError>;
}

pub use file::FileStore;
pub use memory::MemoryStore;
