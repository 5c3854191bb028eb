//! Server configuration

use di_core::{DI_NAMESPACE_URI, DiError, DiResult, OPC_UA_NAMESPACE_URI};
use di_model::locking::DEFAULT_LEASE;
use di_model::software_update::DEFAULT_CONFIRMATION_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server configuration
///
/// Every field has a default, so a JSON file only needs to name what it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// URI identifying this server application
    pub application_uri: String,
    /// Namespace in which instance node ids are allocated
    pub namespace_uri: String,
    /// Lease of a lock taken with InitLock, in milliseconds
    pub lock_lease_ms: u64,
    /// Time a client has to confirm an installed update, in milliseconds
    pub confirmation_timeout_ms: u64,
    /// Buffer size of the address space change channel
    pub change_channel_capacity: usize,
    /// DI model document to load instead of the built-in one
    pub model_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            application_uri: "urn:opcua-di:server".to_string(),
            namespace_uri: "urn:opcua-di:instances".to_string(),
            lock_lease_ms: DEFAULT_LEASE.as_millis() as u64,
            confirmation_timeout_ms: DEFAULT_CONFIRMATION_TIMEOUT.as_millis() as u64,
            change_channel_capacity: 256,
            model_path: None,
        }
    }
}

impl ServerConfig {
    /// Read a configuration from a JSON file
    ///
    /// # Errors
    /// Returns `DiError::Io` or `DiError::Json` if the file cannot be read or
    /// parsed, `DiError::InvalidData` if a value is out of range
    pub fn from_path(path: impl AsRef<Path>) -> DiResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        log::info!("Loaded server configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Check that every value is usable
    pub fn validate(&self) -> DiResult<()> {
        if self.lock_lease_ms == 0 {
            return Err(DiError::InvalidData("lock_lease_ms must be positive".to_string()));
        }
        if self.confirmation_timeout_ms == 0 {
            return Err(DiError::InvalidData(
                "confirmation_timeout_ms must be positive".to_string(),
            ));
        }
        if self.change_channel_capacity == 0 {
            return Err(DiError::InvalidData(
                "change_channel_capacity must be positive".to_string(),
            ));
        }
        if self.namespace_uri.is_empty() {
            return Err(DiError::InvalidData("namespace_uri must not be empty".to_string()));
        }
        if [OPC_UA_NAMESPACE_URI, DI_NAMESPACE_URI].contains(&self.namespace_uri.as_str()) {
            return Err(DiError::InvalidData(format!(
                "namespace_uri {} is reserved for the type model",
                self.namespace_uri
            )));
        }
        Ok(())
    }

    pub fn lock_lease(&self) -> Duration {
        Duration::from_millis(self.lock_lease_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }
}
