pub mod commands;

use crate::error::{AppError, AppResult};
use dashmap::DashMap;
use keyring::Entry;

const SERVICE_NAME: &str = "sshdeck";

/// Opaque per-host secret gateway.
///
/// Implementations are keyed by host identifier only; callers never see
/// how or where the secret is kept.
pub trait CredentialStore: Send + Sync {
    /// Fetch the secret for a host, `None` if nothing is stored
    fn get(&self, host_id: &str) -> AppResult<Option<String>>;

    fn set(&self, host_id: &str, secret: &str) -> AppResult<()>;

    /// Remove the secret; removing a missing entry is not an error
    fn delete(&self, host_id: &str) -> AppResult<()>;

    /// Fetch a secret and treat an empty value as missing
    fn get_non_empty(&self, host_id: &str) -> AppResult<Option<String>> {
        Ok(self.get(host_id)?.filter(|secret| !secret.is_empty()))
    }
}

/// OS keychain backed store
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    /// Store under a different keychain service name
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, host_id: &str) -> AppResult<Entry> {
        let key = commands::password_key(host_id)?;
        Ok(Entry::new(&self.service, &key)?)
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self, host_id: &str) -> AppResult<Option<String>> {
        match self.entry(host_id)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AppError::from(e)),
        }
    }

    fn set(&self, host_id: &str, secret: &str) -> AppResult<()> {
        self.entry(host_id)?.set_password(secret)?;
        tracing::debug!("Stored password for host {}", host_id);
        Ok(())
    }

    fn delete(&self, host_id: &str) -> AppResult<()> {
        match self.entry(host_id)?.delete_password() {
            Ok(()) => {
                tracing::debug!("Deleted password for host {}", host_id);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AppError::from(e)),
        }
    }
}

/// Process-local store, used for tests and one-shot sessions
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    secrets: DashMap<String, String>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `(host_id, secret)` pairs
    pub fn with_secrets<I, K, V>(secrets: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        for (host_id, secret) in secrets {
            store.secrets.insert(host_id.into(), secret.into());
        }
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, host_id: &str) -> AppResult<Option<String>> {
        Ok(self.secrets.get(host_id).map(|s| s.value().clone()))
    }

    fn set(&self, host_id: &str, secret: &str) -> AppResult<()> {
        commands::validate_host_id(host_id)?;
        self.secrets.insert(host_id.to_string(), secret.to_string());
        Ok(())
    }

    fn delete(&self, host_id: &str) -> AppResult<()> {
        self.secrets.remove(host_id);
        Ok(())
    }
}
