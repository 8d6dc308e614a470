use crate::config::{AppSettings, Profile, ProfileManager};
use crate::error::AppResult;
use crate::files::RemoteFileService;
use crate::keychain::{CredentialStore, KeyringCredentialStore};
use crate::transfer::{RemoteFiles, TransferEngine};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Global application state
pub struct AppState {
    pub config_dir: PathBuf,
    pub profiles: Arc<RwLock<ProfileManager>>,
    pub settings: Arc<RwLock<AppSettings>>,
    pub credentials: Arc<dyn CredentialStore>,
}

impl AppState {
    /// Load settings and profiles from `config_dir`, secrets from the OS keychain
    pub fn new(config_dir: &Path) -> AppResult<Self> {
        Self::with_credentials(config_dir, Arc::new(KeyringCredentialStore::new()))
    }

    pub fn with_credentials(config_dir: &Path, credentials: Arc<dyn CredentialStore>) -> AppResult<Self> {
        std::fs::create_dir_all(config_dir)?;

        // Load settings
        let settings = AppSettings::load(config_dir)?;

        // Load profiles
        let profiles = ProfileManager::load(config_dir)?;

        Ok(Self {
            config_dir: config_dir.to_path_buf(),
            profiles: Arc::new(RwLock::new(profiles)),
            settings: Arc::new(RwLock::new(settings)),
            credentials,
        })
    }

    /// Resolve a profile by id or name
    pub fn profile(&self, id_or_name: &str) -> AppResult<Profile> {
        self.profiles.read().find(id_or_name)
    }

    /// Transfer engine spawning real processes with the configured tools
    pub fn engine(&self) -> TransferEngine {
        TransferEngine::system(
            Arc::clone(&self.credentials),
            self.settings.read().tools.clone(),
        )
    }

    /// File browser controller backed by the transfer engine
    pub fn file_service(&self) -> AppResult<RemoteFileService> {
        let (preview_max_bytes, log_capacity) = {
            let settings = self.settings.read();
            (settings.transfer.preview_max_bytes, settings.transfer.log_capacity)
        };
        let backend: Arc<dyn RemoteFiles> = Arc::new(self.engine());
        RemoteFileService::new(backend, preview_max_bytes, log_capacity)
    }
}
