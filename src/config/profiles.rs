use crate::error::{AppError, AppResult};
use crate::ssh::ConnectionConfig;
use crate::transfer::FileTransferConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A saved host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub file_transfer: FileTransferConfig,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Profile {
    pub fn new(name: impl Into<String>, connection: ConnectionConfig) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            // keychain ids only allow [A-Za-z0-9_-], which a hyphenated uuid satisfies
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            connection,
            file_transfer: FileTransferConfig::default(),
            tags: vec![],
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Profile file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

/// Profile manager
pub struct ProfileManager {
    profiles: HashMap<String, Profile>,
    config_path: PathBuf,
}

impl ProfileManager {
    pub fn load(config_dir: &Path) -> AppResult<Self> {
        let config_path = config_dir.join("profiles.toml");
        let profiles = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let file: ProfilesFile = toml::from_str(&content)?;
            file.profiles
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect()
        } else {
            HashMap::new()
        };

        Ok(Self {
            profiles,
            config_path,
        })
    }

    pub fn save(&self) -> AppResult<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = ProfilesFile {
            profiles: self.list(),
        };
        let content = toml::to_string_pretty(&file)?;
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }

    /// All profiles ordered by name
    pub fn list(&self) -> Vec<Profile> {
        let mut profiles: Vec<Profile> = self.profiles.values().cloned().collect();
        profiles.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        profiles
    }

    pub fn get(&self, id: &str) -> Option<Profile> {
        self.profiles.get(id).cloned()
    }

    /// Look a profile up by id, then by exact name, then case-insensitively by name
    pub fn find(&self, id_or_name: &str) -> AppResult<Profile> {
        if let Some(profile) = self.get(id_or_name) {
            return Ok(profile);
        }
        let profiles = self.list();
        profiles
            .iter()
            .find(|p| p.name == id_or_name)
            .or_else(|| {
                profiles
                    .iter()
                    .find(|p| p.name.eq_ignore_ascii_case(id_or_name))
            })
            .cloned()
            .ok_or_else(|| AppError::ProfileNotFound(id_or_name.to_string()))
    }

    pub fn delete(&mut self, id: &str) -> AppResult<()> {
        self.profiles
            .remove(id)
            .ok_or_else(|| AppError::ProfileNotFound(id.to_string()))?;
        self.save()
    }

    /// Add several profiles with a single write
    pub fn import(&mut self, profiles: Vec<Profile>) -> AppResult<usize> {
        let count = profiles.len();
        for profile in profiles {
            self.profiles.insert(profile.id.clone(), profile);
        }
        self.save()?;
        Ok(count)
    }
}
