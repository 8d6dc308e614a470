use crate::error::AppResult;
use crate::logging::{DEFAULT_FILTER, DEFAULT_LOG_CAPACITY};
use crate::ssh::ClientPrograms;
use crate::transfer::DEFAULT_PREVIEW_BYTES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Places a telnet client is commonly installed
const TELNET_CANDIDATES: &[&str] = &[
    "/usr/bin/telnet",
    "/opt/homebrew/bin/telnet",
    "/usr/local/bin/telnet",
];

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub tools: ToolSettings,
    #[serde(default)]
    pub transfer: TransferSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Executables used for sessions and transfers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_ssh")]
    pub ssh: String,
    #[serde(default = "default_sftp")]
    pub sftp: String,
    #[serde(default = "default_scp")]
    pub scp: String,
    #[serde(default = "default_curl")]
    pub curl: String,
    /// Resolved from well-known locations and `PATH` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telnet: Option<String>,
}

fn default_ssh() -> String {
    "ssh".to_string()
}

fn default_sftp() -> String {
    "sftp".to_string()
}

fn default_scp() -> String {
    "scp".to_string()
}

fn default_curl() -> String {
    "curl".to_string()
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ssh: default_ssh(),
            sftp: default_sftp(),
            scp: default_scp(),
            curl: default_curl(),
            telnet: None,
        }
    }
}

impl ToolSettings {
    pub fn resolve_telnet(&self) -> Option<String> {
        if let Some(configured) = self.telnet.as_deref().map(str::trim) {
            if !configured.is_empty() {
                return Some(configured.to_string());
            }
        }

        let search_path = std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).collect::<Vec<_>>())
            .unwrap_or_default();
        find_telnet(TELNET_CANDIDATES, &search_path)
    }

    pub fn client_programs(&self) -> ClientPrograms {
        ClientPrograms {
            ssh: self.ssh.clone(),
            telnet: self.resolve_telnet(),
        }
    }
}

fn find_telnet(candidates: &[&str], search_path: &[PathBuf]) -> Option<String> {
    candidates
        .iter()
        .map(PathBuf::from)
        .chain(search_path.iter().map(|dir| dir.join("telnet")))
        .find(|path| path.is_file())
        .map(|path| path.to_string_lossy().into_owned())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSettings {
    #[serde(default = "default_preview_max_bytes")]
    pub preview_max_bytes: usize,
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

fn default_preview_max_bytes() -> usize {
    DEFAULT_PREVIEW_BYTES
}

fn default_log_capacity() -> usize {
    DEFAULT_LOG_CAPACITY
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            preview_max_bytes: default_preview_max_bytes(),
            log_capacity: default_log_capacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    DEFAULT_FILTER.to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl AppSettings {
    pub fn load(config_dir: &Path) -> AppResult<Self> {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: AppSettings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            let settings = AppSettings::default();
            settings.save(config_dir)?;
            Ok(settings)
        }
    }

    pub fn save(&self, config_dir: &Path) -> AppResult<()> {
        std::fs::create_dir_all(config_dir)?;
        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }
}
