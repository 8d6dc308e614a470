use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing host/username/path/key, detected before any process is spawned
    #[error("{0}")]
    Validation(String),

    /// Missing password or FTP credential in the credential store
    #[error("{0}")]
    Credential(String),

    /// Spawn failure or nonzero exit; carries the process output or a fallback phrase
    #[error("{0}")]
    Process(String),

    #[error("Keychain error: {0}")]
    Keychain(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("OpenSSH config does not contain importable Host entries.")]
    EmptyConfig,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),
}

/// Serializable error for machine-readable output
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SerializableError {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for SerializableError {
    fn from(err: &AppError) -> Self {
        let code = match err {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Credential(_) => "CREDENTIAL_ERROR",
            AppError::Process(_) => "PROCESS_ERROR",
            AppError::Keychain(_) => "KEYCHAIN_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::EmptyConfig => "EMPTY_CONFIG",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::ProfileNotFound(_) => "PROFILE_NOT_FOUND",
        };

        SerializableError {
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        SerializableError::from(self).serialize(serializer)
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AppError {
    fn from(err: toml::ser::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<keyring::Error> for AppError {
    fn from(err: keyring::Error) -> Self {
        AppError::Keychain(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
