use super::{openssh, Profile};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use std::path::{Path, PathBuf};

// =============================================================================
// SECURITY: Path validation utilities
// =============================================================================

/// Validate an export destination
fn validate_export_path(path: &Path) -> AppResult<PathBuf> {
    // SECURITY: Reject obviously malicious patterns
    if path.components().any(|c| c == std::path::Component::ParentDir) {
        return Err(AppError::Config("Path traversal not allowed".to_string()));
    }

    if path.is_dir() {
        return Err(AppError::Config("Export path is a directory".to_string()));
    }

    // SECURITY: Parent directory must exist (prevents creating arbitrary directories)
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(AppError::Config("Parent directory does not exist".to_string()));
        }
    }

    Ok(path.to_path_buf())
}

/// Validate that an import path is a readable file
fn validate_import_path(path: &Path) -> AppResult<PathBuf> {
    // SECURITY: File must exist
    if !path.exists() {
        return Err(AppError::Config("File not found".to_string()));
    }

    // SECURITY: Must be a file, not a directory
    if !path.is_file() {
        return Err(AppError::Config("Path must be a file".to_string()));
    }

    Ok(path.to_path_buf())
}

// Profile commands

pub fn list_profiles(state: &AppState) -> Vec<Profile> {
    state.profiles.read().list()
}

/// Delete a profile and its stored password
pub fn delete_profile(state: &AppState, id: &str) -> AppResult<()> {
    state.profiles.write().delete(id)?;
    if let Err(e) = state.credentials.delete(id) {
        tracing::warn!("Profile {} deleted but its password could not be removed: {}", id, e);
    }
    Ok(())
}

pub fn import_ssh_config(state: &AppState, content: &str) -> AppResult<Vec<Profile>> {
    let profiles = openssh::decode(content)?;
    state.profiles.write().import(profiles.clone())?;
    tracing::info!("Imported {} hosts", profiles.len());
    Ok(profiles)
}

pub fn import_ssh_config_file(state: &AppState, path: &Path) -> AppResult<Vec<Profile>> {
    let path = validate_import_path(path)?;
    let content = std::fs::read_to_string(&path)?;
    import_ssh_config(state, &content)
}

pub fn export_ssh_config(state: &AppState) -> String {
    openssh::encode(&state.profiles.read().list())
}

pub fn export_ssh_config_file(state: &AppState, path: &Path) -> AppResult<()> {
    let path = validate_export_path(path)?;
    std::fs::write(&path, export_ssh_config(state))?;
    tracing::info!("Exported hosts to {}", path.display());
    Ok(())
}
