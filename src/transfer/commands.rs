//! Transfer operations addressed by profile id or name.

use super::{RemoteFileEntry, TransferOutcome};
use crate::state::AppState;
use std::path::Path;

pub fn list_directory(state: &AppState, host: &str, path: &str) -> TransferOutcome<Vec<RemoteFileEntry>> {
    let profile = state.profile(host)?;
    state.engine().list(&profile, path)
}

/// Preview using the configured byte limit
pub fn preview_file(state: &AppState, host: &str, remote_path: &str) -> TransferOutcome<String> {
    let profile = state.profile(host)?;
    let max_bytes = state.settings.read().transfer.preview_max_bytes;
    state.engine().preview(&profile, remote_path, max_bytes)
}

pub fn upload(state: &AppState, host: &str, local_path: &Path, remote_directory: &str) -> TransferOutcome<()> {
    let profile = state.profile(host)?;
    state.engine().upload(&profile, local_path, remote_directory)
}

pub fn download(
    state: &AppState,
    host: &str,
    remote_path: &str,
    local_path: &Path,
    is_directory: bool,
) -> TransferOutcome<()> {
    let profile = state.profile(host)?;
    state.engine().download(&profile, remote_path, local_path, is_directory)
}

pub fn make_directory(state: &AppState, host: &str, path: &str) -> TransferOutcome<()> {
    let profile = state.profile(host)?;
    state.engine().mkdir(&profile, path)
}

pub fn rename_item(state: &AppState, host: &str, from: &str, to: &str) -> TransferOutcome<()> {
    let profile = state.profile(host)?;
    state.engine().rename(&profile, from, to)
}

pub fn delete_item(state: &AppState, host: &str, path: &str, is_directory: bool) -> TransferOutcome<()> {
    let profile = state.profile(host)?;
    state.engine().delete(&profile, path, is_directory)
}
