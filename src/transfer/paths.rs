//! Remote path arithmetic on plain `/`-separated strings.
//!
//! Remote paths are never resolved locally; `.` and `~` are passed through
//! for the remote side to interpret.

/// Empty remote paths become `.`
pub fn normalize_remote_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        ".".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Append one name to a remote directory
pub fn join_remote_path(base: &str, name: &str) -> String {
    let base = normalize_remote_path(base);
    if base == "/" {
        format!("/{}", name)
    } else if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// Parent of a remote path; `.`, `~` and `/` are their own parent
pub fn parent_path(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        return ".".to_string();
    }
    if matches!(path, "." | "~" | "/") {
        return path.to_string();
    }

    let stripped = path.strip_suffix('/').unwrap_or(path);
    match stripped.rfind('/') {
        Some(0) => "/".to_string(),
        Some(index) => stripped[..index].to_string(),
        None => ".".to_string(),
    }
}

/// Last path component, ignoring a trailing slash
pub fn file_name(path: &str) -> String {
    let stripped = path.trim().trim_end_matches('/');
    match stripped.rfind('/') {
        Some(index) => stripped[index + 1..].to_string(),
        None => stripped.to_string(),
    }
}

/// Resolve a leading `~/` against the local home directory
pub fn expand_local_path(path: &str) -> String {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home.to_string_lossy().into_owned();
        }
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().into_owned();
        }
    }
    path.to_string()
}
