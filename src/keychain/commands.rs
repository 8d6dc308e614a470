use super::CredentialStore;
use crate::error::{AppError, AppResult};

/// Keychain account prefix for host passwords
const PASSWORD_PREFIX: &str = "password:";

const MAX_HOST_ID_LENGTH: usize = 128;

// =============================================================================
// SECURITY: Host identifier validation
// =============================================================================

/// Validate that a host identifier is safe to use as a keychain account
///
/// SECURITY: Only `[A-Za-z0-9_-]` is accepted so an identifier can never
/// address an unrelated keychain entry.
pub fn validate_host_id(host_id: &str) -> AppResult<()> {
    if host_id.is_empty() || host_id.len() > MAX_HOST_ID_LENGTH {
        return Err(AppError::Keychain("Invalid host identifier length".to_string()));
    }

    if !host_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::Keychain(
            "Host identifier contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

/// Keychain account name for a host password
pub fn password_key(host_id: &str) -> AppResult<String> {
    validate_host_id(host_id)?;
    Ok(format!("{}{}", PASSWORD_PREFIX, host_id))
}

/// Store a host password
///
/// SECURITY: The secret value is never logged
pub fn store_password(store: &dyn CredentialStore, host_id: &str, secret: &str) -> AppResult<()> {
    validate_host_id(host_id)?;
    if secret.is_empty() {
        return Err(AppError::Credential("Password is empty".to_string()));
    }
    tracing::info!("Storing password for host {}", host_id);
    store.set(host_id, secret)
}

pub fn forget_password(store: &dyn CredentialStore, host_id: &str) -> AppResult<()> {
    validate_host_id(host_id)?;
    tracing::info!("Removing password for host {}", host_id);
    store.delete(host_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keychain::MemoryCredentialStore;

    #[test]
    fn test_valid_host_ids() {
        assert!(validate_host_id("abc-123").is_ok());
        assert!(validate_host_id("8f14e45f-ceea-467f-a8a8-1b4c2d9e0f11").is_ok());
        assert!(validate_host_id("host_1").is_ok());
    }

    #[test]
    fn test_invalid_host_ids() {
        assert!(validate_host_id("").is_err());
        assert!(validate_host_id("a:b").is_err());
        assert!(validate_host_id("../etc/passwd").is_err());
        assert!(validate_host_id("has space").is_err());
        assert!(validate_host_id(&"a".repeat(200)).is_err());
    }

    #[test]
    fn test_password_key() {
        assert_eq!(password_key("h1").unwrap(), "password:h1");
        assert!(password_key("bad id").is_err());
    }

    #[test]
    fn test_store_and_forget_password() {
        let store = MemoryCredentialStore::new();
        store_password(&store, "h1", "pw").unwrap();
        assert_eq!(store.get("h1").unwrap().as_deref(), Some("pw"));
        forget_password(&store, "h1").unwrap();
        assert_eq!(store.get("h1").unwrap(), None);
    }

    #[test]
    fn test_store_empty_password_rejected() {
        let store = MemoryCredentialStore::new();
        assert!(store_password(&store, "h1", "").is_err());
    }
}
