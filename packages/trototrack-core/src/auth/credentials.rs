//! Credential storage with platform keyring and file-based fallback.
//!
//! Storage priority:
//! 1. Platform keyring (if `keyring-storage` feature enabled and available)
//! 2. File-based storage (`<config_dir>/trototrack/.credentials`, owner-only on Unix)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "keyring-storage")]
use keyring::Entry;

#[cfg(feature = "keyring-storage")]
const KEYRING_SERVICE: &str = "trototrack";
#[cfg(feature = "keyring-storage")]
const KEYRING_USER: &str = "session";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Credentials {
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| chrono::Utc::now() > expires_at)
            .unwrap_or(false)
    }
}

/// Get the trototrack config directory
pub(crate) fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .context("Failed to find config directory")?;
    Ok(config_dir.join("trototrack"))
}

fn get_credentials_file_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(".credentials"))
}

// ============================================================================
// File-based credential storage (always available)
// ============================================================================

fn save_credentials_to_file(path: &Path, creds: &Credentials) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    let json = serde_json::to_string(creds).context("Failed to serialize credentials")?;

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .context("Failed to create credentials file")?;
        file.write_all(json.as_bytes())
            .context("Failed to write credentials")?;
    }

    #[cfg(not(unix))]
    {
        fs::write(path, &json).context("Failed to write credentials file")?;
    }

    tracing::debug!("Credentials saved to file: {:?}", path);
    Ok(())
}

fn load_credentials_from_file(path: &Path) -> Result<Option<Credentials>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).context("Failed to read credentials file")?;
    let creds: Credentials =
        serde_json::from_str(&content).context("Failed to parse credentials file")?;
    tracing::debug!("Credentials loaded from file");
    Ok(Some(creds))
}

fn delete_credentials_from_file(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to delete credentials file: {}", e);
        }
    }
}

/// Pass `creds` through unless expired, in which case `delete` purges them.
fn discard_if_expired(creds: Option<Credentials>, delete: impl FnOnce()) -> Option<Credentials> {
    match creds {
        Some(c) if c.is_expired() => {
            tracing::info!("Credentials expired, deleting");
            delete();
            None
        }
        other => other,
    }
}

#[cfg_attr(feature = "keyring-storage", allow(dead_code))]
fn load_unexpired_from_file(path: &Path) -> Result<Option<Credentials>> {
    let creds = load_credentials_from_file(path)?;
    Ok(discard_if_expired(creds, || delete_credentials_from_file(path)))
}

// ============================================================================
// Keyring-based credential storage (optional, platform-specific)
// ============================================================================

#[cfg(feature = "keyring-storage")]
fn get_keyring_entry() -> Result<Entry> {
    Entry::new(KEYRING_SERVICE, KEYRING_USER)
        .map_err(|e| anyhow::anyhow!("Failed to create keyring entry: {}", e))
}

#[cfg(feature = "keyring-storage")]
fn save_credentials_to_keyring(file: &Path, creds: &Credentials) -> Result<()> {
    let json = serde_json::to_string(creds).context("Failed to serialize credentials")?;

    match get_keyring_entry().and_then(|entry| {
        entry
            .set_password(&json)
            .map_err(|e| anyhow::anyhow!("{}", e))
    }) {
        Ok(()) => {
            tracing::debug!("Credentials saved to keyring");
            // Keep the file copy in step so headless sessions see the same token
            if let Err(e) = save_credentials_to_file(file, creds) {
                tracing::debug!("Failed to save backup credentials to file: {}", e);
            }
            Ok(())
        }
        Err(e) => {
            tracing::warn!("Failed to save credentials to keyring: {}, using file storage", e);
            save_credentials_to_file(file, creds)
        }
    }
}

#[cfg(feature = "keyring-storage")]
fn load_credentials_from_keyring(file: &Path) -> Result<Option<Credentials>> {
    let entry = match get_keyring_entry() {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!("{}, trying file fallback", e);
            return load_credentials_from_file(file);
        }
    };

    match entry.get_password() {
        Ok(json) => {
            tracing::debug!("Credentials loaded from keyring");
            let creds: Credentials =
                serde_json::from_str(&json).context("Failed to parse credentials from keyring")?;
            Ok(Some(creds))
        }
        Err(keyring::Error::NoEntry) => {
            tracing::debug!("No credentials in keyring, trying file fallback");
            load_credentials_from_file(file)
        }
        Err(e) => {
            tracing::warn!("Failed to load credentials from keyring: {}, trying file fallback", e);
            load_credentials_from_file(file)
        }
    }
}

#[cfg(feature = "keyring-storage")]
fn delete_credentials_from_keyring(file: &Path) -> Result<()> {
    delete_credentials_from_file(file);

    let entry = get_keyring_entry()?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(anyhow::anyhow!("Failed to delete credentials from keyring: {}", e)),
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Load stored credentials. Expired credentials are deleted and reported as absent.
pub async fn load_credentials() -> Result<Option<Credentials>> {
    let path = get_credentials_file_path()?;

    #[cfg(feature = "keyring-storage")]
    let creds = tokio::task::spawn_blocking(move || {
        let creds = load_credentials_from_keyring(&path)?;
        Ok::<_, anyhow::Error>(discard_if_expired(creds, || {
            if let Err(e) = delete_credentials_from_keyring(&path) {
                tracing::warn!("Failed to delete expired credentials: {}", e);
            }
        }))
    })
    .await
    .context("Credential load task failed")??;

    #[cfg(not(feature = "keyring-storage"))]
    let creds = load_unexpired_from_file(&path)?;

    Ok(creds)
}

/// Save credentials to secure storage.
pub async fn save_credentials(creds: &Credentials) -> Result<()> {
    let path = get_credentials_file_path()?;

    #[cfg(feature = "keyring-storage")]
    {
        let creds = creds.clone();
        tokio::task::spawn_blocking(move || save_credentials_to_keyring(&path, &creds))
            .await
            .context("Credential save task failed")??;
    }

    #[cfg(not(feature = "keyring-storage"))]
    save_credentials_to_file(&path, creds)?;

    tracing::info!(
        "Credentials saved for user: {}",
        creds.user_email.as_deref().unwrap_or("unknown")
    );
    Ok(())
}

/// Delete credentials from all storage locations.
pub async fn delete_credentials() -> Result<()> {
    let path = get_credentials_file_path()?;

    #[cfg(feature = "keyring-storage")]
    tokio::task::spawn_blocking(move || delete_credentials_from_keyring(&path))
        .await
        .context("Credential delete task failed")??;

    #[cfg(not(feature = "keyring-storage"))]
    delete_credentials_from_file(&path);

    Ok(())
}

/// Describe where credentials are stored (for status output).
pub fn credential_storage_info() -> String {
    #[cfg(all(feature = "keyring-storage", target_os = "windows"))]
    {
        "Windows Credential Manager (with file fallback)".to_string()
    }
    #[cfg(all(feature = "keyring-storage", target_os = "macos"))]
    {
        "macOS Keychain (with file fallback)".to_string()
    }
    #[cfg(all(
        feature = "keyring-storage",
        not(any(target_os = "windows", target_os = "macos"))
    ))]
    {
        "Secret Service (GNOME Keyring/KWallet, with file fallback)".to_string()
    }
    #[cfg(not(feature = "keyring-storage"))]
    {
        let path = get_credentials_file_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "~/.config/trototrack/.credentials".to_string());
        format!("File-based storage: {}", path)
    }
}
