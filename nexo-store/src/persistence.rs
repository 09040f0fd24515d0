//! File persistence helpers.
//!
//! Every file the store writes may hold key material or spend history, so
//! all writes are atomic (temp file + rename) and owner-only on Unix.

use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::StoreError;

// ============================================================================
// Security: File Permissions
// ============================================================================

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    debug!(path = %path.display(), mode = format!("{mode:o}"), "Set restrictive permissions");
    Ok(())
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<(), StoreError> {
    Ok(())
}

/// Creates or truncates `path` and writes `contents`.
///
/// On Unix a new file is created 0600, so it is never readable by others.
async fn write_private(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    Ok(())
}

// ============================================================================
// File Operations
// ============================================================================

/// Ensures a directory exists, creating it owner-only (0700) if missing.
pub async fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    if !tokio::fs::try_exists(path).await? {
        debug!(path = %path.display(), "Creating directory");
        tokio::fs::create_dir_all(path).await?;
        set_mode(path, 0o700).await?;
    }
    Ok(())
}

/// Writes bytes atomically with owner-only (0600) permissions.
///
/// The parent directory is created if needed.
pub async fn write_secure(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = std::path::PathBuf::from(temp_name);

    write_private(&temp_path, contents).await?;
    // A leftover temp file keeps its old mode.
    set_mode(&temp_path, 0o600).await?;
    tokio::fs::rename(&temp_path, path).await?;

    debug!(path = %path.display(), bytes = contents.len(), "File saved securely");
    Ok(())
}

/// Saves data to a JSON file with secure permissions.
pub async fn save_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(data)?;
    write_secure(path, &json).await
}

/// Loads data from a JSON file.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    debug!(path = %path.display(), "Loading JSON file");
    let content = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&content)?)
}

/// Loads a JSON file, returning `None` when it does not exist.
///
/// Any other failure (unreadable, malformed) is an error.
pub async fn load_json_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match load_json(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.is_not_found() => {
            debug!(path = %path.display(), "File not found");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");

        let mut data = BTreeMap::new();
        data.insert("a".to_string(), 1u32);
        save_json(&path, &data).await.unwrap();

        let loaded: BTreeMap<String, u32> = load_json(&path).await.unwrap();
        assert_eq!(loaded, data);
        assert!(!dir.path().join("nested").join("data.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded: Option<BTreeMap<String, u32>> =
            load_json_optional(&dir.path().join("missing.json")).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let result: Result<Option<BTreeMap<String, u32>>, _> = load_json_optional(&path).await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_and_dir_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("private");
        let file = sub.join("secret.json");
        save_json(&file, &"x").await.unwrap();

        let file_mode = tokio::fs::metadata(&file).await.unwrap().permissions().mode() & 0o777;
        let dir_mode = tokio::fs::metadata(&sub).await.unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600, "File should have 0600 permissions");
        assert_eq!(dir_mode, 0o700, "Directory should have 0700 permissions");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_existing_dir_and_stale_temp_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("key.json");
        let temp = dir.path().join("key.json.tmp");
        tokio::fs::write(&temp, "stale stale stale").await.unwrap();
        tokio::fs::set_permissions(&temp, std::fs::Permissions::from_mode(0o644))
            .await
            .unwrap();

        save_json(&file, &"k").await.unwrap();

        let file_mode = tokio::fs::metadata(&file).await.unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        assert!(!temp.exists());
        let loaded: String = load_json(&file).await.unwrap();
        assert_eq!(loaded, "k");
    }
}
