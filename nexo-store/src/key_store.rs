//! Where the configuration key lives.
//!
//! The key is generated on first run and loaded afterwards. There is no
//! escrow: losing it makes the encrypted configuration unreadable.

use std::fmt;
use std::path::{Path, PathBuf};

use keyring::Entry;
use tracing::{debug, info, warn};

use crate::crypto::SecretKey;
use crate::error::StoreError;
use crate::paths::AppPaths;
use crate::persistence::write_secure;

/// Environment variable selecting the key backend (`file` or `keychain`).
pub const KEY_STORE_ENV: &str = "NEXO_KEY_STORE";

/// Keychain service name.
pub const KEYCHAIN_SERVICE: &str = "Nexo";

/// Keychain account holding the configuration key.
pub const KEYCHAIN_ACCOUNT: &str = "config-key";

/// Backend holding the symmetric key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Base64 key in an owner-only file.
    File(PathBuf),
    /// System keychain entry.
    Keychain {
        /// Service name.
        service: String,
        /// Account name.
        account: String,
    },
}

impl KeySource {
    /// The default system keychain entry.
    pub fn keychain() -> Self {
        Self::Keychain {
            service: KEYCHAIN_SERVICE.to_string(),
            account: KEYCHAIN_ACCOUNT.to_string(),
        }
    }

    /// Backend named `name` (`file` or `keychain`, case-insensitive).
    pub fn named(name: &str, paths: &AppPaths) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "file" => Some(Self::File(paths.key_file())),
            "keychain" => Some(Self::keychain()),
            _ => None,
        }
    }

    /// Resolves the backend from `NEXO_KEY_STORE`, defaulting to the key
    /// file under `paths`. Unknown values fall back to the file.
    pub fn from_env(paths: &AppPaths) -> Self {
        let Some(name) = std::env::var(KEY_STORE_ENV).ok().filter(|v| !v.is_empty()) else {
            return Self::File(paths.key_file());
        };
        Self::named(&name, paths).unwrap_or_else(|| {
            warn!(value = %name, "Unknown key store, using key file");
            Self::File(paths.key_file())
        })
    }

    /// Loads the key, generating and storing one if none exists.
    pub async fn load_or_create(&self) -> Result<SecretKey, StoreError> {
        match self {
            Self::File(path) => load_or_create_file(path).await,
            Self::Keychain { service, account } => {
                let (service, account) = (service.clone(), account.clone());
                tokio::task::spawn_blocking(move || load_or_create_keychain(&service, &account))
                    .await
                    .map_err(|e| StoreError::Keychain(format!("Keychain task failed: {e}")))?
            }
        }
    }
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Keychain { service, account } => write!(f, "keychain ({service}/{account})"),
        }
    }
}

async fn load_or_create_file(path: &Path) -> Result<SecretKey, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(encoded) => {
            debug!(path = %path.display(), "Loaded configuration key");
            Ok(SecretKey::from_base64(&encoded)?)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let key = SecretKey::generate()?;
            write_secure(path, key.to_base64().as_bytes()).await?;
            info!(path = %path.display(), "Generated new configuration key");
            Ok(key)
        }
        Err(e) => Err(e.into()),
    }
}

fn load_or_create_keychain(service: &str, account: &str) -> Result<SecretKey, StoreError> {
    let entry = Entry::new(service, account)
        .map_err(|e| StoreError::Keychain(format!("Failed to create keychain entry: {e}")))?;

    match entry.get_password() {
        Ok(encoded) => {
            debug!(service = service, "Loaded configuration key from keychain");
            Ok(SecretKey::from_base64(&encoded)?)
        }
        Err(keyring::Error::NoEntry) => {
            let key = SecretKey::generate()?;
            entry
                .set_password(&key.to_base64())
                .map_err(|e| StoreError::Keychain(format!("Failed to store key: {e}")))?;
            info!(service = service, "Generated new configuration key in keychain");
            Ok(key)
        }
        Err(e) => Err(StoreError::Keychain(format!("Failed to read key: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_key_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = KeySource::File(dir.path().join("config.key"));

        let first = source.load_or_create().await.unwrap();
        let second = source.load_or_create().await.unwrap();

        assert_eq!(first.to_base64(), second.to_base64());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.key");
        KeySource::File(path.clone()).load_or_create().await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[tokio::test]
    async fn test_corrupt_key_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.key");
        tokio::fs::write(&path, "not base64!").await.unwrap();

        let result = KeySource::File(path).load_or_create().await;
        assert!(matches!(result, Err(StoreError::Crypto(_))));
    }

    fn use_mock_keychain() {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
    }

    #[test]
    fn test_keychain_defaults() {
        assert_eq!(
            KeySource::keychain(),
            KeySource::Keychain {
                service: "Nexo".to_string(),
                account: "config-key".to_string()
            }
        );
        assert_eq!(KeySource::keychain().to_string(), "keychain (Nexo/config-key)");
    }

    #[test]
    fn test_named_sources() {
        let paths = AppPaths::new("/tmp/nexo-test");
        assert_eq!(
            KeySource::named("file", &paths),
            Some(KeySource::File(paths.key_file()))
        );
        assert_eq!(KeySource::named(" Keychain ", &paths), Some(KeySource::keychain()));
        assert_eq!(KeySource::named("vault", &paths), None);
    }

    #[tokio::test]
    async fn test_keychain_key_is_generated_and_stored() {
        use_mock_keychain();

        let key = KeySource::keychain().load_or_create().await.unwrap();
        let blob = key.seal(b"secret").unwrap();
        assert_eq!(key.open(&blob).unwrap().as_slice(), b"secret");
    }
}
