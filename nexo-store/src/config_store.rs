//! Encrypted provider configuration and preferences.
//!
//! The whole document is sealed as a single blob on disk. Inside it, every
//! credential-shaped field of every provider is sealed again on its own,
//! so reading one provider's settings never opens another's secrets.
//!
//! ```json
//! {
//!   "active_provider": "openai",
//!   "fallback_chain": ["openai", "ollama"],
//!   "providers": {
//!     "openai": {
//!       "api_key": { "sealed": { "algorithm": "aes-256-gcm", "iv": "...", "ciphertext": "..." } },
//!       "model": "gpt-4o-mini"
//!     }
//!   },
//!   "preferences": { "privacy_filter": true }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::Utc;
use nexo_core::{ProviderConfig, is_sensitive_field};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use url::Url;
use zeroize::Zeroizing;

use crate::crypto::{EncryptedBlob, SecretKey};
use crate::error::StoreError;
use crate::key_store::KeySource;
use crate::paths::AppPaths;
use crate::persistence::{ensure_dir, load_json_optional, save_json, write_secure};

/// Current export format version.
pub const EXPORT_VERSION: u64 = 1;

/// Key wrapping an individually sealed field.
const SEALED_KEY: &str = "sealed";

/// Sections a decrypted document must carry to be importable.
const REQUIRED_SECTIONS: &[&str] = &["providers", "preferences"];

// ============================================================================
// Document
// ============================================================================

/// Decrypted configuration document.
///
/// Provider credentials inside `providers` stay individually sealed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    /// Provider preferred for new requests.
    pub active_provider: Option<String>,
    /// Last computed fallback order.
    pub fallback_chain: Vec<String>,
    /// Per-provider configuration with sealed credentials.
    pub providers: BTreeMap<String, ProviderConfig>,
    /// Named user options.
    pub preferences: BTreeMap<String, Value>,
}

/// Export wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    /// Format version.
    pub version: u64,
    /// When the export was produced.
    pub exported_at: chrono::DateTime<Utc>,
    /// The sealed document.
    pub config: EncryptedBlob,
}

// ============================================================================
// Store
// ============================================================================

/// Durable, encrypted store for provider settings and preferences.
///
/// All mutations are applied to a copy, persisted, then committed, so a
/// failed write leaves memory and disk in agreement.
#[derive(Debug)]
pub struct SecureConfigStore {
    key: SecretKey,
    config_path: PathBuf,
    backup_dir: PathBuf,
    document: RwLock<ConfigDocument>,
    requirements: RwLock<HashMap<String, Vec<String>>>,
}

impl SecureConfigStore {
    /// Opens the store using the key file under `paths`.
    pub async fn open(paths: &AppPaths) -> Result<Self, StoreError> {
        Self::open_with_key_source(paths, &KeySource::File(paths.key_file())).await
    }

    /// Opens the store with an explicit key backend and loads the document.
    pub async fn open_with_key_source(
        paths: &AppPaths,
        source: &KeySource,
    ) -> Result<Self, StoreError> {
        ensure_dir(paths.data_dir()).await?;
        let key = source.load_or_create().await?;

        let store = Self {
            key,
            config_path: paths.config_file(),
            backup_dir: paths.backup_dir(),
            document: RwLock::new(ConfigDocument::default()),
            requirements: RwLock::new(HashMap::new()),
        };
        store.load_configuration().await?;
        Ok(store)
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// Reloads the document from disk.
    ///
    /// A missing file yields defaults. A file that cannot be decrypted or
    /// parsed is an error and leaves the in-memory document unchanged.
    #[instrument(skip(self), fields(path = %self.config_path.display()))]
    pub async fn load_configuration(&self) -> Result<ConfigDocument, StoreError> {
        let loaded = match load_json_optional::<EncryptedBlob>(&self.config_path).await? {
            Some(blob) => {
                let doc = self.open_document(&blob)?;
                info!(providers = doc.providers.len(), "Configuration loaded");
                doc
            }
            None => {
                debug!("Configuration file not found, using defaults");
                ConfigDocument::default()
            }
        };

        *self.document.write().await = loaded.clone();
        Ok(loaded)
    }

    /// Seals and writes the current document.
    pub async fn save_configuration(&self) -> Result<(), StoreError> {
        let doc = self.document.write().await;
        self.persist(&doc).await
    }

    async fn persist(&self, doc: &ConfigDocument) -> Result<(), StoreError> {
        let blob = self.seal_document(doc)?;
        save_json(&self.config_path, &blob).await?;
        debug!(path = %self.config_path.display(), "Configuration saved");
        Ok(())
    }

    fn seal_document(&self, doc: &ConfigDocument) -> Result<EncryptedBlob, StoreError> {
        let plaintext = Zeroizing::new(serde_json::to_vec(doc)?);
        Ok(self.key.seal(&plaintext)?)
    }

    fn open_document(&self, blob: &EncryptedBlob) -> Result<ConfigDocument, StoreError> {
        let plaintext = self.key.open(blob)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Applies `f` to a copy of the document, persists it, then commits.
    async fn update<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut ConfigDocument) -> Result<T, StoreError>,
    {
        let mut doc = self.document.write().await;
        let mut next = doc.clone();
        let result = f(&mut next)?;
        self.persist(&next).await?;
        *doc = next;
        Ok(result)
    }

    /// Returns a copy of the document (credentials still sealed).
    pub async fn snapshot(&self) -> ConfigDocument {
        self.document.read().await.clone()
    }

    // ========================================================================
    // Providers
    // ========================================================================

    /// Declares the fields a provider needs before it can be configured.
    pub async fn register_requirements(&self, provider: &str, fields: Vec<String>) {
        self.requirements
            .write()
            .await
            .insert(provider.to_string(), fields);
    }

    /// Validates, seals and merges a provider configuration, then persists.
    ///
    /// Fields in `config` overwrite stored ones; a `null` value removes the
    /// field. Validation runs against the merged result.
    #[instrument(skip(self, config), fields(provider = %provider))]
    pub async fn configure_provider(
        &self,
        provider: &str,
        config: ProviderConfig,
    ) -> Result<(), StoreError> {
        let required = self
            .requirements
            .read()
            .await
            .get(provider)
            .cloned()
            .unwrap_or_default();

        self.update(|doc| {
            let mut merged = doc.providers.get(provider).cloned().unwrap_or_default();
            for (field, value) in config.iter() {
                if value.is_null() {
                    merged.remove(field);
                } else {
                    merged.set(field.clone(), value.clone());
                }
            }

            validate_provider_config(provider, &merged, &required)?;
            let sealed = seal_fields(&self.key, &merged)?;
            doc.providers.insert(provider.to_string(), sealed);
            Ok(())
        })
        .await?;

        info!(provider = %provider, fields = ?config.redacted(), "Provider configured");
        Ok(())
    }

    /// Returns a provider's configuration with its credentials opened.
    ///
    /// Only that provider's sealed fields are decrypted.
    pub async fn get_provider_config(
        &self,
        provider: &str,
    ) -> Result<Option<ProviderConfig>, StoreError> {
        let stored = self.document.read().await.providers.get(provider).cloned();
        stored
            .map(|config| open_fields(&self.key, &config))
            .transpose()
    }

    /// Names of providers with a stored configuration.
    pub async fn configured_providers(&self) -> Vec<String> {
        self.document.read().await.providers.keys().cloned().collect()
    }

    /// Deletes a provider's configuration and unlinks it from the selection.
    ///
    /// Returns false if nothing was stored for it.
    pub async fn remove_provider(&self, provider: &str) -> Result<bool, StoreError> {
        let removed = self
            .update(|doc| {
                let removed = doc.providers.remove(provider).is_some();
                if doc.active_provider.as_deref() == Some(provider) {
                    doc.active_provider = None;
                }
                doc.fallback_chain.retain(|p| p != provider);
                Ok(removed)
            })
            .await?;

        if removed {
            info!(provider = %provider, "Provider configuration removed");
        }
        Ok(removed)
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Stored active provider.
    pub async fn active_provider(&self) -> Option<String> {
        self.document.read().await.active_provider.clone()
    }

    /// Stored fallback chain.
    pub async fn fallback_chain(&self) -> Vec<String> {
        self.document.read().await.fallback_chain.clone()
    }

    /// Stores the active provider.
    pub async fn set_active_provider(&self, provider: Option<String>) -> Result<(), StoreError> {
        self.update(|doc| {
            doc.active_provider = provider;
            Ok(())
        })
        .await
    }

    /// Stores the fallback chain.
    pub async fn set_fallback_chain(&self, chain: Vec<String>) -> Result<(), StoreError> {
        self.update(|doc| {
            doc.fallback_chain = chain;
            Ok(())
        })
        .await
    }

    /// Stores both active provider and chain, writing only if either changed.
    ///
    /// Returns true if something was written.
    pub async fn set_selection(
        &self,
        active: Option<String>,
        chain: Vec<String>,
    ) -> Result<bool, StoreError> {
        {
            let doc = self.document.read().await;
            if doc.active_provider == active && doc.fallback_chain == chain {
                return Ok(false);
            }
        }
        self.update(|doc| {
            doc.active_provider = active;
            doc.fallback_chain = chain;
            Ok(())
        })
        .await?;
        Ok(true)
    }

    // ========================================================================
    // Preferences
    // ========================================================================

    /// Reads a preference.
    pub async fn get_preference(&self, key: &str) -> Option<Value> {
        self.document.read().await.preferences.get(key).cloned()
    }

    /// Writes a preference and persists.
    pub async fn set_preference(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.update(|doc| {
            doc.preferences.insert(key.to_string(), value);
            Ok(())
        })
        .await
    }

    // ========================================================================
    // Import / Export
    // ========================================================================

    /// Exports the whole document, still sealed, with a format version.
    pub async fn export_configuration(&self) -> Result<Value, StoreError> {
        let doc = self.document.read().await;
        let export = ExportDocument {
            version: EXPORT_VERSION,
            exported_at: Utc::now(),
            config: self.seal_document(&doc)?,
        };
        Ok(serde_json::to_value(export)?)
    }

    /// Replaces the document with an exported one.
    ///
    /// The incoming data is fully validated and opened before anything is
    /// touched. The current file is then copied to the backup directory and
    /// overwritten.
    #[instrument(skip(self, data))]
    pub async fn import_configuration(&self, data: &Value) -> Result<PathBuf, StoreError> {
        let incoming = self.parse_import(data)?;

        let mut doc = self.document.write().await;
        let backup = self.backup_current(&doc).await?;
        self.persist(&incoming).await?;
        *doc = incoming;

        info!(backup = %backup.display(), providers = doc.providers.len(), "Configuration imported");
        Ok(backup)
    }

    fn parse_import(&self, data: &Value) -> Result<ConfigDocument, StoreError> {
        let version = data
            .get("version")
            .ok_or_else(|| StoreError::Format("missing version".to_string()))?;
        if version.as_u64() != Some(EXPORT_VERSION) {
            return Err(StoreError::Format(format!("unsupported version: {version}")));
        }

        let blob: EncryptedBlob = data
            .get("config")
            .cloned()
            .ok_or_else(|| StoreError::Format("missing config section".to_string()))
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|e| StoreError::Format(format!("invalid config section: {e}")))
            })?;

        let plaintext = self.key.open(&blob)?;
        let raw: Value = serde_json::from_slice(&plaintext)
            .map_err(|e| StoreError::Format(format!("config is not a JSON document: {e}")))?;

        for section in REQUIRED_SECTIONS {
            if raw.get(section).is_none() {
                return Err(StoreError::Format(format!("missing section: {section}")));
            }
        }

        let doc: ConfigDocument = serde_json::from_value(raw)
            .map_err(|e| StoreError::Format(format!("invalid document: {e}")))?;

        for (provider, config) in &doc.providers {
            open_fields(&self.key, config).map_err(|e| {
                StoreError::Format(format!("unreadable credentials for {provider}: {e}"))
            })?;
        }

        Ok(doc)
    }

    async fn backup_current(&self, doc: &ConfigDocument) -> Result<PathBuf, StoreError> {
        ensure_dir(&self.backup_dir).await?;
        let name = format!("config-{}.enc.json", Utc::now().format("%Y%m%dT%H%M%S%3fZ"));
        let path = self.backup_dir.join(name);

        let blob = self.seal_document(doc)?;
        write_secure(&path, &serde_json::to_vec_pretty(&blob)?).await?;
        debug!(path = %path.display(), "Configuration backed up");
        Ok(path)
    }
}

// ============================================================================
// Field Sealing
// ============================================================================

fn sealed_blob(value: &Value) -> Option<EncryptedBlob> {
    let object = value.as_object()?;
    if object.len() != 1 {
        return None;
    }
    serde_json::from_value(object.get(SEALED_KEY)?.clone()).ok()
}

/// Seals every credential-shaped field that is not sealed yet.
fn seal_fields(key: &SecretKey, config: &ProviderConfig) -> Result<ProviderConfig, StoreError> {
    let mut sealed = config.clone();
    for (field, value) in sealed.iter_mut() {
        if !is_sensitive_field(field) || value.is_null() || sealed_blob(value).is_some() {
            continue;
        }
        let plaintext = Zeroizing::new(serde_json::to_vec(value)?);
        let blob = key.seal(&plaintext)?;
        let mut wrapper = serde_json::Map::new();
        wrapper.insert(SEALED_KEY.to_string(), serde_json::to_value(blob)?);
        *value = Value::Object(wrapper);
    }
    Ok(sealed)
}

/// Opens every sealed field.
fn open_fields(key: &SecretKey, config: &ProviderConfig) -> Result<ProviderConfig, StoreError> {
    let mut opened = config.clone();
    for (_, value) in opened.iter_mut() {
        if let Some(blob) = sealed_blob(value) {
            let plaintext = key.open(&blob)?;
            *value = serde_json::from_slice(&plaintext)?;
        }
    }
    Ok(opened)
}

// ============================================================================
// Validation
// ============================================================================

/// Checks required fields and the shape of well-known fields.
pub fn validate_provider_config(
    provider: &str,
    config: &ProviderConfig,
    required: &[String],
) -> Result<(), StoreError> {
    for field in required {
        if !config.has_value(field) {
            return Err(StoreError::Config(format!(
                "{provider}: missing required field '{field}'"
            )));
        }
    }

    if let Some(value) = config.get("base_url").filter(|v| !v.is_null()) {
        let raw = value
            .as_str()
            .ok_or_else(|| StoreError::Config(format!("{provider}: base_url must be a string")))?;
        let url = Url::parse(raw)
            .map_err(|e| StoreError::Config(format!("{provider}: invalid base_url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(StoreError::Config(format!(
                "{provider}: base_url must use http or https"
            )));
        }
    }

    for field in ["timeout_secs", "max_requests_per_window"] {
        if let Some(value) = config.get(field).filter(|v| !v.is_null()) {
            if !value.as_u64().is_some_and(|n| n > 0) {
                warn!(provider = %provider, field = field, "Rejected non-positive value");
                return Err(StoreError::Config(format!(
                    "{provider}: {field} must be a positive integer"
                )));
            }
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn open_store() -> (TempDir, AppPaths, SecureConfigStore) {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(dir.path());
        let store = SecureConfigStore::open(&paths).await.unwrap();
        (dir, paths, store)
    }

    fn openai_config() -> ProviderConfig {
        ProviderConfig::new()
            .with("api_key", "sk-test-123")
            .with("model", "gpt-4o-mini")
    }

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let (_dir, _paths, store) = open_store().await;
        assert_eq!(store.snapshot().await, ConfigDocument::default());
    }

    #[tokio::test]
    async fn test_configure_persists_and_reloads() {
        let (_dir, paths, store) = open_store().await;
        store.configure_provider("openai", openai_config()).await.unwrap();

        let reopened = SecureConfigStore::open(&paths).await.unwrap();
        let config = reopened.get_provider_config("openai").await.unwrap().unwrap();
        assert_eq!(config, openai_config());
    }

    #[tokio::test]
    async fn test_secrets_are_sealed_in_memory_and_on_disk() {
        let (_dir, paths, store) = open_store().await;
        store.configure_provider("openai", openai_config()).await.unwrap();

        let doc = store.snapshot().await;
        let stored = &doc.providers["openai"];
        assert!(sealed_blob(stored.get("api_key").unwrap()).is_some());
        assert_eq!(stored.get_str("model"), Some("gpt-4o-mini"));

        let raw = tokio::fs::read_to_string(paths.config_file()).await.unwrap();
        assert!(!raw.contains("sk-test-123"));
        assert!(!raw.contains("gpt-4o-mini"));
    }

    #[tokio::test]
    async fn test_required_field_missing_is_config_error() {
        let (_dir, paths, store) = open_store().await;
        store
            .register_requirements("openai", vec!["api_key".to_string()])
            .await;

        let result = store
            .configure_provider("openai", ProviderConfig::new().with("api_key", "  "))
            .await;

        assert!(matches!(result, Err(StoreError::Config(_))));
        assert!(store.get_provider_config("openai").await.unwrap().is_none());
        assert!(!paths.config_file().exists());
    }

    #[tokio::test]
    async fn test_invalid_fields_rejected() {
        let (_dir, _paths, store) = open_store().await;

        let bad_url = ProviderConfig::new().with("base_url", "ftp://example.com");
        assert!(store.configure_provider("ollama", bad_url).await.is_err());

        let bad_timeout = ProviderConfig::new().with("timeout_secs", 0);
        assert!(store.configure_provider("ollama", bad_timeout).await.is_err());

        let good = ProviderConfig::new()
            .with("base_url", "http://localhost:11434")
            .with("timeout_secs", 60);
        assert!(store.configure_provider("ollama", good).await.is_ok());
    }

    #[tokio::test]
    async fn test_reconfigure_merges_fields() {
        let (_dir, _paths, store) = open_store().await;
        store
            .register_requirements("openai", vec!["api_key".to_string()])
            .await;
        store.configure_provider("openai", openai_config()).await.unwrap();

        store
            .configure_provider("openai", ProviderConfig::new().with("model", "gpt-4o"))
            .await
            .unwrap();

        let config = store.get_provider_config("openai").await.unwrap().unwrap();
        assert_eq!(config.api_key(), Some("sk-test-123"));
        assert_eq!(config.model(), Some("gpt-4o"));

        store
            .configure_provider("openai", ProviderConfig::new().with("model", Value::Null))
            .await
            .unwrap();
        let config = store.get_provider_config("openai").await.unwrap().unwrap();
        assert_eq!(config.model(), None);
    }

    #[tokio::test]
    async fn test_remove_provider_unlinks_selection() {
        let (_dir, _paths, store) = open_store().await;
        store.configure_provider("openai", openai_config()).await.unwrap();
        store
            .set_selection(
                Some("openai".to_string()),
                vec!["openai".to_string(), "ollama".to_string()],
            )
            .await
            .unwrap();

        assert!(store.remove_provider("openai").await.unwrap());
        assert_eq!(store.active_provider().await, None);
        assert_eq!(store.fallback_chain().await, vec!["ollama".to_string()]);
        assert!(!store.remove_provider("openai").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_selection_skips_unchanged() {
        let (_dir, _paths, store) = open_store().await;
        let chain = vec!["a".to_string()];

        assert!(store.set_selection(Some("a".to_string()), chain.clone()).await.unwrap());
        assert!(!store.set_selection(Some("a".to_string()), chain).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_not_treated_as_defaults() {
        let (_dir, paths, store) = open_store().await;
        store.set_preference("privacy_filter", json!(false)).await.unwrap();

        let mut blob: EncryptedBlob = crate::persistence::load_json(&paths.config_file())
            .await
            .unwrap();
        blob.ciphertext = blob.ciphertext.chars().rev().collect();
        save_json(&paths.config_file(), &blob).await.unwrap();

        assert!(store.load_configuration().await.is_err());
        assert_eq!(store.get_preference("privacy_filter").await, Some(json!(false)));
        assert!(SecureConfigStore::open(&paths).await.is_err());
    }

    #[tokio::test]
    async fn test_export_import_restores_and_backs_up() {
        let (_dir, paths, store) = open_store().await;
        store.configure_provider("openai", openai_config()).await.unwrap();
        store.set_preference("theme", json!("dark")).await.unwrap();

        let exported = store.export_configuration().await.unwrap();
        assert_eq!(exported["version"], 1);
        assert!(exported["config"]["ciphertext"].is_string());

        store.remove_provider("openai").await.unwrap();
        store.set_preference("theme", json!("light")).await.unwrap();

        let backup = store.import_configuration(&exported).await.unwrap();
        assert!(backup.starts_with(paths.backup_dir()));
        assert!(backup.exists());

        let config = store.get_provider_config("openai").await.unwrap().unwrap();
        assert_eq!(config.api_key(), Some("sk-test-123"));
        assert_eq!(store.get_preference("theme").await, Some(json!("dark")));
    }

    #[tokio::test]
    async fn test_import_rejects_bad_shapes() {
        let (_dir, _paths, store) = open_store().await;
        let exported = store.export_configuration().await.unwrap();

        let mut no_version = exported.clone();
        no_version.as_object_mut().unwrap().remove("version");
        assert!(matches!(
            store.import_configuration(&no_version).await,
            Err(StoreError::Format(_))
        ));

        let mut wrong_version = exported.clone();
        wrong_version["version"] = json!(7);
        assert!(matches!(
            store.import_configuration(&wrong_version).await,
            Err(StoreError::Format(_))
        ));

        let mut no_config = exported.clone();
        no_config.as_object_mut().unwrap().remove("config");
        assert!(matches!(
            store.import_configuration(&no_config).await,
            Err(StoreError::Format(_))
        ));

        let partial = store.key.seal(br#"{"providers": {}}"#).unwrap();
        let missing_section = json!({ "version": 1, "config": partial });
        assert!(matches!(
            store.import_configuration(&missing_section).await,
            Err(StoreError::Format(_))
        ));
    }

    #[tokio::test]
    async fn test_import_from_other_key_fails_without_changes() {
        let (_dir, _paths, store) = open_store().await;
        let (_other_dir, _other_paths, other) = open_store().await;
        other.set_preference("theme", json!("dark")).await.unwrap();
        let foreign = other.export_configuration().await.unwrap();

        assert!(matches!(
            store.import_configuration(&foreign).await,
            Err(StoreError::Crypto(_))
        ));
        assert_eq!(store.get_preference("theme").await, None);
    }
}
