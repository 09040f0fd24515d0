//! Application data directory layout.
//!
//! [`AppPaths`] is built once at startup and handed to every component
//! that touches disk. Tests build their own pointing at a temp dir.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "NEXO_DATA_DIR";

const APP_DIR_NAME: &str = "nexo";
const CONFIG_FILE: &str = "config.enc.json";
const KEY_FILE: &str = "config.key";
const COST_DATA_FILE: &str = "cost_data.json";
const COST_LIMITS_FILE: &str = "cost_limits.json";
const BACKUP_DIR: &str = "backups";

/// Resolved file locations under the application data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    data_dir: PathBuf,
}

impl AppPaths {
    /// Uses `data_dir` as the root for all files.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Resolves the data directory from the environment.
    ///
    /// - `NEXO_DATA_DIR` if set and non-empty
    /// - Linux: `~/.config/nexo`
    /// - macOS: `~/Library/Application Support/nexo`
    /// - Windows: `%APPDATA%\nexo`
    pub fn from_env() -> Self {
        let data_dir = std::env::var_os(DATA_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map_or_else(default_data_dir, PathBuf::from);
        debug!(path = %data_dir.display(), "Resolved data directory");
        Self { data_dir }
    }

    /// Root data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Encrypted configuration document.
    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    /// Local symmetric key.
    pub fn key_file(&self) -> PathBuf {
        self.data_dir.join(KEY_FILE)
    }

    /// Persisted cost ledgers.
    pub fn cost_data_file(&self) -> PathBuf {
        self.data_dir.join(COST_DATA_FILE)
    }

    /// Persisted cost limits.
    pub fn cost_limits_file(&self) -> PathBuf {
        self.data_dir.join(COST_LIMITS_FILE)
    }

    /// Directory holding configuration backups taken before imports.
    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join(BACKUP_DIR)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::config_dir()
        .map_or_else(|| PathBuf::from("."), |c| c.join(APP_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = AppPaths::new("/tmp/nexo-test");
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/nexo-test/config.enc.json"));
        assert_eq!(paths.key_file(), PathBuf::from("/tmp/nexo-test/config.key"));
        assert_eq!(paths.cost_data_file(), PathBuf::from("/tmp/nexo-test/cost_data.json"));
        assert_eq!(paths.cost_limits_file(), PathBuf::from("/tmp/nexo-test/cost_limits.json"));
        assert_eq!(paths.backup_dir(), PathBuf::from("/tmp/nexo-test/backups"));
    }

    #[test]
    fn test_from_env_yields_a_directory() {
        let paths = AppPaths::from_env();
        assert!(!paths.data_dir().as_os_str().is_empty());
    }
}
