//! Explicit application context.
//!
//! Built once at startup and handed to every component that needs paths,
//! tunables or the event bus. Tests build as many independent contexts as
//! they like.

use std::time::Duration;

use nexo_core::{DEFAULT_PROVIDER_TIMEOUT, EventBus};
use nexo_store::{AppPaths, DEFAULT_ALERT_COOLDOWN, DEFAULT_FLUSH_INTERVAL, KeySource};

/// Default period between health sweeps.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Preference key that turns the privacy filter off when set to `false`.
pub const PRIVACY_FILTER_PREFERENCE: &str = "privacy_filter";

/// Runtime tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerSettings {
    /// Period between health sweeps.
    pub health_check_interval: Duration,
    /// Period between ledger flushes.
    pub flush_interval: Duration,
    /// Timeout for providers that do not report their own.
    pub default_timeout: Duration,
    /// Minimum gap between cost alerts for one provider.
    pub alert_cooldown: Duration,
    /// Whether prompts are redacted before leaving the process.
    pub privacy_filter: bool,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            default_timeout: DEFAULT_PROVIDER_TIMEOUT,
            alert_cooldown: DEFAULT_ALERT_COOLDOWN,
            privacy_filter: true,
        }
    }
}

/// Paths, key backend, settings and the event bus.
#[derive(Debug, Clone)]
pub struct AppContext {
    /// Data directory layout.
    pub paths: AppPaths,
    /// Where the configuration key lives.
    pub key_source: KeySource,
    /// Tunables.
    pub settings: ManagerSettings,
    /// Notification channel shared by every component.
    pub events: EventBus,
}

impl AppContext {
    /// Creates a context rooted at `paths` with default settings and the
    /// key file under `paths`.
    pub fn new(paths: AppPaths) -> Self {
        Self {
            key_source: KeySource::File(paths.key_file()),
            paths,
            settings: ManagerSettings::default(),
            events: EventBus::new(),
        }
    }

    /// Creates a context from the environment: `NEXO_DATA_DIR` (or the
    /// platform config directory) and `NEXO_KEY_STORE`.
    pub fn from_env() -> Self {
        let paths = AppPaths::from_env();
        let key_source = KeySource::from_env(&paths);
        Self::new(paths).with_key_source(key_source)
    }

    /// Replaces the key backend.
    #[must_use]
    pub fn with_key_source(mut self, key_source: KeySource) -> Self {
        self.key_source = key_source;
        self
    }

    /// Replaces the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ManagerSettings) -> Self {
        self.settings = settings;
        self
    }
}
