//! Provider health and lifecycle types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a registered provider.
///
/// `Initialized -> Available | Unavailable`. An available provider drops to
/// unavailable on a failed generation attempt or health probe; only a
/// successful health probe brings it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderState {
    /// Created and initialized, not yet probed.
    #[default]
    Initialized,
    /// Passed its last health probe.
    Available,
    /// Failed initialization, configuration, a probe or a generation call.
    Unavailable,
}

impl ProviderState {
    /// Returns true for [`ProviderState::Available`].
    pub fn is_available(self) -> bool {
        self == Self::Available
    }
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized => write!(f, "initialized"),
            Self::Available => write!(f, "available"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Result of the most recent health probe for a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    /// Whether the probe succeeded.
    pub healthy: bool,
    /// When the probe ran.
    pub checked_at: DateTime<Utc>,
    /// Probe duration.
    pub latency_ms: u64,
    /// Failure reason, if any.
    pub error: Option<String>,
}

impl HealthRecord {
    /// Record for a passing probe.
    pub fn healthy(checked_at: DateTime<Utc>, latency_ms: u64) -> Self {
        Self {
            healthy: true,
            checked_at,
            latency_ms,
            error: None,
        }
    }

    /// Record for a failing probe.
    pub fn unhealthy(checked_at: DateTime<Utc>, latency_ms: u64, error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            checked_at,
            latency_ms,
            error: Some(error.into()),
        }
    }
}
