// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Nexo Store
//!
//! Durable state for Nexo.
//!
//! This crate provides:
//!
//! - **SecureConfigStore**: Encrypted provider settings and preferences
//! - **CostTracker**: Per-provider spend ledgers with threshold alerts
//! - **AppPaths**: Explicit data-directory context
//! - **Persistence**: Atomic, owner-only JSON file I/O
//!
//! ## Usage
//!
//! ```ignore
//! use nexo_store::{AppPaths, CostTracker, SecureConfigStore};
//!
//! let paths = AppPaths::from_env();
//! let config = SecureConfigStore::open(&paths).await?;
//! let costs = CostTracker::open(&paths, events.clone()).await?;
//!
//! config.configure_provider("openai", provider_config).await?;
//! costs.track_usage("openai", "suggestion", 0.002, 350).await;
//! ```

pub mod clock;
pub mod config_store;
pub mod cost_tracker;
pub mod crypto;
pub mod error;
pub mod key_store;
pub mod paths;
pub mod persistence;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config_store::{
    ConfigDocument, EXPORT_VERSION, ExportDocument, SecureConfigStore, validate_provider_config,
};
pub use cost_tracker::{
    CostLedger, CostLimit, CostTracker, DEFAULT_ALERT_COOLDOWN, DEFAULT_ALERT_THRESHOLD,
    DEFAULT_FLUSH_INTERVAL, LimitStatus, OperationBreakdown, PeriodStats, UsageBucket, UsageStats,
    day_key, month_key,
};
pub use crypto::{ALGORITHM, EncryptedBlob, SecretKey};
pub use error::{CryptoError, StoreError};
pub use key_store::{KEY_STORE_ENV, KeySource};
pub use paths::{AppPaths, DATA_DIR_ENV};
pub use persistence::{load_json, load_json_optional, save_json};
