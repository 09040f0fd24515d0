// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Nexo Manager
//!
//! Orchestration over registered text-generation providers.
//!
//! This crate provides:
//!
//! - **ProviderManager**: Registration, selection, fallback and cost charging
//! - **HealthMonitor**: Periodic connectivity probing
//! - **AppContext**: Paths, tunables and the event bus, built once at startup
//!
//! ## Usage
//!
//! ```ignore
//! use nexo_manager::{AppContext, ProviderManager};
//! use nexo_providers::ProviderRegistry;
//!
//! let ctx = AppContext::from_env();
//! let manager = ProviderManager::open(&ctx).await?;
//! manager.initialize(ProviderRegistry::registrations()).await;
//! manager.load_configuration().await?;
//! manager.start_background_tasks().await;
//!
//! let result = manager
//!     .generate_suggestion("Summarize this", &GenerationOptions::new())
//!     .await?;
//! println!("{} via {}", result.suggestion.text, result.provider);
//! ```

pub mod context;
pub mod error;
pub mod health;
pub mod manager;

pub use context::{AppContext, DEFAULT_HEALTH_CHECK_INTERVAL, ManagerSettings, PRIVACY_FILTER_PREFERENCE};
pub use error::ManagerError;
pub use health::HealthMonitor;
pub use manager::{ManagerStats, ProviderManager, ProviderStatus, ProviderSuggestion};
