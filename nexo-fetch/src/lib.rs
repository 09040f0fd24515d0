// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Nexo Fetch
//!
//! Request plumbing shared by the manager and the vendor adapters.
//!
//! ## Fallback Execution
//!
//! - [`FallbackExecutor`] - Tries an operation against candidates in order
//! - [`FallbackOutcome`] / [`FallbackAttempt`] - Result plus attempt log
//!
//! ## Throttling
//!
//! - [`FixedWindowLimiter`] - Per-provider fixed-window request cap
//!
//! ## HTTP
//!
//! - [`HttpClient`] - reqwest wrapper with tracing and a domain allowlist
//!
//! ## Example
//!
//! ```ignore
//! use nexo_fetch::FallbackExecutor;
//!
//! let outcome = FallbackExecutor::new()
//!     .execute(&candidates, |name| async move { call(name).await })
//!     .await;
//! ```

pub mod error;
pub mod fallback;
pub mod http;
pub mod rate_limit;

pub use error::{FallbackError, HttpError};
pub use fallback::{FallbackAttempt, FallbackCandidate, FallbackExecutor, FallbackOutcome};
pub use http::{HttpClient, ResponseExt};
pub use rate_limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW, FixedWindowLimiter};
