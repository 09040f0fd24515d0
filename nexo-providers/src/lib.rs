// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Nexo Providers
//!
//! Vendor adapters implementing [`nexo_core::TextProvider`].
//!
//! Each adapter module includes:
//!
//! - **Descriptor**: Static metadata, default endpoint and price table
//! - **Request building**: Vendor-shaped JSON bodies and auth headers
//! - **Parsing**: Text and token usage extraction
//!
//! ## Supported Providers
//!
//! | Provider | Auth | Local | Priority |
//! |----------|------|-------|----------|
//! | OpenAI | Bearer | ❌ | 10 |
//! | Anthropic | x-api-key | ❌ | 20 |
//! | Ollama | none | ✅ | 30 |
//!
//! ## Usage
//!
//! ```ignore
//! use nexo_providers::ProviderRegistry;
//!
//! for registration in ProviderRegistry::registrations() {
//!     manager.register(registration);
//! }
//! ```

pub mod adapter;
pub mod anthropic;
pub mod descriptor;
pub mod ollama;
pub mod openai;
pub mod registry;

pub use adapter::{AdapterCore, RequestContext};
pub use anthropic::{ANTHROPIC, AnthropicProvider};
pub use descriptor::{PriceEntry, ProviderDescriptor};
pub use ollama::{OLLAMA, OllamaProvider};
pub use openai::{OPENAI, OpenAiProvider};
pub use registry::ProviderRegistry;
