//! Provider registry.
//!
//! Static lookup of every built-in backend and the factory that turns a
//! descriptor into a live adapter for the manager.

use std::sync::Arc;

use nexo_core::{ProviderRegistration, TextProvider};

use crate::anthropic::{ANTHROPIC, AnthropicProvider};
use crate::descriptor::ProviderDescriptor;
use crate::ollama::{OLLAMA, OllamaProvider};
use crate::openai::{OPENAI, OpenAiProvider};

// ============================================================================
// Static Registry
// ============================================================================

/// Built-in descriptors in priority order.
static DESCRIPTORS: [&ProviderDescriptor; 3] = [&OPENAI, &ANTHROPIC, &OLLAMA];

// ============================================================================
// Provider Registry
// ============================================================================

/// Registry of built-in providers.
pub struct ProviderRegistry;

impl ProviderRegistry {
    /// Returns all provider descriptors.
    pub fn all() -> &'static [&'static ProviderDescriptor] {
        &DESCRIPTORS
    }

    /// Gets a descriptor by name.
    pub fn get(name: &str) -> Option<&'static ProviderDescriptor> {
        Self::all().iter().copied().find(|d| d.name == name)
    }

    /// Returns the names of all built-in providers.
    pub fn names() -> Vec<&'static str> {
        Self::all().iter().map(|d| d.name).collect()
    }

    /// Creates a fresh, unconfigured adapter by name.
    pub fn create(name: &str) -> Option<Arc<dyn TextProvider>> {
        let provider: Arc<dyn TextProvider> = match name {
            "openai" => Arc::new(OpenAiProvider::new()),
            "anthropic" => Arc::new(AnthropicProvider::new()),
            "ollama" => Arc::new(OllamaProvider::new()),
            _ => return None,
        };
        Some(provider)
    }

    /// One registration per built-in provider, ready for the manager.
    pub fn registrations() -> Vec<ProviderRegistration> {
        Self::all()
            .iter()
            .filter_map(|d| Self::create(d.name).map(|p| ProviderRegistration::new(d.priority, p)))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
