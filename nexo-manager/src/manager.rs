//! Provider manager.
//!
//! Owns every registered provider, their health, the active provider and
//! the fallback chain. It is the single entry point for generating a
//! suggestion: prompts are redacted, tried across the chain in priority
//! order, and the winning call is charged to the cost ledger.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use nexo_core::{
    EventBus, FilteredPrompt, GenerationOptions, HealthRecord, NexoEvent, PrivacyFilter,
    PrivacyReport, ProviderConfig, ProviderError, ProviderInfo, ProviderRegistration,
    ProviderState, Suggestion, TextProvider,
};
use nexo_fetch::{FallbackAttempt, FallbackCandidate, FallbackExecutor};
use nexo_store::{CostLimit, CostTracker, SecureConfigStore, UsageStats};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, info, instrument, warn};

use crate::context::{AppContext, ManagerSettings, PRIVACY_FILTER_PREFERENCE};
use crate::error::ManagerError;
use crate::health::HealthMonitor;

// ============================================================================
// Registration Entry
// ============================================================================

#[derive(Clone)]
struct ProviderEntry {
    instance: Arc<dyn TextProvider>,
    priority: i32,
    state: ProviderState,
    initialized: bool,
    configured: bool,
    last_health_check: Option<DateTime<Utc>>,
    /// Last applied configuration, credentials masked.
    config: ProviderConfig,
    error: Option<String>,
}

impl ProviderEntry {
    fn is_available(&self) -> bool {
        self.state.is_available()
    }
}

#[derive(Debug, Clone, Default)]
struct Selection {
    active: Option<String>,
    chain: Vec<String>,
}

/// One provider as tried by the fallback executor.
struct Candidate {
    name: String,
    instance: Arc<dyn TextProvider>,
}

impl FallbackCandidate for Candidate {
    fn id(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Public Views
// ============================================================================

/// Snapshot of one registered provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    /// Registration key.
    pub name: String,
    /// Static ordering, lower first.
    pub priority: i32,
    /// Lifecycle state.
    pub state: ProviderState,
    /// Whether a configuration has been applied.
    pub configured: bool,
    /// Whether this is the active provider.
    pub active: bool,
    /// When the last health probe ran.
    pub last_health_check: Option<DateTime<Utc>>,
    /// Last initialization, configuration or generation error.
    pub error: Option<String>,
    /// Applied configuration with credentials masked.
    pub config: ProviderConfig,
    /// Last health probe result.
    pub health: Option<HealthRecord>,
    /// Metadata reported by the provider.
    pub info: ProviderInfo,
}

impl ProviderStatus {
    /// Shorthand for `state == Available`.
    pub fn is_available(&self) -> bool {
        self.state.is_available()
    }
}

/// Aggregate usage, cost and health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStats {
    /// Active provider.
    pub active_provider: Option<String>,
    /// Current fallback chain.
    pub fallback_chain: Vec<String>,
    /// Every registered provider, by priority.
    pub providers: Vec<ProviderStatus>,
    /// Ledger summaries keyed by provider.
    pub usage: BTreeMap<String, UsageStats>,
    /// Spend across providers this month (USD).
    pub total_cost_this_month: f64,
    /// Spend across providers ever tracked (USD).
    pub total_cost: f64,
}

/// A suggestion tagged with the provider that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSuggestion {
    /// Provider that served the request.
    pub provider: String,
    /// The provider's result.
    pub suggestion: Suggestion,
    /// Every attempt made, in order, ending with the successful one.
    pub attempts: Vec<FallbackAttempt>,
    /// Redactions applied to the prompt.
    pub redactions: PrivacyReport,
}

// ============================================================================
// Provider Manager
// ============================================================================

/// Top-level orchestrator.
pub struct ProviderManager {
    entries: RwLock<BTreeMap<String, ProviderEntry>>,
    health: RwLock<HashMap<String, HealthRecord>>,
    selection: RwLock<Selection>,
    config: Arc<SecureConfigStore>,
    costs: Arc<CostTracker>,
    events: EventBus,
    settings: ManagerSettings,
    privacy: PrivacyFilter,
    executor: FallbackExecutor,
    monitor: Mutex<Option<HealthMonitor>>,
}

impl std::fmt::Debug for ProviderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderManager")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ProviderManager {
    /// Creates a manager over existing stores.
    pub fn new(
        config: Arc<SecureConfigStore>,
        costs: Arc<CostTracker>,
        events: EventBus,
        settings: ManagerSettings,
    ) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            health: RwLock::new(HashMap::new()),
            selection: RwLock::new(Selection::default()),
            config,
            costs,
            events,
            settings,
            privacy: PrivacyFilter::new(),
            executor: FallbackExecutor::new(),
            monitor: Mutex::new(None),
        }
    }

    /// Opens the configuration store with `ctx.key_source` and the cost
    /// ledgers under `ctx.paths`.
    pub async fn open(ctx: &AppContext) -> Result<Arc<Self>, ManagerError> {
        let config = SecureConfigStore::open_with_key_source(&ctx.paths, &ctx.key_source).await?;
        let costs = CostTracker::new(&ctx.paths, ctx.events.clone())
            .with_alert_cooldown(ctx.settings.alert_cooldown);
        costs.load().await?;

        Ok(Arc::new(Self::new(
            Arc::new(config),
            Arc::new(costs),
            ctx.events.clone(),
            ctx.settings.clone(),
        )))
    }

    /// The configuration store.
    pub fn config_store(&self) -> &Arc<SecureConfigStore> {
        &self.config
    }

    /// The cost tracker.
    pub fn cost_tracker(&self) -> &Arc<CostTracker> {
        &self.costs
    }

    /// Tunables in effect.
    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Subscribes to alerts, health and configuration events.
    pub fn subscribe(&self) -> broadcast::Receiver<NexoEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // Startup
    // ========================================================================

    /// Registers and initializes providers.
    ///
    /// A provider whose `initialize()` fails is still registered, marked
    /// unavailable with the error recorded; startup continues.
    #[instrument(skip_all, fields(count = registrations.len()))]
    pub async fn initialize(&self, registrations: Vec<ProviderRegistration>) {
        for registration in registrations {
            let ProviderRegistration {
                name,
                priority,
                instance,
            } = registration;

            if self.entries.read().await.contains_key(&name) {
                warn!(provider = %name, "Duplicate provider registration ignored");
                continue;
            }

            let info = instance.provider_info();
            self.config
                .register_requirements(&name, info.required_fields)
                .await;

            let (state, error) = match instance.initialize().await {
                Ok(()) => (ProviderState::Initialized, None),
                Err(e) => {
                    warn!(provider = %name, error = %e, "Provider failed to initialize");
                    (ProviderState::Unavailable, Some(e.to_string()))
                }
            };
            let initialized = error.is_none();

            debug!(provider = %name, priority, state = %state, "Provider registered");
            self.entries.write().await.insert(
                name,
                ProviderEntry {
                    instance,
                    priority,
                    state,
                    initialized,
                    configured: false,
                    last_health_check: None,
                    config: ProviderConfig::new(),
                    error,
                },
            );
        }

        info!(providers = self.entries.read().await.len(), "Providers initialized");
    }

    /// Applies stored configurations, probes health and restores the
    /// selection.
    ///
    /// Providers without required fields are configured with an empty
    /// configuration when nothing is stored for them. A provider with
    /// required fields and nothing stored, or whose stored configuration
    /// cannot be read or applied, is taken out of rotation until it is
    /// configured again.
    #[instrument(skip(self))]
    pub async fn load_configuration(&self) -> Result<(), ManagerError> {
        for (name, instance) in self.initialized_instances().await {
            let stored = match self.config.get_provider_config(&name).await {
                Ok(stored) => stored,
                Err(e) => {
                    warn!(provider = %name, error = %e, "Stored configuration unreadable");
                    self.unconfigure(&name, Some(e.to_string())).await;
                    continue;
                }
            };

            let config = match stored {
                Some(config) => config,
                None if instance.provider_info().required_fields.is_empty() => {
                    ProviderConfig::new()
                }
                None => {
                    self.unconfigure(&name, None).await;
                    continue;
                }
            };

            if let Err(e) = self.apply_config(&name, &instance, config).await {
                warn!(provider = %name, error = %e, "Stored configuration rejected");
                self.unconfigure(&name, Some(e.to_string())).await;
            }
        }

        self.probe_all().await;

        let doc = self.config.snapshot().await;
        {
            let entries = self.entries.read().await;
            let mut selection = self.selection.write().await;
            selection.active = doc
                .active_provider
                .filter(|name| entries.contains_key(name));
            selection.chain = doc
                .fallback_chain
                .into_iter()
                .filter(|name| entries.contains_key(name))
                .collect();
        }

        self.setup_fallback_chain().await;
        Ok(())
    }

    // ========================================================================
    // Fallback Chain
    // ========================================================================

    /// Recomputes the chain from available providers by ascending priority.
    ///
    /// When no provider is active, the head of the chain becomes active.
    /// The selection is persisted if it changed.
    pub async fn setup_fallback_chain(&self) -> Vec<String> {
        let mut available: Vec<(i32, String)> = self
            .entries
            .read()
            .await
            .iter()
            .filter(|(_, e)| e.is_available())
            .map(|(name, e)| (e.priority, name.clone()))
            .collect();
        available.sort();
        let chain: Vec<String> = available.into_iter().map(|(_, name)| name).collect();

        let (active, promoted) = {
            let mut selection = self.selection.write().await;
            selection.chain.clone_from(&chain);
            let promoted = selection.active.is_none() && !chain.is_empty();
            if promoted {
                selection.active = chain.first().cloned();
            }
            (selection.active.clone(), promoted)
        };

        if promoted {
            info!(provider = ?active, "Active provider set from fallback chain");
            self.events.emit(NexoEvent::ActiveProviderChanged {
                provider: active.clone(),
            });
        }

        if let Err(e) = self.config.set_selection(active, chain.clone()).await {
            warn!(error = %e, "Failed to persist provider selection");
        }

        debug!(chain = ?chain, "Fallback chain updated");
        chain
    }

    /// Candidate order for one request: the active provider when it is
    /// available, then the rest of the chain.
    async fn candidates(&self) -> Vec<Candidate> {
        let selection = self.selection.read().await.clone();
        let entries = self.entries.read().await;

        let available = |name: &String| entries.get(name).filter(|e| e.is_available());
        selection
            .active
            .iter()
            .chain(selection.chain.iter().filter(|n| Some(*n) != selection.active.as_ref()))
            .filter_map(|name| {
                available(name).map(|entry| Candidate {
                    name: name.clone(),
                    instance: Arc::clone(&entry.instance),
                })
            })
            .collect()
    }

    // ========================================================================
    // Generation
    // ========================================================================

    /// Generates a suggestion, falling back across available providers.
    ///
    /// The candidate list is taken once when the request starts. Every
    /// failed candidate is marked unavailable until a health probe
    /// succeeds. Fails with [`ManagerError::AllProvidersUnavailable`] when
    /// there is nothing to try or everything failed.
    #[instrument(skip(self, prompt, options), fields(operation = %options.operation_type))]
    pub async fn generate_suggestion(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<ProviderSuggestion, ManagerError> {
        let filtered = if self.privacy_enabled().await {
            self.privacy.apply(prompt, options)
        } else {
            FilteredPrompt {
                prompt: prompt.to_string(),
                options,
                report: PrivacyReport::default(),
            }
        };

        let candidates = self.candidates().await;
        if candidates.is_empty() {
            warn!("No available providers");
            return Err(ManagerError::AllProvidersUnavailable {
                attempts: Vec::new(),
            });
        }

        let prompt = filtered.prompt.as_str();
        let options = filtered.options;
        let default_timeout = self.settings.default_timeout;

        let outcome = self
            .executor
            .execute(&candidates, |candidate| {
                let instance = Arc::clone(&candidate.instance);
                async move {
                    let limit = effective_timeout(instance.timeout(), default_timeout);
                    match tokio::time::timeout(limit, instance.generate_suggestion(prompt, options))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(ProviderError::Timeout(limit)),
                    }
                }
            })
            .await;

        let failures: Vec<(String, String)> = outcome
            .attempts
            .iter()
            .filter(|a| !a.success)
            .map(|a| (a.candidate.clone(), a.error.clone().unwrap_or_default()))
            .collect();
        for (name, error) in &failures {
            self.mark_unavailable(name, error).await;
        }
        if !failures.is_empty() {
            self.setup_fallback_chain().await;
        }

        let provider = outcome.successful_candidate().map(str::to_string);
        match (outcome.result, provider) {
            (Ok(suggestion), Some(provider)) => {
                self.costs
                    .track_usage(
                        &provider,
                        &options.operation_type,
                        suggestion.cost_estimate,
                        suggestion.total_tokens(),
                    )
                    .await;
                info!(
                    provider = %provider,
                    attempts = outcome.attempts.len(),
                    latency_ms = suggestion.latency_ms,
                    "Suggestion generated"
                );
                Ok(ProviderSuggestion {
                    provider,
                    suggestion,
                    attempts: outcome.attempts,
                    redactions: filtered.report,
                })
            }
            _ => Err(ManagerError::AllProvidersUnavailable {
                attempts: outcome.attempts,
            }),
        }
    }

    async fn privacy_enabled(&self) -> bool {
        self.settings.privacy_filter
            && self
                .config
                .get_preference(PRIVACY_FILTER_PREFERENCE)
                .await
                .and_then(|v| v.as_bool())
                .unwrap_or(true)
    }

    async fn mark_unavailable(&self, name: &str, error: &str) {
        let flipped = {
            let mut entries = self.entries.write().await;
            let Some(entry) = entries.get_mut(name) else {
                return;
            };
            entry.error = Some(error.to_string());
            let was_available = entry.is_available();
            entry.state = ProviderState::Unavailable;
            was_available
        };

        if flipped {
            info!(provider = %name, "Provider marked unavailable after failed call");
            self.events.emit(NexoEvent::ProviderHealthChanged {
                provider: name.to_string(),
                available: false,
            });
        }
    }

    // ========================================================================
    // Health
    // ========================================================================

    /// Probes one provider and records the result. Never fails.
    ///
    /// Returns whether the provider is healthy. Unknown and unconfigured
    /// providers report unhealthy. The chain is recomputed when the
    /// provider's availability changed.
    #[instrument(skip(self))]
    pub async fn test_provider_health(&self, name: &str) -> bool {
        let (healthy, flipped) = self.probe_provider(name).await;
        if flipped {
            self.setup_fallback_chain().await;
        }
        healthy
    }

    /// Probes one provider without touching the chain.
    ///
    /// Returns whether it is healthy and whether its availability flipped.
    async fn probe_provider(&self, name: &str) -> (bool, bool) {
        let Some((instance, configured)) = self
            .entries
            .read()
            .await
            .get(name)
            .map(|e| (Arc::clone(&e.instance), e.configured))
        else {
            return (false, false);
        };

        let checked_at = Utc::now();
        let started = Instant::now();
        let failure = if configured {
            let limit = effective_timeout(instance.timeout(), self.settings.default_timeout);
            match tokio::time::timeout(limit, instance.test_connection()).await {
                Ok(true) => None,
                Ok(false) => Some("connection test failed".to_string()),
                Err(_) => Some(format!("health check timed out after {limit:?}")),
            }
        } else {
            Some("not configured".to_string())
        };
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let healthy = failure.is_none();

        let record = match failure {
            None => HealthRecord::healthy(checked_at, latency_ms),
            Some(reason) => HealthRecord::unhealthy(checked_at, latency_ms, reason),
        };
        self.health.write().await.insert(name.to_string(), record);

        let flipped = {
            let mut entries = self.entries.write().await;
            let Some(entry) = entries.get_mut(name) else {
                return (healthy, false);
            };
            let was_available = entry.is_available();
            entry.last_health_check = Some(checked_at);
            entry.state = if healthy {
                ProviderState::Available
            } else {
                ProviderState::Unavailable
            };
            was_available != healthy
        };

        if flipped {
            info!(provider = %name, available = healthy, "Provider availability changed");
            self.events.emit(NexoEvent::ProviderHealthChanged {
                provider: name.to_string(),
                available: healthy,
            });
        } else {
            debug!(provider = %name, healthy, latency_ms, "Health probe finished");
        }
        (healthy, flipped)
    }

    async fn probe_all(&self) {
        let names: Vec<String> = self.entries.read().await.keys().cloned().collect();
        join_all(names.iter().map(|name| self.probe_provider(name))).await;
    }

    /// Probes every provider, then recomputes the chain.
    pub async fn run_health_sweep(&self) {
        self.probe_all().await;
        let chain = self.setup_fallback_chain().await;
        debug!(available = chain.len(), "Health sweep finished");
    }

    /// Health record of one provider.
    pub async fn health_of(&self, name: &str) -> Option<HealthRecord> {
        self.health.read().await.get(name).cloned()
    }

    // ========================================================================
    // Background Tasks
    // ========================================================================

    /// Starts the health monitor and periodic ledger flushing.
    pub async fn start_background_tasks(self: &Arc<Self>) {
        let monitor = HealthMonitor::start(self, self.settings.health_check_interval);
        if let Some(previous) = self.monitor.lock().await.replace(monitor) {
            previous.stop();
        }
        self.costs.start_auto_flush(self.settings.flush_interval).await;
    }

    /// Stops background tasks and flushes ledgers.
    pub async fn shutdown(&self) -> Result<(), ManagerError> {
        if let Some(monitor) = self.monitor.lock().await.take() {
            monitor.stop();
        }
        self.costs.shutdown().await?;
        info!("Provider manager shut down");
        Ok(())
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Validates, stores and applies a provider configuration, then
    /// re-probes the provider and recomputes the chain.
    ///
    /// Fields in `config` are merged over the stored ones; `null` removes
    /// a field.
    #[instrument(skip(self, config))]
    pub async fn configure_provider(
        &self,
        name: &str,
        config: ProviderConfig,
    ) -> Result<(), ManagerError> {
        let instance = self.instance(name).await?;
        self.ensure_initialized(name, &instance).await?;
        self.config.configure_provider(name, config).await?;
        let merged = self
            .config
            .get_provider_config(name)
            .await?
            .unwrap_or_default();
        self.apply_config(name, &instance, merged).await?;

        self.events.emit(NexoEvent::ProviderConfigured {
            provider: name.to_string(),
        });
        self.probe_provider(name).await;
        self.setup_fallback_chain().await;
        Ok(())
    }

    async fn apply_config(
        &self,
        name: &str,
        instance: &Arc<dyn TextProvider>,
        config: ProviderConfig,
    ) -> Result<(), ProviderError> {
        let redacted = config.redacted();
        let result = instance.configure(config).await;

        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(name) {
            match &result {
                Ok(()) => {
                    entry.configured = true;
                    entry.config = redacted;
                    entry.error = None;
                }
                Err(e) => entry.error = Some(e.to_string()),
            }
        }
        result
    }

    /// Retries `initialize()` for a provider that failed it at startup.
    async fn ensure_initialized(
        &self,
        name: &str,
        instance: &Arc<dyn TextProvider>,
    ) -> Result<(), ProviderError> {
        let initialized = self
            .entries
            .read()
            .await
            .get(name)
            .is_some_and(|e| e.initialized);
        if initialized {
            return Ok(());
        }

        if let Err(e) = instance.initialize().await {
            self.record_error(name, e.to_string()).await;
            return Err(e);
        }
        if let Some(entry) = self.entries.write().await.get_mut(name) {
            entry.initialized = true;
            entry.error = None;
        }
        debug!(provider = %name, "Provider initialized on configure");
        Ok(())
    }

    async fn record_error(&self, name: &str, error: String) {
        if let Some(entry) = self.entries.write().await.get_mut(name) {
            entry.error = Some(error);
        }
    }

    /// Drops the applied configuration and marks the provider unavailable.
    ///
    /// `error` replaces the recorded error when given.
    async fn unconfigure(&self, name: &str, error: Option<String>) {
        let was_available = {
            let mut entries = self.entries.write().await;
            entries.get_mut(name).is_some_and(|entry| {
                let was_available = entry.is_available();
                entry.configured = false;
                entry.config = ProviderConfig::new();
                entry.state = ProviderState::Unavailable;
                if error.is_some() {
                    entry.error = error;
                }
                was_available
            })
        };

        if was_available {
            info!(provider = %name, "Provider taken out of rotation");
            self.events.emit(NexoEvent::ProviderHealthChanged {
                provider: name.to_string(),
                available: false,
            });
        }
    }

    /// Makes `name` the active provider. It must be available.
    pub async fn set_active_provider(&self, name: &str) -> Result<(), ManagerError> {
        let available = self
            .entries
            .read()
            .await
            .get(name)
            .map(ProviderEntry::is_available)
            .ok_or_else(|| ManagerError::ProviderNotFound(name.to_string()))?;
        if !available {
            return Err(ManagerError::ProviderUnavailable(name.to_string()));
        }

        self.selection.write().await.active = Some(name.to_string());
        self.config
            .set_active_provider(Some(name.to_string()))
            .await?;

        info!(provider = %name, "Active provider changed");
        self.events.emit(NexoEvent::ActiveProviderChanged {
            provider: Some(name.to_string()),
        });
        Ok(())
    }

    /// Deletes a provider's stored configuration and takes it out of
    /// rotation. Returns false if nothing was stored.
    pub async fn remove_provider_config(&self, name: &str) -> Result<bool, ManagerError> {
        self.instance(name).await?;
        let removed = self.config.remove_provider(name).await?;
        self.unconfigure(name, None).await;

        let deactivated = {
            let mut selection = self.selection.write().await;
            let deactivated = selection.active.as_deref() == Some(name);
            if deactivated {
                selection.active = None;
            }
            deactivated
        };
        if deactivated {
            self.events
                .emit(NexoEvent::ActiveProviderChanged { provider: None });
        }

        self.setup_fallback_chain().await;
        info!(provider = %name, removed, "Provider configuration removed");
        Ok(removed)
    }

    /// Sets a monthly spend limit for a provider.
    pub async fn set_cost_limit(
        &self,
        name: &str,
        monthly_limit: f64,
        alert_threshold: f64,
    ) -> Result<CostLimit, ManagerError> {
        self.instance(name).await?;
        self.costs
            .set_cost_limit(name, monthly_limit, alert_threshold)
            .await?;
        self.costs
            .get_cost_limit(name)
            .await
            .ok_or_else(|| ManagerError::Config(format!("limit for {name} was not stored")))
    }

    /// Exports the encrypted configuration document.
    pub async fn export_configuration(&self) -> Result<Value, ManagerError> {
        Ok(self.config.export_configuration().await?)
    }

    /// Imports an exported document, backing up the current one, then
    /// reapplies every provider configuration. Returns the backup path.
    pub async fn import_configuration(&self, data: &Value) -> Result<PathBuf, ManagerError> {
        let backup = self.config.import_configuration(data).await?;
        self.selection.write().await.active = None;
        self.load_configuration().await?;
        self.events.emit(NexoEvent::ConfigurationImported);
        Ok(backup)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    async fn instance(&self, name: &str) -> Result<Arc<dyn TextProvider>, ManagerError> {
        self.entries
            .read()
            .await
            .get(name)
            .map(|e| Arc::clone(&e.instance))
            .ok_or_else(|| ManagerError::ProviderNotFound(name.to_string()))
    }

    async fn initialized_instances(&self) -> Vec<(String, Arc<dyn TextProvider>)> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|(_, e)| e.initialized)
            .map(|(name, e)| (name.clone(), Arc::clone(&e.instance)))
            .collect()
    }

    /// Active provider.
    pub async fn active_provider(&self) -> Option<String> {
        self.selection.read().await.active.clone()
    }

    /// Current fallback chain.
    pub async fn fallback_chain(&self) -> Vec<String> {
        self.selection.read().await.chain.clone()
    }

    /// Status of one provider.
    pub async fn get_provider_status(&self, name: &str) -> Option<ProviderStatus> {
        let active = self.active_provider().await;
        let health = self.health_of(name).await;
        self.entries
            .read()
            .await
            .get(name)
            .map(|entry| build_status(name, entry, active.as_deref(), health))
    }

    /// Status of every provider, by ascending priority.
    pub async fn list_providers(&self) -> Vec<ProviderStatus> {
        let active = self.active_provider().await;
        let health = self.health.read().await.clone();
        let mut statuses: Vec<ProviderStatus> = self
            .entries
            .read()
            .await
            .iter()
            .map(|(name, entry)| {
                build_status(name, entry, active.as_deref(), health.get(name).cloned())
            })
            .collect();
        statuses.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        statuses
    }

    /// Names of available providers, by ascending priority.
    pub async fn get_available_providers(&self) -> Vec<String> {
        self.list_providers()
            .await
            .into_iter()
            .filter(ProviderStatus::is_available)
            .map(|s| s.name)
            .collect()
    }

    /// Aggregate usage, cost and health snapshot.
    pub async fn get_stats(&self) -> ManagerStats {
        let selection = self.selection.read().await.clone();
        let providers = self.list_providers().await;
        let usage = self.costs.get_all_usage_stats().await;

        let total_cost_this_month = usage.values().map(|u| u.current_month.cost).sum();
        let total_cost = usage.values().map(|u| u.all_time.cost).sum();

        ManagerStats {
            active_provider: selection.active,
            fallback_chain: selection.chain,
            providers,
            usage,
            total_cost_this_month,
            total_cost,
        }
    }
}

fn build_status(
    name: &str,
    entry: &ProviderEntry,
    active: Option<&str>,
    health: Option<HealthRecord>,
) -> ProviderStatus {
    ProviderStatus {
        name: name.to_string(),
        priority: entry.priority,
        state: entry.state,
        configured: entry.configured,
        active: active == Some(name),
        last_health_check: entry.last_health_check,
        error: entry.error.clone(),
        config: entry.config.clone(),
        health,
        info: entry.instance.provider_info(),
    }
}

/// A provider timeout of zero means "use the default".
fn effective_timeout(provider: Duration, default: Duration) -> Duration {
    if provider.is_zero() { default } else { provider }
}

// ============================================================================
// Tests
// ============================================================================
