//! Integration tests for the provider manager using scripted providers.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nexo_core::{
    GenerationOptions, ModelPricing, NexoEvent, ProviderConfig, ProviderError, ProviderInfo,
    ProviderRegistration, ProviderState, REDACTION_MARKER, Suggestion, TextProvider,
};
use nexo_manager::{AppContext, ManagerError, ProviderManager};
use nexo_store::{AppPaths, KeySource};
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::broadcast::Receiver;

// ============================================================================
// Scripted Provider
// ============================================================================

struct ScriptedProvider {
    name: String,
    requires_key: bool,
    cost: f64,
    healthy: AtomicBool,
    failing: AtomicBool,
    fail_init: bool,
    delay: Option<Duration>,
    timeout: Duration,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    call_log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProvider {
    fn new(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            requires_key: false,
            cost: 0.01,
            healthy: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            fail_init: false,
            delay: None,
            timeout: Duration::from_secs(5),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            call_log: Arc::clone(log),
        }
    }

    fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    fn with_key(mut self) -> Self {
        self.requires_key = true;
        self
    }

    fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TextProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self) -> Result<(), ProviderError> {
        if self.fail_init {
            return Err(ProviderError::Other("init exploded".to_string()));
        }
        Ok(())
    }

    async fn configure(&self, config: ProviderConfig) -> Result<(), ProviderError> {
        if self.requires_key && config.api_key().is_none() {
            return Err(ProviderError::Config("api_key required".to_string()));
        }
        Ok(())
    }

    async fn test_connection(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    async fn generate_suggestion(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<Suggestion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_log.lock().unwrap().push(self.name.clone());
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Http(format!("{} is down", self.name)));
        }
        Ok(Suggestion {
            text: format!("from {}", self.name),
            tokens_in: 10,
            tokens_out: 5,
            cost_estimate: self.cost,
            latency_ms: 1,
            model: None,
        })
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name.clone(),
            display_name: self.name.to_uppercase(),
            vendor: "test".to_string(),
            default_model: "m".to_string(),
            models: vec!["m".to_string()],
            required_fields: if self.requires_key {
                vec!["api_key".to_string()]
            } else {
                Vec::new()
            },
            pricing: vec![ModelPricing::free("m")],
            is_local: !self.requires_key,
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn registrations(providers: &[(i32, &Arc<ScriptedProvider>)]) -> Vec<ProviderRegistration> {
    providers
        .iter()
        .map(|(priority, provider)| {
            let instance: Arc<dyn TextProvider> = Arc::clone(*provider) as Arc<dyn TextProvider>;
            ProviderRegistration::new(*priority, instance)
        })
        .collect()
}

async fn start(dir: &TempDir, providers: &[(i32, &Arc<ScriptedProvider>)]) -> Arc<ProviderManager> {
    let ctx = AppContext::new(AppPaths::new(dir.path()));
    let manager = ProviderManager::open(&ctx).await.unwrap();
    manager.initialize(registrations(providers)).await;
    manager.load_configuration().await.unwrap();
    manager
}

fn drain(rx: &mut Receiver<NexoEvent>) -> Vec<NexoEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn new_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

// ============================================================================
// Chain and Selection
// ============================================================================

#[tokio::test]
async fn test_chain_follows_priority() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let a = Arc::new(ScriptedProvider::new("a", &log));
    let b = Arc::new(ScriptedProvider::new("b", &log));
    let c = Arc::new(ScriptedProvider::new("c", &log));

    let manager = start(&dir, &[(30, &c), (10, &a), (20, &b)]).await;

    assert_eq!(manager.fallback_chain().await, vec!["a", "b", "c"]);
    assert_eq!(manager.active_provider().await.as_deref(), Some("a"));
    assert_eq!(manager.get_available_providers().await, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_unhealthy_provider_left_out_of_chain() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let a = Arc::new(ScriptedProvider::new("a", &log));
    let b = Arc::new(ScriptedProvider::new("b", &log));
    a.healthy.store(false, Ordering::SeqCst);

    let manager = start(&dir, &[(10, &a), (20, &b)]).await;

    assert_eq!(manager.fallback_chain().await, vec!["b"]);
    let status = manager.get_provider_status("a").await.unwrap();
    assert_eq!(status.state, ProviderState::Unavailable);
    assert!(status.last_health_check.is_some());
    assert!(!status.health.unwrap().healthy);
}

#[tokio::test]
async fn test_failed_initialize_does_not_abort_startup() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let broken = Arc::new(ScriptedProvider {
        fail_init: true,
        ..ScriptedProvider::new("broken", &log)
    });
    let ok = Arc::new(ScriptedProvider::new("ok", &log));

    let manager = start(&dir, &[(10, &broken), (20, &ok)]).await;

    let status = manager.get_provider_status("broken").await.unwrap();
    assert_eq!(status.error.as_deref(), Some("init exploded"));
    assert!(manager.get_provider_status("ok").await.unwrap().is_available());
}

#[tokio::test]
async fn test_set_active_provider() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let a = Arc::new(ScriptedProvider::new("a", &log));
    let b = Arc::new(ScriptedProvider::new("b", &log));
    let down = Arc::new(ScriptedProvider::new("down", &log));
    down.healthy.store(false, Ordering::SeqCst);

    let manager = start(&dir, &[(10, &a), (20, &b), (30, &down)]).await;

    assert!(matches!(
        manager.set_active_provider("missing").await,
        Err(ManagerError::ProviderNotFound(_))
    ));
    assert!(matches!(
        manager.set_active_provider("down").await,
        Err(ManagerError::ProviderUnavailable(_))
    ));

    manager.set_active_provider("b").await.unwrap();
    let result = manager
        .generate_suggestion("hello", &GenerationOptions::new())
        .await
        .unwrap();
    assert_eq!(result.provider, "b");
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_selection_survives_restart() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let a = Arc::new(ScriptedProvider::new("a", &log));
    let b = Arc::new(ScriptedProvider::new("b", &log));

    {
        let manager = start(&dir, &[(10, &a), (20, &b)]).await;
        manager.set_active_provider("b").await.unwrap();
    }

    let manager = start(&dir, &[(10, &a), (20, &b)]).await;
    assert_eq!(manager.active_provider().await.as_deref(), Some("b"));
}

// ============================================================================
// Generation
// ============================================================================

#[tokio::test]
async fn test_fallback_in_priority_order() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let a = Arc::new(ScriptedProvider::new("a", &log).failing());
    let b = Arc::new(ScriptedProvider::new("b", &log).failing());
    let c = Arc::new(ScriptedProvider::new("c", &log).with_cost(0.25));

    let manager = start(&dir, &[(10, &a), (20, &b), (30, &c)]).await;
    let result = manager
        .generate_suggestion("hello", &GenerationOptions::new().with_operation("summary"))
        .await
        .unwrap();

    assert_eq!(result.provider, "c");
    assert_eq!(result.suggestion.text, "from c");
    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(result.attempts.len(), 3);
    assert!(result.attempts[2].success);

    // Failed candidates leave the chain until a probe succeeds.
    assert_eq!(manager.fallback_chain().await, vec!["c"]);
    assert_eq!(
        manager.get_provider_status("a").await.unwrap().state,
        ProviderState::Unavailable
    );

    // Only the winning call is charged.
    let stats = manager.get_stats().await;
    assert!((stats.usage["c"].current_month.cost - 0.25).abs() < 1e-9);
    assert_eq!(stats.usage["c"].current_month.tokens, 15);
    assert_eq!(stats.usage["c"].operations["summary"].count, 1);
    assert!(!stats.usage.contains_key("a"));
}

#[tokio::test]
async fn test_all_providers_failing() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let a = Arc::new(ScriptedProvider::new("a", &log).failing());
    let b = Arc::new(ScriptedProvider::new("b", &log).failing());

    let manager = start(&dir, &[(10, &a), (20, &b)]).await;
    let err = manager
        .generate_suggestion("hello", &GenerationOptions::new())
        .await
        .unwrap_err();

    match err {
        ManagerError::AllProvidersUnavailable { attempts } => {
            let tried: Vec<&str> = attempts.iter().map(|a| a.candidate.as_str()).collect();
            assert_eq!(tried, vec!["a", "b"]);
        }
        other => panic!("unexpected error: {other}"),
    }

    // Nothing left to try on the next request.
    let err = manager
        .generate_suggestion("hello", &GenerationOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ManagerError::AllProvidersUnavailable { ref attempts } if attempts.is_empty()
    ));
    assert_eq!(a.calls(), 1);
}

#[tokio::test]
async fn test_timeout_falls_back() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let slow = Arc::new(ScriptedProvider {
        delay: Some(Duration::from_secs(30)),
        timeout: Duration::from_millis(50),
        ..ScriptedProvider::new("slow", &log)
    });
    let fast = Arc::new(ScriptedProvider::new("fast", &log));

    let manager = start(&dir, &[(10, &slow), (20, &fast)]).await;
    let result = manager
        .generate_suggestion("hello", &GenerationOptions::new())
        .await
        .unwrap();

    assert_eq!(result.provider, "fast");
    let first = &result.attempts[0];
    assert_eq!(first.candidate, "slow");
    assert!(first.error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_prompt_is_redacted() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let a = Arc::new(ScriptedProvider::new("a", &log));

    let manager = start(&dir, &[(10, &a)]).await;
    let result = manager
        .generate_suggestion(
            "card 4111-1111-1111-1111 mail user@example.com",
            &GenerationOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        a.last_prompt().unwrap(),
        format!("card {REDACTION_MARKER} mail {REDACTION_MARKER}")
    );
    assert_eq!(result.redactions.total(), 2);

    manager
        .config_store()
        .set_preference("privacy_filter", json!(false))
        .await
        .unwrap();
    manager
        .generate_suggestion("mail user@example.com", &GenerationOptions::new())
        .await
        .unwrap();
    assert_eq!(a.last_prompt().unwrap(), "mail user@example.com");
}

#[tokio::test]
async fn test_concurrent_requests_all_charged() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let a = Arc::new(ScriptedProvider::new("a", &log).with_cost(0.5));
    let manager = start(&dir, &[(10, &a)]).await;

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                manager
                    .generate_suggestion("hi", &GenerationOptions::new())
                    .await
                    .unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let stats = manager.cost_tracker().get_usage_stats("a").await;
    assert_eq!(stats.current_month.operations, 20);
    assert!((stats.current_month.cost - 10.0).abs() < 1e-9);
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_sweep_restores_provider() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let a = Arc::new(ScriptedProvider::new("a", &log).failing());
    let b = Arc::new(ScriptedProvider::new("b", &log));

    let manager = start(&dir, &[(10, &a), (20, &b)]).await;
    let mut rx = manager.subscribe();

    manager
        .generate_suggestion("hello", &GenerationOptions::new())
        .await
        .unwrap();
    assert_eq!(manager.fallback_chain().await, vec!["b"]);

    a.failing.store(false, Ordering::SeqCst);
    manager.run_health_sweep().await;
    assert_eq!(manager.fallback_chain().await, vec!["a", "b"]);

    let events = drain(&mut rx);
    assert!(events.contains(&NexoEvent::ProviderHealthChanged {
        provider: "a".to_string(),
        available: false,
    }));
    assert!(events.contains(&NexoEvent::ProviderHealthChanged {
        provider: "a".to_string(),
        available: true,
    }));

    // "a" was active all along, so it is tried first again.
    let result = manager
        .generate_suggestion("hello", &GenerationOptions::new())
        .await
        .unwrap();
    assert_eq!(result.provider, "a");
}

#[tokio::test]
async fn test_health_probe_never_errors() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let a = Arc::new(ScriptedProvider::new("a", &log));
    let manager = start(&dir, &[(10, &a)]).await;

    assert!(manager.test_provider_health("a").await);
    a.healthy.store(false, Ordering::SeqCst);
    assert!(!manager.test_provider_health("a").await);
    assert!(!manager.test_provider_health("unknown").await);

    let record = manager.health_of("a").await.unwrap();
    assert!(!record.healthy);
    assert!(record.error.is_some());
}

#[tokio::test]
async fn test_health_probe_updates_chain() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let a = Arc::new(ScriptedProvider::new("a", &log));
    let b = Arc::new(ScriptedProvider::new("b", &log));
    a.healthy.store(false, Ordering::SeqCst);

    let manager = start(&dir, &[(10, &a), (20, &b)]).await;
    assert_eq!(manager.fallback_chain().await, vec!["b"]);

    a.healthy.store(true, Ordering::SeqCst);
    assert!(manager.test_provider_health("a").await);
    assert_eq!(manager.fallback_chain().await, vec!["a", "b"]);

    manager.set_active_provider("a").await.unwrap();
    let result = manager
        .generate_suggestion("hello", &GenerationOptions::new())
        .await
        .unwrap();
    assert_eq!(result.provider, "a");

    b.healthy.store(false, Ordering::SeqCst);
    assert!(!manager.test_provider_health("b").await);
    assert_eq!(manager.fallback_chain().await, vec!["a"]);
}

#[tokio::test]
async fn test_background_monitor_recovers_provider() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let a = Arc::new(ScriptedProvider::new("a", &log));
    a.healthy.store(false, Ordering::SeqCst);

    let ctx = AppContext::new(AppPaths::new(dir.path())).with_settings(nexo_manager::ManagerSettings {
        health_check_interval: Duration::from_millis(20),
        ..Default::default()
    });
    let manager = ProviderManager::open(&ctx).await.unwrap();
    manager.initialize(registrations(&[(10, &a)])).await;
    manager.load_configuration().await.unwrap();
    assert!(manager.fallback_chain().await.is_empty());

    manager.start_background_tasks().await;
    a.healthy.store(true, Ordering::SeqCst);

    let mut recovered = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if manager.fallback_chain().await == vec!["a".to_string()] {
            recovered = true;
            break;
        }
    }
    manager.shutdown().await.unwrap();
    assert!(recovered);
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn test_configure_provider() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let keyed = Arc::new(ScriptedProvider::new("keyed", &log).with_key());

    let manager = start(&dir, &[(10, &keyed)]).await;
    assert!(!manager.get_provider_status("keyed").await.unwrap().configured);
    assert!(manager.fallback_chain().await.is_empty());

    let err = manager
        .configure_provider("keyed", ProviderConfig::new().with("model", "m"))
        .await
        .unwrap_err();
    assert!(err.is_config_error());

    let mut rx = manager.subscribe();
    manager
        .configure_provider("keyed", ProviderConfig::new().with("api_key", "sk-secret"))
        .await
        .unwrap();

    let status = manager.get_provider_status("keyed").await.unwrap();
    assert!(status.configured);
    assert!(status.is_available());
    assert_ne!(status.config.get_str("api_key"), Some("sk-secret"));
    assert_eq!(manager.fallback_chain().await, vec!["keyed"]);
    assert!(drain(&mut rx).contains(&NexoEvent::ProviderConfigured {
        provider: "keyed".to_string()
    }));

    assert!(matches!(
        manager
            .configure_provider("nope", ProviderConfig::new())
            .await,
        Err(ManagerError::ProviderNotFound(_))
    ));
}

#[tokio::test]
async fn test_keychain_key_source() {
    keyring::set_default_credential_builder(keyring::mock::default_credential_builder());

    let dir = TempDir::new().unwrap();
    let log = new_log();
    let keyed = Arc::new(ScriptedProvider::new("keyed", &log).with_key());
    let paths = AppPaths::new(dir.path());
    let ctx = AppContext::new(paths.clone()).with_key_source(KeySource::keychain());

    let manager = ProviderManager::open(&ctx).await.unwrap();
    manager.initialize(registrations(&[(10, &keyed)])).await;
    manager.load_configuration().await.unwrap();
    manager
        .configure_provider("keyed", ProviderConfig::new().with("api_key", "sk-secret"))
        .await
        .unwrap();

    assert_eq!(manager.fallback_chain().await, vec!["keyed"]);
    assert!(paths.config_file().exists());
    assert!(!paths.key_file().exists());
}

#[tokio::test]
async fn test_configuration_reapplied_on_restart() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let keyed = Arc::new(ScriptedProvider::new("keyed", &log).with_key());

    {
        let manager = start(&dir, &[(10, &keyed)]).await;
        manager
            .configure_provider("keyed", ProviderConfig::new().with("api_key", "sk-secret"))
            .await
            .unwrap();
    }

    let fresh = Arc::new(ScriptedProvider::new("keyed", &log).with_key());
    let manager = start(&dir, &[(10, &fresh)]).await;
    assert!(manager.get_provider_status("keyed").await.unwrap().configured);
    assert_eq!(manager.active_provider().await.as_deref(), Some("keyed"));
}

#[tokio::test]
async fn test_remove_provider_config_moves_active() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let keyed = Arc::new(ScriptedProvider::new("keyed", &log).with_key());
    let local = Arc::new(ScriptedProvider::new("local", &log));

    let manager = start(&dir, &[(10, &keyed), (20, &local)]).await;
    manager
        .configure_provider("keyed", ProviderConfig::new().with("api_key", "sk"))
        .await
        .unwrap();
    manager.set_active_provider("keyed").await.unwrap();

    assert!(manager.remove_provider_config("keyed").await.unwrap());
    assert_eq!(manager.active_provider().await.as_deref(), Some("local"));
    assert_eq!(manager.fallback_chain().await, vec!["local"]);
    assert!(manager.config_store().get_provider_config("keyed").await.unwrap().is_none());

    // Unconfigured providers stay out even after a sweep.
    manager.run_health_sweep().await;
    assert_eq!(manager.fallback_chain().await, vec!["local"]);
}

#[tokio::test]
async fn test_export_import_roundtrip() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let keyed = Arc::new(ScriptedProvider::new("keyed", &log).with_key());
    let manager = start(&dir, &[(10, &keyed)]).await;

    manager
        .configure_provider("keyed", ProviderConfig::new().with("api_key", "sk-1"))
        .await
        .unwrap();
    let exported = manager.export_configuration().await.unwrap();

    manager.remove_provider_config("keyed").await.unwrap();
    assert!(manager.fallback_chain().await.is_empty());

    let mut rx = manager.subscribe();
    let backup = manager.import_configuration(&exported).await.unwrap();
    assert!(backup.exists());
    assert_eq!(manager.fallback_chain().await, vec!["keyed"]);
    assert!(drain(&mut rx).contains(&NexoEvent::ConfigurationImported));

    let err = manager
        .import_configuration(&json!({"config": {}}))
        .await
        .unwrap_err();
    assert!(err.is_config_error());
}

#[tokio::test]
async fn test_import_unconfigures_providers_missing_from_document() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let keyed = Arc::new(ScriptedProvider::new("keyed", &log).with_key());
    let manager = start(&dir, &[(10, &keyed)]).await;
    let empty = manager.export_configuration().await.unwrap();

    manager
        .configure_provider("keyed", ProviderConfig::new().with("api_key", "sk-1"))
        .await
        .unwrap();
    assert_eq!(manager.fallback_chain().await, vec!["keyed"]);

    let mut rx = manager.subscribe();
    manager.import_configuration(&empty).await.unwrap();

    let status = manager.get_provider_status("keyed").await.unwrap();
    assert!(!status.configured);
    assert!(!status.is_available());
    assert!(status.config.is_empty());
    assert!(manager.fallback_chain().await.is_empty());
    assert!(drain(&mut rx).contains(&NexoEvent::ProviderHealthChanged {
        provider: "keyed".to_string(),
        available: false,
    }));

    let err = manager
        .generate_suggestion("hi", &GenerationOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ManagerError::AllProvidersUnavailable { .. }));
    assert_eq!(keyed.calls(), 0);
}

// ============================================================================
// Costs
// ============================================================================

#[tokio::test]
async fn test_cost_alert_emitted_once() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let a = Arc::new(ScriptedProvider::new("a", &log).with_cost(4.5));
    let manager = start(&dir, &[(10, &a)]).await;

    manager.set_cost_limit("a", 10.0, 0.8).await.unwrap();
    let mut rx = manager.subscribe();

    for _ in 0..3 {
        manager
            .generate_suggestion("hi", &GenerationOptions::new())
            .await
            .unwrap();
    }

    let alerts: Vec<NexoEvent> = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, NexoEvent::CostAlert { .. }))
        .collect();
    assert_eq!(alerts.len(), 1);
    match &alerts[0] {
        NexoEvent::CostAlert {
            provider,
            current_cost,
            limit,
            ..
        } => {
            assert_eq!(provider, "a");
            assert!((current_cost - 9.0).abs() < 1e-9);
            assert!((limit - 10.0).abs() < 1e-9);
        }
        _ => unreachable!(),
    }

    let stats = manager.get_stats().await;
    assert!((stats.total_cost_this_month - 13.5).abs() < 1e-9);
    assert!(stats.usage["a"].limit.unwrap().is_near_limit);

    assert!(matches!(
        manager.set_cost_limit("missing", 1.0, 0.8).await,
        Err(ManagerError::ProviderNotFound(_))
    ));
}
