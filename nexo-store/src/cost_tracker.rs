//! Per-provider spend and token accounting.
//!
//! Each provider gets a ledger with monthly (`"YYYY-M"`) and daily
//! (`"YYYY-M-D"`) buckets in UTC. Buckets are never purged; a month
//! rollover only clears alert cooldowns. Ledgers are flushed to disk on
//! an interval and at shutdown, limits are written as soon as they change.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use nexo_core::{EventBus, NexoEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use crate::paths::AppPaths;
use crate::persistence::{load_json_optional, save_json};

/// Default alert threshold (fraction of the monthly limit).
pub const DEFAULT_ALERT_THRESHOLD: f64 = 0.8;

/// Minimum time between two alerts for the same provider.
pub const DEFAULT_ALERT_COOLDOWN: Duration = Duration::from_secs(60 * 60);

/// Default ledger flush interval.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

/// Bucket key for a month.
pub fn month_key(year: i32, month: u32) -> String {
    format!("{year}-{month}")
}

/// Bucket key for a day.
pub fn day_key(date: NaiveDate) -> String {
    format!("{}-{}-{}", date.year(), date.month(), date.day())
}

// ============================================================================
// Ledger
// ============================================================================

/// Operation and token counts for one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageBucket {
    /// Number of tracked operations.
    pub operations: u64,
    /// Tokens consumed.
    pub tokens: u64,
}

/// Totals for one operation type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationBreakdown {
    /// Number of operations.
    pub count: u64,
    /// Spend (USD).
    pub total_cost: f64,
    /// Tokens consumed.
    pub total_tokens: u64,
}

/// One provider's accounting.
///
/// `total` always equals the sum of `monthly`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostLedger {
    /// Spend per month.
    pub monthly: BTreeMap<String, f64>,
    /// Spend per day.
    pub daily: BTreeMap<String, f64>,
    /// All-time spend.
    pub total: f64,
    /// Usage per month and per day, same keys as the cost maps.
    pub usage: BTreeMap<String, UsageBucket>,
    /// Totals per operation type.
    pub operations: BTreeMap<String, OperationBreakdown>,
}

impl CostLedger {
    fn record(&mut self, at: DateTime<Utc>, operation: &str, cost: f64, tokens: u64) {
        let month = month_key(at.year(), at.month());
        let day = day_key(at.date_naive());

        *self.monthly.entry(month.clone()).or_default() += cost;
        *self.daily.entry(day.clone()).or_default() += cost;
        self.total += cost;

        for key in [month, day] {
            let bucket = self.usage.entry(key).or_default();
            bucket.operations += 1;
            bucket.tokens += tokens;
        }

        let breakdown = self.operations.entry(operation.to_string()).or_default();
        breakdown.count += 1;
        breakdown.total_cost += cost;
        breakdown.total_tokens += tokens;
    }

    fn merge(&mut self, other: CostLedger) {
        for (k, v) in other.monthly {
            *self.monthly.entry(k).or_default() += v;
        }
        for (k, v) in other.daily {
            *self.daily.entry(k).or_default() += v;
        }
        self.total += other.total;
        for (k, v) in other.usage {
            let bucket = self.usage.entry(k).or_default();
            bucket.operations += v.operations;
            bucket.tokens += v.tokens;
        }
        for (k, v) in other.operations {
            let breakdown = self.operations.entry(k).or_default();
            breakdown.count += v.count;
            breakdown.total_cost += v.total_cost;
            breakdown.total_tokens += v.total_tokens;
        }
    }

    fn month_cost(&self, year: i32, month: u32) -> f64 {
        self.monthly
            .get(&month_key(year, month))
            .copied()
            .unwrap_or_default()
    }

    fn month_usage(&self, year: i32, month: u32) -> UsageBucket {
        self.usage
            .get(&month_key(year, month))
            .copied()
            .unwrap_or_default()
    }
}

// ============================================================================
// Limits & Stats
// ============================================================================

/// Monthly spend limit for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostLimit {
    /// Limit in USD.
    pub monthly_limit: f64,
    /// Fraction of the limit at which alerts start, in (0, 1].
    pub alert_threshold: f64,
}

impl CostLimit {
    /// Spend at which alerts start.
    pub fn trigger_point(&self) -> f64 {
        self.monthly_limit * self.alert_threshold
    }
}

/// Spend and usage over some period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PeriodStats {
    /// Spend (USD).
    pub cost: f64,
    /// Number of operations.
    pub operations: u64,
    /// Tokens consumed.
    pub tokens: u64,
}

/// Position relative to a configured limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LimitStatus {
    /// Monthly limit (USD).
    pub monthly_limit: f64,
    /// Alert threshold.
    pub alert_threshold: f64,
    /// Current month spend as a percentage of the limit.
    pub percentage: f64,
    /// Spend left before the limit, never negative.
    pub remaining: f64,
    /// Whether spend has reached the alert threshold.
    pub is_near_limit: bool,
}

/// Usage summary for one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageStats {
    /// Provider name.
    pub provider: String,
    /// Current UTC month.
    pub current_month: PeriodStats,
    /// Everything ever tracked.
    pub all_time: PeriodStats,
    /// Totals per operation type.
    pub operations: BTreeMap<String, OperationBreakdown>,
    /// Limit status, if a limit is set.
    pub limit: Option<LimitStatus>,
}

// ============================================================================
// Tracker
// ============================================================================

/// Authoritative spend ledger with threshold alerts.
///
/// Updates to one provider's ledger are serialized by a per-provider lock,
/// so concurrent requests never lose increments.
#[derive(Debug)]
pub struct CostTracker {
    data_path: PathBuf,
    limits_path: PathBuf,
    clock: Arc<dyn Clock>,
    events: EventBus,
    alert_cooldown: Duration,
    ledgers: RwLock<HashMap<String, Arc<Mutex<CostLedger>>>>,
    limits: RwLock<BTreeMap<String, CostLimit>>,
    last_alerts: Mutex<HashMap<String, DateTime<Utc>>>,
    last_seen_month: Mutex<(i32, u32)>,
    dirty: AtomicBool,
    flush_lock: Mutex<()>,
    flush_task: Mutex<Option<FlushTask>>,
}

/// Background flush loop and its stop signal.
#[derive(Debug)]
struct FlushTask {
    stop: Arc<Notify>,
    handle: JoinHandle<()>,
}

/// Sets the dirty flag again unless the flush that armed it completed.
///
/// Covers both write errors and a flush future dropped mid-write.
struct DirtyGuard<'a> {
    flag: &'a AtomicBool,
    armed: bool,
}

impl<'a> DirtyGuard<'a> {
    fn new(flag: &'a AtomicBool) -> Self {
        Self { flag, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for DirtyGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::Release);
        }
    }
}

impl CostTracker {
    /// Creates an empty tracker backed by files under `paths`.
    pub fn new(paths: &AppPaths, events: EventBus) -> Self {
        Self::with_clock(paths, events, Arc::new(SystemClock))
    }

    /// Creates an empty tracker with an explicit clock.
    pub fn with_clock(paths: &AppPaths, events: EventBus, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            data_path: paths.cost_data_file(),
            limits_path: paths.cost_limits_file(),
            clock,
            events,
            alert_cooldown: DEFAULT_ALERT_COOLDOWN,
            ledgers: RwLock::new(HashMap::new()),
            limits: RwLock::new(BTreeMap::new()),
            last_alerts: Mutex::new(HashMap::new()),
            last_seen_month: Mutex::new((now.year(), now.month())),
            dirty: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
            flush_task: Mutex::new(None),
        }
    }

    /// Overrides the alert cooldown.
    #[must_use]
    pub fn with_alert_cooldown(mut self, cooldown: Duration) -> Self {
        self.alert_cooldown = cooldown;
        self
    }

    /// Creates a tracker and loads persisted ledgers and limits.
    pub async fn open(paths: &AppPaths, events: EventBus) -> Result<Self, StoreError> {
        let tracker = Self::new(paths, events);
        tracker.load().await?;
        Ok(tracker)
    }

    // ========================================================================
    // Tracking
    // ========================================================================

    /// Records one operation's cost and tokens, then checks alerts.
    #[instrument(skip(self), level = "debug")]
    pub async fn track_usage(&self, provider: &str, operation: &str, cost: f64, tokens: u64) {
        let cost = if cost.is_finite() && cost >= 0.0 {
            cost
        } else {
            warn!(provider = %provider, cost = cost, "Ignoring invalid cost");
            0.0
        };

        self.reset_monthly_data().await;

        let now = self.clock.now();
        let ledger = self.ledger(provider).await;
        let month_cost = {
            let mut ledger = ledger.lock().await;
            ledger.record(now, operation, cost, tokens);
            ledger.month_cost(now.year(), now.month())
        };
        self.dirty.store(true, Ordering::Release);

        debug!(
            provider = %provider,
            operation = %operation,
            cost = cost,
            tokens = tokens,
            month_cost = month_cost,
            "Usage tracked"
        );

        self.check_alerts(provider, month_cost).await;
    }

    async fn ledger(&self, provider: &str) -> Arc<Mutex<CostLedger>> {
        if let Some(ledger) = self.ledgers.read().await.get(provider) {
            return ledger.clone();
        }
        self.ledgers
            .write()
            .await
            .entry(provider.to_string())
            .or_default()
            .clone()
    }

    async fn check_alerts(&self, provider: &str, current_cost: f64) {
        let Some(limit) = self.limits.read().await.get(provider).copied() else {
            return;
        };
        if current_cost < limit.trigger_point() {
            return;
        }

        let now = self.clock.now();
        {
            let mut last_alerts = self.last_alerts.lock().await;
            if let Some(last) = last_alerts.get(provider) {
                let elapsed = (now - *last).to_std().unwrap_or_default();
                if elapsed <= self.alert_cooldown {
                    debug!(provider = %provider, "Alert suppressed by cooldown");
                    return;
                }
            }
            last_alerts.insert(provider.to_string(), now);
        }

        let percentage = current_cost / limit.monthly_limit * 100.0;
        info!(
            provider = %provider,
            current_cost = current_cost,
            limit = limit.monthly_limit,
            percentage = percentage,
            "Cost alert"
        );
        self.events.emit(NexoEvent::CostAlert {
            provider: provider.to_string(),
            current_cost,
            limit: limit.monthly_limit,
            percentage,
        });

        if current_cost >= limit.monthly_limit {
            warn!(provider = %provider, current_cost = current_cost, "Cost limit exceeded");
            self.events.emit(NexoEvent::CostLimitExceeded {
                provider: provider.to_string(),
                current_cost,
                limit: limit.monthly_limit,
            });
        }
    }

    /// Clears alert cooldowns if the UTC month changed since last seen.
    ///
    /// Returns true on rollover. Cost and usage history is kept.
    pub async fn reset_monthly_data(&self) -> bool {
        let now = self.clock.now();
        let current = (now.year(), now.month());

        let mut last_seen = self.last_seen_month.lock().await;
        if *last_seen == current {
            return false;
        }

        info!(
            from = %month_key(last_seen.0, last_seen.1),
            to = %month_key(current.0, current.1),
            "Month rollover"
        );
        *last_seen = current;
        self.last_alerts.lock().await.clear();
        true
    }

    // ========================================================================
    // Limits
    // ========================================================================

    /// Sets or replaces a monthly limit and resets the alert cooldown.
    ///
    /// Limits are written to disk immediately.
    pub async fn set_cost_limit(
        &self,
        provider: &str,
        monthly_limit: f64,
        alert_threshold: f64,
    ) -> Result<(), StoreError> {
        if !monthly_limit.is_finite() || monthly_limit <= 0.0 {
            return Err(StoreError::Config(format!(
                "monthly limit must be positive, got {monthly_limit}"
            )));
        }
        if !(alert_threshold > 0.0 && alert_threshold <= 1.0) {
            return Err(StoreError::Config(format!(
                "alert threshold must be in (0, 1], got {alert_threshold}"
            )));
        }

        let limit = CostLimit {
            monthly_limit,
            alert_threshold,
        };
        {
            let mut limits = self.limits.write().await;
            let mut next = limits.clone();
            next.insert(provider.to_string(), limit);
            save_json(&self.limits_path, &next).await?;
            *limits = next;
        }
        self.last_alerts.lock().await.remove(provider);

        info!(provider = %provider, limit = monthly_limit, threshold = alert_threshold, "Cost limit set");
        Ok(())
    }

    /// Removes a limit. Returns false if none was set.
    pub async fn remove_cost_limit(&self, provider: &str) -> Result<bool, StoreError> {
        let mut limits = self.limits.write().await;
        if !limits.contains_key(provider) {
            return Ok(false);
        }
        let mut next = limits.clone();
        next.remove(provider);
        save_json(&self.limits_path, &next).await?;
        *limits = next;
        drop(limits);

        self.last_alerts.lock().await.remove(provider);
        info!(provider = %provider, "Cost limit removed");
        Ok(true)
    }

    /// The limit for a provider, if any.
    pub async fn get_cost_limit(&self, provider: &str) -> Option<CostLimit> {
        self.limits.read().await.get(provider).copied()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Spend for the current UTC month.
    pub async fn get_current_month_cost(&self, provider: &str) -> f64 {
        let now = self.clock.now();
        self.get_monthly_cost(provider, now.year(), now.month()).await
    }

    /// Spend for a given month.
    pub async fn get_monthly_cost(&self, provider: &str, year: i32, month: u32) -> f64 {
        let Some(ledger) = self.ledgers.read().await.get(provider).cloned() else {
            return 0.0;
        };
        ledger.lock().await.month_cost(year, month)
    }

    /// Spend for a given day.
    pub async fn get_daily_cost(&self, provider: &str, date: NaiveDate) -> f64 {
        let Some(ledger) = self.ledgers.read().await.get(provider).cloned() else {
            return 0.0;
        };
        ledger
            .lock()
            .await
            .daily
            .get(&day_key(date))
            .copied()
            .unwrap_or_default()
    }

    /// Current month and all-time totals plus limit status.
    pub async fn get_usage_stats(&self, provider: &str) -> UsageStats {
        let now = self.clock.now();
        let ledger = match self.ledgers.read().await.get(provider).cloned() {
            Some(ledger) => ledger.lock().await.clone(),
            None => CostLedger::default(),
        };

        let month_usage = ledger.month_usage(now.year(), now.month());
        let current_month = PeriodStats {
            cost: ledger.month_cost(now.year(), now.month()),
            operations: month_usage.operations,
            tokens: month_usage.tokens,
        };
        let all_time = PeriodStats {
            cost: ledger.total,
            operations: ledger.operations.values().map(|o| o.count).sum(),
            tokens: ledger.operations.values().map(|o| o.total_tokens).sum(),
        };

        let limit = self.get_cost_limit(provider).await.map(|limit| LimitStatus {
            monthly_limit: limit.monthly_limit,
            alert_threshold: limit.alert_threshold,
            percentage: current_month.cost / limit.monthly_limit * 100.0,
            remaining: (limit.monthly_limit - current_month.cost).max(0.0),
            is_near_limit: current_month.cost >= limit.trigger_point(),
        });

        UsageStats {
            provider: provider.to_string(),
            current_month,
            all_time,
            operations: ledger.operations,
            limit,
        }
    }

    /// Stats for every provider with a ledger or a limit.
    pub async fn get_all_usage_stats(&self) -> BTreeMap<String, UsageStats> {
        let mut names: Vec<String> = self.ledgers.read().await.keys().cloned().collect();
        names.extend(self.limits.read().await.keys().cloned());
        names.sort();
        names.dedup();

        let mut stats = BTreeMap::new();
        for name in names {
            let entry = self.get_usage_stats(&name).await;
            stats.insert(name, entry);
        }
        stats
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Merges persisted ledgers and limits into memory.
    ///
    /// Missing files are fine; unreadable ones are errors.
    pub async fn load(&self) -> Result<(), StoreError> {
        if let Some(persisted) =
            load_json_optional::<BTreeMap<String, CostLedger>>(&self.data_path).await?
        {
            let count = persisted.len();
            for (provider, ledger) in persisted {
                self.ledger(&provider).await.lock().await.merge(ledger);
            }
            info!(providers = count, "Cost ledgers loaded");
        }

        if let Some(limits) =
            load_json_optional::<BTreeMap<String, CostLimit>>(&self.limits_path).await?
        {
            debug!(limits = limits.len(), "Cost limits loaded");
            self.limits.write().await.extend(limits);
        }
        Ok(())
    }

    /// Writes all ledgers if anything changed since the last flush.
    ///
    /// Flushes run one at a time. Usage recorded while a flush is writing
    /// marks the ledgers dirty again for the next one.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let _serial = self.flush_lock.lock().await;
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let guard = DirtyGuard::new(&self.dirty);

        let handles: Vec<(String, Arc<Mutex<CostLedger>>)> = self
            .ledgers
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut snapshot = BTreeMap::new();
        for (provider, ledger) in handles {
            snapshot.insert(provider, ledger.lock().await.clone());
        }

        save_json(&self.data_path, &snapshot).await?;
        guard.disarm();
        debug!(providers = snapshot.len(), "Cost ledgers flushed");
        Ok(())
    }

    /// Starts flushing on a fixed interval. Replaces any running flush task.
    pub async fn start_auto_flush(self: &Arc<Self>, interval: Duration) {
        let weak = Arc::downgrade(self);
        let stop = Arc::new(Notify::new());
        let signal = Arc::clone(&stop);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = signal.notified() => break,
                    _ = ticker.tick() => {}
                }
                let Some(tracker) = weak.upgrade() else {
                    break;
                };
                if let Err(e) = tracker.flush().await {
                    warn!(error = %e, "Failed to flush cost ledgers");
                }
            }
        });

        let task = FlushTask { stop, handle };
        if let Some(previous) = self.flush_task.lock().await.replace(task) {
            previous.stop.notify_one();
        }
        debug!(interval = ?interval, "Cost ledger auto-flush started");
    }

    /// Stops the flush task, letting an in-flight flush finish, then writes
    /// a final flush.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        let task = self.flush_task.lock().await.take();
        if let Some(task) = task {
            task.stop.notify_one();
            if let Err(e) = task.handle.await {
                warn!(error = %e, "Cost ledger flush task ended abnormally");
            }
        }
        self.flush().await
    }
}

// ============================================================================
// Tests
// ============================================================================
