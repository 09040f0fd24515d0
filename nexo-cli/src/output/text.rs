//! Text output formatting with progress bars and colors.

use nexo_core::{ProviderState, is_sensitive_field};
use nexo_manager::{ManagerStats, ProviderStatus, ProviderSuggestion};
use nexo_store::UsageStats;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
        }
    }

    // ========================================================================
    // Generation
    // ========================================================================

    /// Formats a generated suggestion with a one-line footer.
    pub fn format_suggestion(&self, result: &ProviderSuggestion) -> String {
        let s = &result.suggestion;
        let mut footer = vec![format!("via {}", result.provider)];
        if let Some(model) = &s.model {
            footer.push(model.clone());
        }
        footer.push(format!("{} tokens", self.format_number(s.total_tokens() as f64)));
        footer.push(format!("${:.4}", s.cost_estimate));
        footer.push(format!("{}ms", s.latency_ms));

        let mut lines = vec![s.text.clone(), String::new(), self.dim(&footer.join(" · "))];

        let failed: Vec<&str> = result
            .attempts
            .iter()
            .filter(|a| !a.success)
            .map(|a| a.candidate.as_str())
            .collect();
        if !failed.is_empty() {
            lines.push(self.yellow(&format!("Fell back after: {}", failed.join(", "))));
        }

        let redacted = result.redactions.total();
        if redacted > 0 {
            lines.push(self.dim(&format!(
                "{redacted} sensitive value{} redacted",
                if redacted == 1 { "" } else { "s" }
            )));
        }

        lines.join("\n")
    }

    // ========================================================================
    // Providers
    // ========================================================================

    /// Formats provider list header.
    pub fn format_providers_header(&self) -> String {
        format!(
            "{:<22} {:<13} {:<11} {:<9} {}",
            self.bold("Provider"),
            self.bold("State"),
            self.bold("Configured"),
            self.bold("Priority"),
            self.bold("Model")
        )
    }

    /// Formats a single provider line.
    pub fn format_provider_line(&self, status: &ProviderStatus) -> String {
        let marker = if status.active { "*" } else { " " };
        let configured = if status.configured {
            self.green("✓")
        } else {
            self.dim("−")
        };
        let model = status
            .config
            .model()
            .unwrap_or(status.info.default_model.as_str());

        format!(
            "{:<22} {:<13} {:<11} {:<9} {}",
            format!("{marker} {}", status.name),
            self.state(status.state),
            configured,
            status.priority,
            model
        )
    }

    /// Formats the active provider and fallback order.
    pub fn format_chain(&self, active: Option<&str>, chain: &[String]) -> String {
        let active = active.map_or_else(|| self.dim("none"), |a| self.cyan(a));
        let chain = if chain.is_empty() {
            self.dim("empty")
        } else {
            chain.join(" → ")
        };
        format!("Active: {active}\nFallback: {chain}")
    }

    /// Formats the detail view for one provider.
    pub fn format_status(&self, status: &ProviderStatus) -> String {
        let mut lines = Vec::new();

        let title = if status.active {
            format!("{} ({}) {}", self.bold(&status.info.display_name), status.name, self.cyan("active"))
        } else {
            format!("{} ({})", self.bold(&status.info.display_name), status.name)
        };
        lines.push(title);
        lines.push("─".repeat(40));
        lines.push(format!("State:      {}", self.state(status.state)));
        lines.push(format!("Configured: {}", status.configured));
        lines.push(format!("Priority:   {}", status.priority));
        lines.push(format!("Vendor:     {}", status.info.vendor));
        if status.info.is_local {
            lines.push(format!("Location:   {}", self.dim("local")));
        }

        if let Some(health) = &status.health {
            let verdict = if health.healthy {
                self.green("healthy")
            } else {
                self.red("unhealthy")
            };
            lines.push(format!(
                "Health:     {verdict} {}",
                self.dim(&format!(
                    "({}ms, {})",
                    health.latency_ms,
                    health.checked_at.format("%Y-%m-%d %H:%M:%S UTC")
                ))
            ));
        }
        if let Some(error) = &status.error {
            lines.push(format!("Error:      {}", self.red(error)));
        }

        if !status.config.is_empty() {
            lines.push(String::new());
            lines.push(self.dim("Configuration:"));
            for (key, value) in status.config.iter() {
                let shown = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let shown = if is_sensitive_field(key) {
                    self.dim(&shown)
                } else {
                    shown
                };
                lines.push(format!("  {key} = {shown}"));
            }
        }

        lines.join("\n")
    }

    // ========================================================================
    // Costs
    // ========================================================================

    /// Formats aggregate stats.
    pub fn format_stats(&self, stats: &ManagerStats) -> String {
        let mut lines = vec![self.bold("Nexo Usage"), "─".repeat(50)];
        lines.push(self.format_chain(stats.active_provider.as_deref(), &stats.fallback_chain));
        lines.push(String::new());

        if stats.usage.is_empty() {
            lines.push(self.dim("No usage tracked yet"));
        }
        for usage in stats.usage.values() {
            lines.push(self.format_usage(usage));
            lines.push(String::new());
        }

        lines.push(format!(
            "This month: {}   All time: ${:.2}",
            self.green(&format!("${:.2}", stats.total_cost_this_month)),
            stats.total_cost
        ));
        lines.join("\n")
    }

    /// Formats usage for one provider, with a bar when a limit is set.
    pub fn format_usage(&self, usage: &UsageStats) -> String {
        let mut lines = vec![self.bold(&usage.provider)];
        let month = &usage.current_month;
        lines.push(format!(
            "  Month:    ${:.4} · {} ops · {} tokens",
            month.cost,
            month.operations,
            self.format_number(month.tokens as f64)
        ));
        lines.push(format!(
            "  All time: ${:.4} · {} ops · {} tokens",
            usage.all_time.cost,
            usage.all_time.operations,
            self.format_number(usage.all_time.tokens as f64)
        ));

        if let Some(limit) = &usage.limit {
            let remaining = (100.0 - limit.percentage).max(0.0);
            let bar = self.progress_bar(remaining);
            let pct = self.color_for_percent(remaining, &format!("{:.0}% used", limit.percentage));
            let mut line = format!(
                "  Limit:    {bar} {pct} of ${:.2} (${:.2} left)",
                limit.monthly_limit, limit.remaining
            );
            if limit.is_near_limit {
                line.push_str(&format!(" {}", self.red("near limit")));
            }
            lines.push(line);
        }

        for (op, totals) in &usage.operations {
            lines.push(self.dim(&format!(
                "    {op}: {} × ${:.4}",
                totals.count, totals.total_cost
            )));
        }

        lines.join("\n")
    }

    /// Formats the result of an import.
    pub fn format_import(&self, file: &str, backup: &str) -> String {
        format!(
            "Imported configuration from {}\n{}",
            self.bold(file),
            self.dim(&format!("Previous configuration saved to {backup}"))
        )
    }

    /// Formats a progress bar.
    pub fn progress_bar(&self, percent_remaining: f64) -> String {
        let filled = ((percent_remaining.clamp(0.0, 100.0) / 100.0) * self.bar_width as f64).round() as usize;
        let empty = self.bar_width.saturating_sub(filled);

        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        );
        self.color_for_percent(percent_remaining, &bar)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn state(&self, state: ProviderState) -> String {
        let text = state.to_string();
        match state {
            ProviderState::Available => self.green(&text),
            ProviderState::Unavailable => self.red(&text),
            ProviderState::Initialized => self.dim(&text),
        }
    }

    fn color_for_percent(&self, percent: f64, text: &str) -> String {
        if !self.use_colors {
            return text.to_string();
        }

        if percent < 20.0 {
            self.red(text)
        } else if percent < 50.0 {
            self.yellow(text)
        } else {
            self.green(text)
        }
    }

    fn format_number(&self, n: f64) -> String {
        if n >= 1_000_000.0 {
            format!("{:.1}M", n / 1_000_000.0)
        } else if n >= 1_000.0 {
            format!("{:.1}K", n / 1_000.0)
        } else {
            format!("{n:.0}")
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

// ============================================================================
// Tests
// ============================================================================
