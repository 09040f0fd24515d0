//! Best-effort redaction of sensitive substrings in outbound prompts.
//!
//! The filter only knows a handful of shapes (payment cards, SSN-like
//! identifiers, email addresses). It is not a compliance control.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::GenerationOptions;

/// Replacement written over every match.
pub const REDACTION_MARKER: &str = "[REDACTED]";

// 13 to 16 digits, optionally grouped in fours by spaces or dashes.
static CARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{4}[ -]?\d{4}[ -]?\d{4}[ -]?\d{1,4}\b").expect("Invalid regex")
});

static GOVERNMENT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("Invalid regex"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("Invalid regex")
});

/// Kind of sensitive data recognized by the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitiveKind {
    /// Payment-card-like digit sequence.
    PaymentCard,
    /// Government-ID-like pattern (`ddd-dd-dddd`).
    GovernmentId,
    /// Email address.
    Email,
}

impl SensitiveKind {
    fn pattern(self) -> &'static Regex {
        match self {
            Self::PaymentCard => &CARD_RE,
            Self::GovernmentId => &GOVERNMENT_ID_RE,
            Self::Email => &EMAIL_RE,
        }
    }

    /// All kinds, in the order they are applied.
    pub fn all() -> &'static [SensitiveKind] {
        &[Self::PaymentCard, Self::GovernmentId, Self::Email]
    }
}

/// Counts of redactions performed on one input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacyReport {
    /// Payment card matches.
    pub payment_cards: usize,
    /// Government ID matches.
    pub government_ids: usize,
    /// Email matches.
    pub emails: usize,
}

impl PrivacyReport {
    /// Total number of redactions.
    pub fn total(&self) -> usize {
        self.payment_cards + self.government_ids + self.emails
    }

    fn record(&mut self, kind: SensitiveKind, count: usize) {
        match kind {
            SensitiveKind::PaymentCard => self.payment_cards += count,
            SensitiveKind::GovernmentId => self.government_ids += count,
            SensitiveKind::Email => self.emails += count,
        }
    }
}

/// Output of [`PrivacyFilter::apply`].
#[derive(Debug, Clone)]
pub struct FilteredPrompt<'a> {
    /// Prompt with sensitive substrings replaced.
    pub prompt: String,
    /// Options, untouched.
    pub options: &'a GenerationOptions,
    /// What was replaced.
    pub report: PrivacyReport,
}

/// Pure, synchronous prompt redactor.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrivacyFilter;

impl PrivacyFilter {
    /// Creates a filter.
    pub fn new() -> Self {
        Self
    }

    /// Redacts `text`, returning the new text and a report.
    pub fn redact(&self, text: &str) -> (String, PrivacyReport) {
        let mut report = PrivacyReport::default();
        let mut output = text.to_string();

        for &kind in SensitiveKind::all() {
            let pattern = kind.pattern();
            let count = pattern.find_iter(&output).count();
            if count > 0 {
                report.record(kind, count);
                output = pattern.replace_all(&output, REDACTION_MARKER).into_owned();
            }
        }

        if report.total() > 0 {
            debug!(redactions = report.total(), "Redacted sensitive content from prompt");
        }

        (output, report)
    }

    /// Redacts the prompt and passes options through unchanged.
    pub fn apply<'a>(&self, prompt: &str, options: &'a GenerationOptions) -> FilteredPrompt<'a> {
        let (prompt, report) = self.redact(prompt);
        FilteredPrompt {
            prompt,
            options,
            report,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
