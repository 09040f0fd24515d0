//! Ordered multi-attempt execution.
//!
//! The executor runs an operation against each candidate in the order
//! given and stops at the first success. It knows nothing about what the
//! candidates or the operation are, and it never touches shared state:
//! failures are only recorded in the returned attempt log.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::FallbackError;

// ============================================================================
// Candidate
// ============================================================================

/// Something the executor can try.
pub trait FallbackCandidate {
    /// Identifier recorded in the attempt log.
    fn id(&self) -> &str;
}

impl FallbackCandidate for String {
    fn id(&self) -> &str {
        self
    }
}

impl FallbackCandidate for &str {
    fn id(&self) -> &str {
        self
    }
}

// ============================================================================
// Attempt
// ============================================================================

/// Record of a single attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackAttempt {
    /// Candidate that was tried.
    pub candidate: String,
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Error if the attempt failed.
    pub error: Option<String>,
    /// How long the attempt took.
    pub duration: Duration,
}

impl FallbackAttempt {
    /// Creates a successful attempt record.
    pub fn success(candidate: impl Into<String>, duration: Duration) -> Self {
        Self {
            candidate: candidate.into(),
            success: true,
            error: None,
            duration,
        }
    }

    /// Creates a failed attempt record.
    pub fn failure(candidate: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            candidate: candidate.into(),
            success: false,
            error: Some(error.into()),
            duration,
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// The outcome of a fallback run.
#[derive(Debug)]
pub struct FallbackOutcome<T> {
    /// The result (success or final error).
    pub result: Result<T, FallbackError>,
    /// All attempts made, in order.
    pub attempts: Vec<FallbackAttempt>,
    /// Total duration of the run.
    pub duration: Duration,
}

impl<T> FallbackOutcome<T> {
    /// Returns true if some candidate succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Number of candidates that were tried.
    pub fn attempts_count(&self) -> usize {
        self.attempts.len()
    }

    /// The candidate that succeeded, if any.
    pub fn successful_candidate(&self) -> Option<&str> {
        self.attempts
            .iter()
            .find(|a| a.success)
            .map(|a| a.candidate.as_str())
    }

    /// Candidates whose attempt failed.
    pub fn failed_candidates(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter(|a| !a.success)
            .map(|a| a.candidate.as_str())
            .collect()
    }

    /// Converts into a plain result.
    pub fn into_result(self) -> Result<T, FallbackError> {
        self.result
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Tries an operation against candidates in order until one succeeds.
///
/// There are no retries within a candidate and no backoff: a single
/// failure moves on to the next one. Candidates are never run in parallel
/// and nothing after the first success is attempted.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackExecutor;

impl FallbackExecutor {
    /// Creates an executor.
    pub fn new() -> Self {
        Self
    }

    /// Runs `operation` against each candidate in order.
    #[instrument(skip(self, candidates, operation), fields(candidates = candidates.len()))]
    pub async fn execute<C, T, E, F, Fut>(&self, candidates: &[C], mut operation: F) -> FallbackOutcome<T>
    where
        C: FallbackCandidate,
        F: FnMut(&C) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let start = Instant::now();
        let mut attempts = Vec::with_capacity(candidates.len());

        if candidates.is_empty() {
            debug!("No candidates to try");
            return FallbackOutcome {
                result: Err(FallbackError::NoCandidates),
                attempts,
                duration: start.elapsed(),
            };
        }

        for candidate in candidates {
            let id = candidate.id();
            let attempt_start = Instant::now();
            debug!(candidate = %id, "Trying candidate");

            match operation(candidate).await {
                Ok(value) => {
                    let duration = attempt_start.elapsed();
                    info!(candidate = %id, duration = ?duration, "Candidate succeeded");
                    attempts.push(FallbackAttempt::success(id, duration));
                    return FallbackOutcome {
                        result: Ok(value),
                        attempts,
                        duration: start.elapsed(),
                    };
                }
                Err(error) => {
                    let duration = attempt_start.elapsed();
                    warn!(candidate = %id, error = %error, duration = ?duration, "Candidate failed");
                    attempts.push(FallbackAttempt::failure(id, error.to_string(), duration));
                }
            }
        }

        warn!(attempted = attempts.len(), "All candidates failed");
        FallbackOutcome {
            result: Err(FallbackError::AllCandidatesFailed {
                attempts: attempts.clone(),
            }),
            attempts,
            duration: start.elapsed(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let outcome = FallbackExecutor::new()
            .execute(&Vec::<String>::new(), |_c| async { Ok::<_, String>(1) })
            .await;

        assert!(!outcome.is_success());
        assert!(matches!(outcome.result, Err(FallbackError::NoCandidates)));
        assert_eq!(outcome.attempts_count(), 0);
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = calls.clone();

        let outcome = FallbackExecutor::new()
            .execute(&names(&["a", "b"]), move |c| {
                seen.lock().unwrap().push(c.clone());
                let id = c.clone();
                async move { Ok::<_, String>(id) }
            })
            .await;

        assert_eq!(outcome.result.unwrap(), "a");
        assert_eq!(*calls.lock().unwrap(), names(&["a"]));
    }

    #[tokio::test]
    async fn test_falls_through_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = calls.clone();

        let outcome = FallbackExecutor::new()
            .execute(&names(&["A", "B", "C"]), move |c| {
                seen.lock().unwrap().push(c.clone());
                let id = c.clone();
                async move {
                    if id == "C" {
                        Ok(format!("result from {id}"))
                    } else {
                        Err(format!("{id} is down"))
                    }
                }
            })
            .await;

        assert_eq!(*calls.lock().unwrap(), names(&["A", "B", "C"]));
        assert_eq!(outcome.successful_candidate(), Some("C"));
        assert_eq!(outcome.failed_candidates(), vec!["A", "B"]);
        assert_eq!(outcome.attempts_count(), 3);
        assert_eq!(outcome.result.unwrap(), "result from C");
    }

    #[tokio::test]
    async fn test_all_failed_reports_every_attempt() {
        let outcome = FallbackExecutor::new()
            .execute(&names(&["x", "y"]), |c| {
                let id = c.clone();
                async move { Err::<(), _>(format!("{id} broke")) }
            })
            .await;

        match outcome.result {
            Err(FallbackError::AllCandidatesFailed { attempts }) => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].error.as_deref(), Some("x broke"));
                assert_eq!(attempts[1].candidate, "y");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_error_message_lists_candidates() {
        let err = FallbackError::AllCandidatesFailed {
            attempts: vec![
                FallbackAttempt::failure("openai", "timeout", Duration::ZERO),
                FallbackAttempt::failure("ollama", "refused", Duration::ZERO),
            ],
        };
        assert_eq!(
            err.to_string(),
            "All candidates failed: openai (timeout), ollama (refused)"
        );
    }
}
