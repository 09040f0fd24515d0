//! Fixed-window request throttle.
//!
//! Each provider owns one limiter. A request that would exceed the
//! window's cap suspends until the window resets and then proceeds. This
//! is a local throttle only; the remote vendor may still rate limit.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Default number of requests allowed per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 60;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct WindowState {
    requests_this_window: u32,
    window_reset_time: Option<Instant>,
}

/// Fixed-window counter.
///
/// The window opens lazily on the first request, so an idle limiter never
/// holds a stale reset time. The counter sits behind a blocking mutex that
/// is never held across an await.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    max_requests_per_window: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

impl FixedWindowLimiter {
    /// Creates a limiter allowing `max_requests_per_window` per `window`.
    ///
    /// A cap of zero is treated as one.
    pub fn new(max_requests_per_window: u32, window: Duration) -> Self {
        Self {
            max_requests_per_window: max_requests_per_window.max(1),
            window,
            state: Mutex::new(WindowState {
                requests_this_window: 0,
                window_reset_time: None,
            }),
        }
    }

    /// Maximum requests per window.
    pub fn max_requests_per_window(&self) -> u32 {
        self.max_requests_per_window
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Waits for a slot in the current window.
    pub async fn acquire(&self) {
        loop {
            let wait_until = {
                let mut state = self.lock_state();
                let now = Instant::now();
                self.roll(&mut state, now);

                if state.requests_this_window < self.max_requests_per_window {
                    state.requests_this_window += 1;
                    return;
                }

                state.window_reset_time.unwrap_or(now)
            };

            debug!(
                max = self.max_requests_per_window,
                wait = ?wait_until.saturating_duration_since(Instant::now()),
                "Rate limit reached, waiting for window reset"
            );
            tokio::time::sleep_until(wait_until).await;
        }
    }

    /// Takes a slot if one is free, without waiting.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock_state();
        self.roll(&mut state, Instant::now());

        if state.requests_this_window < self.max_requests_per_window {
            state.requests_this_window += 1;
            true
        } else {
            false
        }
    }

    /// Requests left in the current window.
    pub fn remaining(&self) -> u32 {
        let mut state = self.lock_state();
        self.roll(&mut state, Instant::now());
        self.max_requests_per_window - state.requests_this_window
    }

    // A panic mid-update leaves plain counters behind, so poison is ignored.
    fn lock_state(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn roll(&self, state: &mut WindowState, now: Instant) {
        match state.window_reset_time {
            Some(reset) if now < reset => {}
            _ => {
                state.requests_this_window = 0;
                state.window_reset_time = Some(now + self.window);
            }
        }
    }
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

// ============================================================================
// Tests
// ============================================================================
