//! Per-client sliding-window admission control.
//!
//! Each client IP gets a window that opens on its first request. Requests
//! inside the window are counted and admitted up to the limit; the first
//! request after the window has elapsed opens a new one. Idle entries are
//! evicted by [`SlidingWindowLimiter::sweep`].
//!
//! # Example
//!
//! ```
//! use songbridge_core::rate_limit::SlidingWindowLimiter;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let limiter = SlidingWindowLimiter::api();
//! if let Err(limited) = limiter.check("203.0.113.7") {
//!     eprintln!("{limited}");
//! }
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::header::HeaderMap;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Default window length for both surfaces.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Requests per window on the web form surface.
pub const WEB_MAX_REQUESTS: u32 = 30;

/// Requests per window on the programmatic API surface.
pub const API_MAX_REQUESTS: u32 = 10;

/// A rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
    "Too many requests\n  Suggestion: Retry in {} seconds",
    retry_after.as_secs().max(1)
)]
pub struct RateLimited {
    pub retry_after: Duration,
}

#[derive(Debug, Clone, Copy)]
struct WindowState {
    count: u32,
    first_request_at: Instant,
    last_request_at: Instant,
}

#[derive(Debug)]
pub struct SlidingWindowLimiter {
    window: Duration,
    max_requests: u32,
    clients: DashMap<String, WindowState>,
}

impl SlidingWindowLimiter {
    #[must_use]
    #[instrument(skip_all, fields(window_ms = window.as_millis(), max_requests = max_requests))]
    pub fn new(window: Duration, max_requests: u32) -> Self {
        debug!("creating rate limiter");
        Self {
            window,
            max_requests,
            clients: DashMap::new(),
        }
    }

    #[must_use]
    pub fn web() -> Self {
        Self::new(WINDOW, WEB_MAX_REQUESTS)
    }

    #[must_use]
    pub fn api() -> Self {
        Self::new(WINDOW, API_MAX_REQUESTS)
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    #[must_use]
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Number of clients currently tracked.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    /// Records a request from `ip` and reports whether it is admitted.
    pub fn is_allowed(&self, ip: &str) -> bool {
        self.check(ip).is_ok()
    }

    /// Records a request from `ip`.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimited`] with the time left in the current window when
    /// `ip` is over the limit.
    pub fn check(&self, ip: &str) -> Result<(), RateLimited> {
        let now = Instant::now();
        let mut entry = self.clients.entry(ip.to_string()).or_insert(WindowState {
            count: 0,
            first_request_at: now,
            last_request_at: now,
        });
        let state = entry.value_mut();

        let elapsed = now.duration_since(state.first_request_at);
        if elapsed > self.window {
            state.count = 0;
            state.first_request_at = now;
        }
        state.count = state.count.saturating_add(1);
        state.last_request_at = now;

        if state.count <= self.max_requests {
            return Ok(());
        }
        let retry_after = self
            .window
            .saturating_sub(now.duration_since(state.first_request_at));
        debug!(ip, count = state.count, "request rate limited");
        Err(RateLimited { retry_after })
    }

    /// Evicts clients idle for more than twice the window. Returns how many.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let idle_limit = self.window.saturating_mul(2);
        let before = self.clients.len();
        self.clients
            .retain(|_, state| now.duration_since(state.last_request_at) <= idle_limit);
        let evicted = before.saturating_sub(self.clients.len());
        if evicted > 0 {
            debug!(evicted, "swept idle rate limit entries");
        }
        evicted
    }

    /// Runs [`SlidingWindowLimiter::sweep`] every `every` until the handle is aborted.
    #[must_use]
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.sweep();
            }
        })
    }
}

/// Client IP for rate limiting.
///
/// Uses the first address in `x-forwarded-for`, then `x-real-ip`, then
/// `fallback` (normally the socket peer address).
#[must_use]
pub fn client_ip(headers: &HeaderMap, fallback: &str) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }
    let real = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = real {
        return ip.to_string();
    }
    if fallback.is_empty() {
        warn!("no client address available, sharing the anonymous bucket");
        return "unknown".to_string();
    }
    fallback.to_string()
}
