//! Per-user request budgets for the list endpoints

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::routes::user_tag;

/// Open windows past this count are swept for expiry on the next check
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtectedEndpoint {
    ListSync,
    ListFetch,
}

impl ProtectedEndpoint {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ListSync => "list_sync",
            Self::ListFetch => "list_fetch",
        }
    }
}

/// Fixed-window limiter: each endpoint has its own budget, spent per user
pub struct EndpointRateLimiter {
    windows: Mutex<HashMap<(ProtectedEndpoint, String), FixedWindow>>,
    window: Duration,
    sync: Budget,
    fetch: Budget,
}

struct Budget {
    limit: u32,
    allowed: AtomicU64,
    limited: AtomicU64,
}

impl Budget {
    fn new(limit: u32) -> Self {
        Self {
            limit,
            allowed: AtomicU64::new(0),
            limited: AtomicU64::new(0),
        }
    }

    fn counts(&self) -> EndpointCounts {
        EndpointCounts {
            allowed: self.allowed.load(Ordering::Relaxed),
            limited: self.limited.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EndpointCounts {
    pub allowed: u64,
    pub limited: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitMetricsSnapshot {
    pub list_sync: EndpointCounts,
    pub list_fetch: EndpointCounts,
}

#[derive(Debug, Clone, Copy)]
struct FixedWindow {
    opened_at: Instant,
    admitted: u32,
}

impl FixedWindow {
    const fn open(now: Instant) -> Self {
        Self {
            opened_at: now,
            admitted: 0,
        }
    }

    fn expired(&self, now: Instant, length: Duration) -> bool {
        now.duration_since(self.opened_at) >= length
    }

    /// Count one request, or return the time left until the window reopens
    fn admit(&mut self, now: Instant, length: Duration, limit: u32) -> Result<(), Duration> {
        if self.expired(now, length) {
            *self = Self::open(now);
        }
        if self.admitted >= limit {
            return Err(length.saturating_sub(now.duration_since(self.opened_at)));
        }
        self.admitted += 1;
        Ok(())
    }
}

impl EndpointRateLimiter {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.rate_limit_window,
            config.sync_rate_limit_per_window,
            config.fetch_rate_limit_per_window,
        )
    }

    fn new(window: Duration, sync_limit: u32, fetch_limit: u32) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window,
            sync: Budget::new(sync_limit),
            fetch: Budget::new(fetch_limit),
        }
    }

    pub async fn check(&self, endpoint: ProtectedEndpoint, user_id: &str) -> Result<(), AppError> {
        let budget = self.budget(endpoint);
        let now = Instant::now();
        let verdict = {
            let mut windows = self.windows.lock().await;
            if windows.len() >= SWEEP_THRESHOLD {
                let length = self.window;
                windows.retain(|_, window| !window.expired(now, length));
            }
            windows
                .entry((endpoint, user_id.to_string()))
                .or_insert_with(|| FixedWindow::open(now))
                .admit(now, self.window, budget.limit)
        };

        match verdict {
            Ok(()) => {
                budget.allowed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(wait) => {
                budget.limited.fetch_add(1, Ordering::Relaxed);
                let retry_after_secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                tracing::warn!(
                    endpoint = endpoint.label(),
                    user = %user_tag(user_id),
                    retry_after_secs,
                    "Rate limit exceeded"
                );
                Err(AppError::too_many_requests(
                    format!("too many {} requests", endpoint.label()),
                    retry_after_secs,
                ))
            }
        }
    }

    pub fn metrics_snapshot(&self) -> RateLimitMetricsSnapshot {
        RateLimitMetricsSnapshot {
            list_sync: self.sync.counts(),
            list_fetch: self.fetch.counts(),
        }
    }

    const fn budget(&self, endpoint: ProtectedEndpoint) -> &Budget {
        match endpoint {
            ProtectedEndpoint::ListSync => &self.sync,
            ProtectedEndpoint::ListFetch => &self.fetch,
        }
    }

    #[cfg(test)]
    async fn open_windows(&self) -> usize {
        self.windows.lock().await.len()
    }
}
