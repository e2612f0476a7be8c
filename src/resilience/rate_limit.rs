//! Rate limiting: token bucket for burst control plus a fixed window for
//! sustained control.
//!
//! # Responsibilities
//! - Admit or deny requests per (client, endpoint) key
//! - Expose a read-only status view for signaling headers
//! - Sweep expired entries on a deterministic schedule
//!
//! # Design Decisions
//! - Both checks must pass; the bucket is evaluated first and consumes a
//!   token even when the window check then denies. Per-key state sits
//!   behind one lock so each admission decision is at least atomic per key.
//! - Deny never blocks: callers reject or queue, the limiter never sleeps.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::observability::metrics;

/// Default interval for the background sweep of expired entries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Limiter tuning parameters.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Fixed-window length.
    pub window: Duration,
    /// Maximum requests per window; also sets bucket capacity.
    pub max_requests: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 100,
        }
    }
}

/// Read-only admission snapshot for one key.
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    /// Whether a request would currently be admitted.
    pub allowed: bool,
    /// Requests counted in the current window.
    pub count: u32,
    /// Window limit.
    pub limit: u32,
    /// Milliseconds until the window resets.
    pub reset_after_ms: u64,
    /// Fresh token count (computed, not consumed).
    pub tokens: f64,
}

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn refill(&mut self, now: Instant, max_tokens: f64, refill_rate: f64) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(max_tokens);
        self.last_refill = now;
    }

    fn try_consume(&mut self, now: Instant, max_tokens: f64, refill_rate: f64) -> bool {
        self.refill(now, max_tokens, refill_rate);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

struct Entry {
    bucket: TokenBucket,
    count: u32,
    reset_at: Instant,
}

/// Per-key admission control. Keys are `"{client}:{endpoint}"`.
pub struct RateLimiter {
    entries: DashMap<String, Entry>,
    config: RateLimiterConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    fn refill_rate(&self) -> f64 {
        self.config.max_requests as f64 / self.config.window.as_secs_f64()
    }

    fn key(client: &str, endpoint: &str) -> String {
        format!("{client}:{endpoint}")
    }

    /// Check and consume an admission slot for one request.
    ///
    /// Token bucket first (burst), then fixed window (sustained). Both must
    /// pass for the request to be admitted.
    pub fn is_allowed(&self, client: &str, endpoint: &str) -> bool {
        let now = Instant::now();
        let max_tokens = self.config.max_requests as f64;
        let refill_rate = self.refill_rate();

        let mut entry = self
            .entries
            .entry(Self::key(client, endpoint))
            .or_insert_with(|| Entry {
                bucket: TokenBucket { tokens: max_tokens, last_refill: now },
                count: 0,
                reset_at: now + self.config.window,
            });

        if !entry.bucket.try_consume(now, max_tokens, refill_rate) {
            tracing::debug!(client, endpoint, "Rate limit denied: burst exhausted");
            metrics::record_rate_limited(endpoint, "burst");
            return false;
        }

        if now > entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.config.window;
        }
        if entry.count >= self.config.max_requests {
            tracing::debug!(client, endpoint, count = entry.count, "Rate limit denied: window full");
            metrics::record_rate_limited(endpoint, "window");
            return false;
        }
        entry.count += 1;
        true
    }

    /// Read-only status: computes a fresh token count but consumes nothing.
    pub fn status(&self, client: &str, endpoint: &str) -> RateLimitStatus {
        let now = Instant::now();
        let limit = self.config.max_requests;
        match self.entries.get(&Self::key(client, endpoint)) {
            Some(entry) => {
                let elapsed = now.duration_since(entry.bucket.last_refill).as_secs_f64();
                let tokens = (entry.bucket.tokens + elapsed * self.refill_rate())
                    .min(limit as f64);
                let (count, reset_after_ms) = if now > entry.reset_at {
                    (0, self.config.window.as_millis() as u64)
                } else {
                    (
                        entry.count,
                        entry.reset_at.saturating_duration_since(now).as_millis() as u64,
                    )
                };
                RateLimitStatus {
                    allowed: tokens >= 1.0 && count < limit,
                    count,
                    limit,
                    reset_after_ms,
                    tokens,
                }
            }
            None => RateLimitStatus {
                allowed: true,
                count: 0,
                limit,
                reset_after_ms: self.config.window.as_millis() as u64,
                tokens: limit as f64,
            },
        }
    }

    /// Clear state for a client, optionally scoped to one endpoint.
    pub fn reset(&self, client: &str, endpoint: Option<&str>) {
        match endpoint {
            Some(endpoint) => {
                self.entries.remove(&Self::key(client, endpoint));
            }
            None => {
                let prefix = format!("{client}:");
                self.entries.retain(|key, _| !key.starts_with(&prefix));
            }
        }
    }

    /// Remove entries whose window has expired. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.reset_at >= now);
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "Rate limiter sweep");
        }
        removed
    }

    /// Number of tracked keys.
    pub fn tracked_count(&self) -> usize {
        self.entries.len()
    }
}

/// Run the periodic sweep until shutdown. Started explicitly so tests can
/// control (or skip) the schedule.
pub fn spawn_sweeper(
    limiter: Arc<RateLimiter>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    limiter.sweep();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limiter sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(window_ms: u64, max_requests: u32) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            window: Duration::from_millis(window_ms),
            max_requests,
        })
    }

    #[test]
    fn admits_up_to_limit_then_denies() {
        let rl = limiter(1000, 3);
        assert!(rl.is_allowed("k", "/api"));
        assert!(rl.is_allowed("k", "/api"));
        assert!(rl.is_allowed("k", "/api"));
        assert!(!rl.is_allowed("k", "/api"));
    }

    #[tokio::test]
    async fn window_expiry_readmits() {
        let rl = limiter(200, 2);
        assert!(rl.is_allowed("k", "/api"));
        assert!(rl.is_allowed("k", "/api"));
        assert!(!rl.is_allowed("k", "/api"));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(rl.is_allowed("k", "/api"));
    }

    #[test]
    fn keys_are_independent() {
        let rl = limiter(1000, 1);
        assert!(rl.is_allowed("a", "/api"));
        assert!(rl.is_allowed("b", "/api"));
        assert!(rl.is_allowed("a", "/other"));
        assert!(!rl.is_allowed("a", "/api"));
    }

    #[test]
    fn tokens_bounded_between_zero_and_capacity() {
        let rl = limiter(1000, 5);
        // Drain well past empty.
        for _ in 0..20 {
            rl.is_allowed("k", "/api");
        }
        let status = rl.status("k", "/api");
        assert!(status.tokens >= 0.0);
        assert!(status.tokens <= 5.0);
    }

    #[test]
    fn status_does_not_consume() {
        let rl = limiter(1000, 2);
        for _ in 0..5 {
            let status = rl.status("k", "/api");
            assert!(status.allowed);
        }
        assert!(rl.is_allowed("k", "/api"));
        assert!(rl.is_allowed("k", "/api"));
        let status = rl.status("k", "/api");
        assert_eq!(status.count, 2);
        assert!(!status.allowed);
    }

    #[test]
    fn reset_clears_client_state() {
        let rl = limiter(60_000, 1);
        assert!(rl.is_allowed("k", "/a"));
        assert!(rl.is_allowed("k", "/b"));
        assert!(!rl.is_allowed("k", "/a"));

        rl.reset("k", Some("/a"));
        assert!(rl.is_allowed("k", "/a"));
        assert!(!rl.is_allowed("k", "/b"));

        rl.reset("k", None);
        assert!(rl.is_allowed("k", "/b"));
    }

    #[tokio::test]
    async fn sweep_removes_expired_entries() {
        let rl = limiter(50, 10);
        rl.is_allowed("k1", "/a");
        rl.is_allowed("k2", "/a");
        assert_eq!(rl.tracked_count(), 2);

        tokio::time::sleep(Duration::from_millis(80)).await;
        let removed = rl.sweep();
        assert_eq!(removed, 2);
        assert_eq!(rl.tracked_count(), 0);
    }
}
