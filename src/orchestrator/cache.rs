//! Last-known-good response cache for external-service fallback.
//!
//! # Design Decisions
//! - Write-through on every successful external call
//! - Entries are only served within their TTL; stale entries are as good
//!   as absent
//! - Sweep runs on an explicit schedule so tests control it

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::observability::metrics;

struct CachedValue {
    value: Value,
    stored_at: Instant,
}

/// A thread-safe TTL cache keyed by `service:operation:context`.
pub struct FallbackCache {
    entries: DashMap<String, CachedValue>,
    ttl: Duration,
}

impl FallbackCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Fetch a value if present and still fresh.
    pub fn get(&self, key: &str) -> Option<Value> {
        let hit = self
            .entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone());
        metrics::record_cache_lookup(hit.is_some());
        hit
    }

    /// Store a value, refreshing its TTL.
    pub fn put(&self, key: impl Into<String>, value: Value) {
        self.entries.insert(
            key.into(),
            CachedValue {
                value,
                stored_at: Instant::now(),
            },
        );
        metrics::record_cache_size(self.entries.len());
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "Fallback cache sweep");
        }
        metrics::record_cache_size(self.entries.len());
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Run the periodic sweep until shutdown.
pub fn spawn_sweeper(
    cache: Arc<FallbackCache>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    cache.sweep();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Cache sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stores_and_fetches_fresh_entries() {
        let cache = FallbackCache::new(Duration::from_secs(60));
        assert!(cache.get("voice:call:u1").is_none());
        cache.put("voice:call:u1", json!({ "ok": true }));
        assert_eq!(cache.get("voice:call:u1").unwrap(), json!({ "ok": true }));
    }

    #[tokio::test]
    async fn expired_entries_are_not_served() {
        let cache = FallbackCache::new(Duration::from_millis(40));
        cache.put("k", json!(1));
        assert!(cache.get("k").is_some());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get("k").is_none());
    }

    #[tokio::test]
    async fn sweep_drops_only_expired() {
        let cache = FallbackCache::new(Duration::from_millis(50));
        cache.put("old", json!(1));
        tokio::time::sleep(Duration::from_millis(70)).await;
        cache.put("new", json!(2));
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("new").is_some());
    }

    #[test]
    fn put_refreshes_existing_entry() {
        let cache = FallbackCache::new(Duration::from_secs(60));
        cache.put("k", json!(1));
        cache.put("k", json!(2));
        assert_eq!(cache.get("k").unwrap(), json!(2));
        assert_eq!(cache.len(), 1);
    }
}
