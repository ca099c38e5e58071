//! L1 Store Adapter: bounded in-process LRU plus an optional remote KV
//! store for cross-process sharing.
//!
//! Grounded on the teacher's `lru` dependency and pool-lifecycle patterns in
//! `browser_pool` (bounded resource with eviction under a single mutex), and
//! on `harborgrid-justin-caddy/src/scheduling/queue.rs` for the
//! `redis::aio::ConnectionManager` client-construction style used for the
//! remote tier.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::{debug, warn};

use super::types::{CacheEntry, CacheOrigin, SelectorPerformance};
use crate::utils::constants::{DEFAULT_L1_MAX_BYTES, DEFAULT_L1_MAX_ITEMS};

/// Cap on the L1 short-lived selector-performance hot counter (spec §4.4:
/// recorded "in both L1 (short-lived hot counter) and L2 (long-lived
/// memory)"). Much smaller than the page cache since the key space is
/// (domain, element_type, selector) triples, not full pages.
const SELECTOR_HOT_CAP: usize = 2_000;

#[derive(Debug, thiserror::Error)]
pub enum L1Error {
    #[error("remote cache error: {0}")]
    Remote(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Estimate the serialized byte size of an entry's payload.
///
/// Shallow byte-size of the value plus recursive sizes for mappings and
/// sequences; unknown types count as a small constant, matching spec §4.2.
fn estimate_size(entry: &CacheEntry) -> usize {
    serde_json::to_vec(&entry.payload).map(|bytes| bytes.len()).unwrap_or(64)
}

struct LocalState {
    lru: LruCache<String, CacheEntry>,
    total_bytes: usize,
    max_items: usize,
    max_bytes: usize,
}

impl LocalState {
    fn new(max_items: usize, max_bytes: usize) -> Self {
        Self {
            lru: LruCache::new(NonZeroUsize::new(max_items.max(1)).unwrap()),
            total_bytes: 0,
            max_items,
            max_bytes,
        }
    }

    fn insert(&mut self, key: String, mut entry: CacheEntry) {
        entry.size_estimate = estimate_size(&entry);
        if let Some(old) = self.lru.peek(&key) {
            self.total_bytes = self.total_bytes.saturating_sub(old.size_estimate);
        }
        self.total_bytes += entry.size_estimate;
        self.lru.put(key, entry);
        self.evict_to_budget();
    }

    fn evict_to_budget(&mut self) {
        while self.lru.len() > self.max_items || self.total_bytes > self.max_bytes {
            match self.lru.pop_lru() {
                Some((_, evicted)) => {
                    self.total_bytes = self.total_bytes.saturating_sub(evicted.size_estimate);
                }
                None => break,
            }
        }
    }

    fn get(&mut self, key: &str) -> Option<CacheEntry> {
        self.lru.get(key).cloned()
    }

    fn sweep_expired(&mut self, now: i64) -> usize {
        let expired: Vec<String> = self
            .lru
            .iter()
            .filter(|(_, v)| v.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        let count = expired.len();
        for key in expired {
            if let Some(entry) = self.lru.pop(&key) {
                self.total_bytes = self.total_bytes.saturating_sub(entry.size_estimate);
            }
        }
        count
    }
}

/// L1 adapter: local bounded LRU plus an optional `redis`-backed remote tier.
///
/// Reads try remote first, falling back to local; writes go to both.
pub struct L1Store {
    local: Mutex<LocalState>,
    remote: Option<redis::aio::ConnectionManager>,
    selector_hot: Mutex<LruCache<String, SelectorPerformance>>,
}

impl L1Store {
    #[must_use]
    pub fn new(remote: Option<redis::aio::ConnectionManager>) -> Self {
        Self {
            local: Mutex::new(LocalState::new(DEFAULT_L1_MAX_ITEMS, DEFAULT_L1_MAX_BYTES)),
            remote,
            selector_hot: Mutex::new(LruCache::new(NonZeroUsize::new(SELECTOR_HOT_CAP).unwrap())),
        }
    }

    /// Build a remote connection manager from `REDIS_URL`, if set and reachable.
    pub async fn connect_remote(redis_url: &str) -> Option<redis::aio::ConnectionManager> {
        match redis::Client::open(redis_url) {
            Ok(client) => match client.get_connection_manager().await {
                Ok(manager) => Some(manager),
                Err(e) => {
                    warn!("L1 remote store unavailable, continuing with local-only L1: {e}");
                    None
                }
            },
            Err(e) => {
                warn!("invalid REDIS_URL, continuing with local-only L1: {e}");
                None
            }
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>, L1Error> {
        if let Some(manager) = &self.remote {
            let mut conn = manager.clone();
            let raw: Option<String> = redis::cmd("GET")
                .arg(key)
                .query_async(&mut conn)
                .await
                .unwrap_or(None);
            if let Some(raw) = raw {
                let entry: CacheEntry = serde_json::from_str(&raw)?;
                debug!(%key, "L1 remote hit");
                return Ok(Some(entry));
            }
        }

        let mut local = self.local.lock().expect("L1 local mutex poisoned");
        Ok(local.get(key))
    }

    pub async fn set(&self, key: String, mut entry: CacheEntry) -> Result<(), L1Error> {
        entry.origin = CacheOrigin::L1;

        if let Some(manager) = &self.remote {
            let mut conn = manager.clone();
            let serialized = serde_json::to_string(&entry)?;
            let mut cmd = redis::cmd("SET");
            cmd.arg(&key).arg(&serialized);
            if entry.ttl_seconds > 0 {
                cmd.arg("EX").arg(entry.ttl_seconds);
            }
            if let Err(e) = cmd.query_async::<_, ()>(&mut conn).await {
                warn!("L1 remote write failed, local tier still updated: {e}");
            }
        }

        let mut local = self.local.lock().expect("L1 local mutex poisoned");
        local.insert(key, entry);
        Ok(())
    }

    /// Remove entries past TTL from the local tier. Run on a 5-minute timer
    /// (spec §4.2). The remote tier relies on its own per-key TTL instead.
    pub fn sweep_expired(&self, now: i64) -> usize {
        let mut local = self.local.lock().expect("L1 local mutex poisoned");
        local.sweep_expired(now)
    }

    /// Record a selector attempt against the short-lived hot counter
    /// (spec §4.4). Bounded LRU keyed on (domain, element_type, selector); no
    /// TTL of its own, it just ages out under the eviction cap.
    pub fn record_selector_attempt(
        &self,
        domain: &str,
        element_type: &str,
        selector: &str,
        success: bool,
        find_time_ms: Option<f64>,
        now: i64,
    ) {
        let key = format!("{domain}|{element_type}|{selector}");
        let mut hot = self.selector_hot.lock().expect("L1 selector-hot mutex poisoned");
        if !hot.contains(&key) {
            hot.put(
                key.clone(),
                SelectorPerformance {
                    domain: domain.to_string(),
                    element_type: element_type.to_string(),
                    selector: selector.to_string(),
                    success_count: 0,
                    fail_count: 0,
                    last_used: now,
                    avg_find_time_ms: 0.0,
                },
            );
        }
        let entry = hot.get_mut(&key).expect("just inserted");
        if success {
            entry.success_count += 1;
        } else {
            entry.fail_count += 1;
        }
        entry.last_used = now;
        if let Some(ms) = find_time_ms {
            let total = (entry.success_count + entry.fail_count) as f64;
            entry.avg_find_time_ms += (ms - entry.avg_find_time_ms) / total;
        }
    }

    /// All hot-counter entries for (domain, element_type), unfiltered by
    /// success rate. Used as an L2-absent fallback for selector optimization.
    pub fn best_selectors_hot(&self, domain: &str, element_type: &str) -> Vec<SelectorPerformance> {
        let mut hot = self.selector_hot.lock().expect("L1 selector-hot mutex poisoned");
        hot.iter()
            .filter(|(_, v)| v.domain == domain && v.element_type == element_type)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::types::CachedPage;

    fn sample_entry(ttl: u64) -> CacheEntry {
        CacheEntry {
            key: "k".into(),
            payload: CachedPage {
                cache_key: "k".into(),
                url: "https://example.com".into(),
                title: "t".into(),
                content: "c".into(),
                content_hash: "h".into(),
                word_count: 1,
                selector_used: None,
                extraction_method: "universal".into(),
                ttl_seconds: ttl,
                summary: None,
                key_points: None,
                entities: None,
                success_rate: 1.0,
            },
            stored_at: 0,
            ttl_seconds: ttl,
            origin: CacheOrigin::L1,
            size_estimate: 0,
        }
    }

    #[tokio::test]
    async fn set_then_get_local_only() {
        let store = L1Store::new(None);
        store.set("k".into(), sample_entry(3600)).await.unwrap();
        let got = store.get("k").await.unwrap();
        assert!(got.is_some());
        assert_eq!(got.unwrap().payload.url, "https://example.com");
    }

    #[test]
    fn eviction_respects_item_cap() {
        let mut state = LocalState::new(2, DEFAULT_L1_MAX_BYTES);
        state.insert("a".into(), sample_entry(0));
        state.insert("b".into(), sample_entry(0));
        state.insert("c".into(), sample_entry(0));
        assert_eq!(state.lru.len(), 2);
        assert!(state.lru.peek("a").is_none());
    }

    #[test]
    fn selector_hot_counter_accumulates_across_attempts() {
        let store = L1Store::new(None);
        store.record_selector_attempt("example.com", "content", ".price", true, Some(10.0), 1);
        store.record_selector_attempt("example.com", "content", ".price", true, Some(20.0), 2);
        store.record_selector_attempt("example.com", "content", ".price", false, None, 3);

        let hot = store.best_selectors_hot("example.com", "content");
        assert_eq!(hot.len(), 1);
        assert_eq!(hot[0].success_count, 2);
        assert_eq!(hot[0].fail_count, 1);
        assert_eq!(hot[0].last_used, 3);
        assert!((hot[0].avg_find_time_ms - 15.0).abs() < 1e-6);
    }
}
