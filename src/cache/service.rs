//! Tiered Cache Service: L1→L2 lookup, dual-write promotion, TTL policy,
//! bypass rules, and selector-performance tracking.
//!
//! Grounded line-for-line on `original_source/.../cache_service.py`'s
//! `ExtractorCacheService` (`should_bypass_cache`, `get_cache_ttl`,
//! `get_optimized_selector`, `_sanitize_value`).

use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, warn};

use super::key::make_cache_key;
use super::l1::L1Store;
use super::l2::L2Store;
use super::types::{CacheEntry, CacheOrigin, CachedPage, RawValue, SelectorPerformance};

const WELL_KNOWN_SEARCH_HOSTS: &[&str] = &[
    "google.com",
    "bing.com",
    "duckduckgo.com",
    "yahoo.com",
    "baidu.com",
];

const BYPASS_PATH_FRAGMENTS: &[&str] = &["/api/", "/live/", "/current/", "/now/", "/realtime/"];

const DYNAMIC_SELECTOR_PATTERNS: &[&str] = &[".price", ".stock", ".timestamp", ".live"];

const STRUCTURAL_SELECTOR_PATTERNS: &[&str] = &[
    "nav", "header", "footer", "menu", "form", "input[", "button[", "[role",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlPolicy {
    Bypass,
    Dynamic,
    Structural,
    PlainText,
    Default,
}

impl TtlPolicy {
    #[must_use]
    pub fn seconds(self) -> u64 {
        match self {
            TtlPolicy::Bypass | TtlPolicy::Dynamic => 0,
            TtlPolicy::Structural => 86_400,
            TtlPolicy::PlainText => 1_800,
            TtlPolicy::Default => 3_600,
        }
    }
}

fn looks_dynamic(selector: &str) -> bool {
    let lower = selector.to_ascii_lowercase();
    DYNAMIC_SELECTOR_PATTERNS.iter().any(|p| lower.contains(p))
}

fn looks_structural(selector: &str) -> bool {
    let lower = selector.to_ascii_lowercase();
    STRUCTURAL_SELECTOR_PATTERNS.iter().any(|p| lower.contains(p))
}

fn has_css_syntax(selector: &str) -> bool {
    selector.contains(|c: char| "#.[]:>+~*".contains(c))
}

/// Decide whether a (url, selector, context) triple matches a bypass rule
/// (spec §4.4): context contains "search", host is a well-known search
/// engine, or the path matches a realtime/API fragment.
#[must_use]
pub fn should_bypass(url: &str, context: &str) -> bool {
    if context.to_ascii_lowercase().contains("search") {
        return true;
    }
    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };
    if let Some(host) = parsed.host_str() {
        let host = host.to_ascii_lowercase();
        if WELL_KNOWN_SEARCH_HOSTS.iter().any(|h| host == *h || host.ends_with(&format!(".{h}"))) {
            return true;
        }
    }
    let path = parsed.path().to_ascii_lowercase();
    BYPASS_PATH_FRAGMENTS.iter().any(|frag| path.contains(frag))
}

/// Compute the TTL policy for a (url, selector, context) triple.
#[must_use]
pub fn ttl_policy(url: &str, selector: Option<&str>, context: &str) -> TtlPolicy {
    if should_bypass(url, context) {
        return TtlPolicy::Bypass;
    }
    let Some(selector) = selector else {
        return TtlPolicy::Default;
    };
    if looks_dynamic(selector) {
        TtlPolicy::Dynamic
    } else if looks_structural(selector) {
        TtlPolicy::Structural
    } else if !has_css_syntax(selector) {
        TtlPolicy::PlainText
    } else {
        TtlPolicy::Default
    }
}

/// Unwrap a value that may be a native string, a `.value`-bearing wrapper,
/// or a tuple — a single helper used consistently for url/selector/context
/// inputs (spec §4.4 "Input sanitization").
#[must_use]
pub fn sanitize_value(value: &RawValue) -> String {
    value.sanitize()
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("L1 error: {0}")]
    L1(#[from] super::l1::L1Error),
    #[error("L2 error: {0}")]
    L2(#[from] super::l2::L2Error),
}

/// Threshold above which a cached selector is considered "optimized" enough
/// to recommend (spec §4.4: "first whose success rate exceeds 80%").
const OPTIMIZED_SELECTOR_THRESHOLD: f64 = 0.8;

pub struct CacheService {
    l1: L1Store,
    l2: Option<L2Store>,
    now_override: AtomicI64,
}

impl CacheService {
    #[must_use]
    pub fn new(l1: L1Store, l2: Option<L2Store>) -> Self {
        Self {
            l1,
            l2,
            now_override: AtomicI64::new(0),
        }
    }

    fn now(&self) -> i64 {
        let overridden = self.now_override.load(Ordering::Relaxed);
        if overridden != 0 {
            overridden
        } else {
            chrono::Utc::now().timestamp()
        }
    }

    #[cfg(test)]
    fn set_now_for_test(&self, now: i64) {
        self.now_override.store(now, Ordering::Relaxed);
    }

    /// Read path: bypass check, L1, then L2 with write-back promotion.
    pub async fn get(
        &self,
        url: &str,
        selector: Option<&str>,
        context: &str,
    ) -> Result<Option<(CachedPage, CacheOrigin)>, CacheError> {
        if should_bypass(url, context) {
            return Ok(None);
        }

        let key = make_cache_key("page", url, selector, context);

        if let Some(entry) = self.l1.get(&key).await? {
            if !entry.is_expired(self.now()) {
                debug!(%key, "cache hit L1");
                return Ok(Some((entry.payload, CacheOrigin::L1)));
            }
        }

        let Some(l2) = &self.l2 else {
            return Ok(None);
        };

        match l2.get_page(&key).await {
            Ok(Some(page)) => {
                debug!(%key, "cache hit L2, promoting to L1");
                let entry = CacheEntry {
                    key: key.clone(),
                    payload: page.clone(),
                    stored_at: self.now(),
                    ttl_seconds: page.ttl_seconds,
                    origin: CacheOrigin::L2,
                    size_estimate: 0,
                };
                if let Err(e) = self.l1.set(key, entry).await {
                    warn!("L1 write-back failed after L2 hit: {e}");
                }
                Ok(Some((page, CacheOrigin::L2)))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!("L2 unavailable on read, degrading to L1-only: {e}");
                Ok(None)
            }
        }
    }

    /// Write path: TTL policy, L1 write, conditional L2 persistence.
    pub async fn put(
        &self,
        url: &str,
        selector: Option<&str>,
        context: &str,
        mut page: CachedPage,
    ) -> Result<(), CacheError> {
        let policy = ttl_policy(url, selector, context);
        let ttl = policy.seconds();
        if ttl == 0 {
            return Ok(());
        }

        let key = make_cache_key("page", url, selector, context);
        page.cache_key = key.clone();
        page.ttl_seconds = ttl;

        let entry = CacheEntry {
            key: key.clone(),
            payload: page.clone(),
            stored_at: self.now(),
            ttl_seconds: ttl,
            origin: CacheOrigin::L1,
            size_estimate: 0,
        };
        self.l1.set(key, entry).await?;

        let is_universal = selector.is_none();
        let encoded_size = serde_json::to_vec(&page).map(|b| b.len()).unwrap_or(0);
        let persist_to_l2 = is_universal || ttl >= 3_600 || encoded_size >= 10_240;

        if persist_to_l2
            && let Some(l2) = &self.l2
            && let Err(e) = l2.put_page(&page).await
        {
            warn!("L2 persistence failed, entry remains L1-only: {e}");
        }

        Ok(())
    }

    /// Record a selector attempt against both tiers: the L1 short-lived hot
    /// counter and the L2 long-lived memory.
    pub async fn record_selector_attempt(
        &self,
        domain: &str,
        element_type: &str,
        selector: &str,
        success: bool,
        find_time_ms: Option<f64>,
    ) {
        self.l1
            .record_selector_attempt(domain, element_type, selector, success, find_time_ms, self.now());

        if let Some(l2) = &self.l2
            && let Err(e) = l2.put_selector(domain, element_type, selector, success, find_time_ms).await
        {
            warn!("selector-performance write to L2 failed: {e}");
        }
    }

    /// Ask L2 for the best selector for (host, element-type), filtered by a
    /// success-rate floor of 80%. Falls back to the L1 hot counter when L2 is
    /// absent or has no qualifying entry yet.
    pub async fn get_optimized_selector(
        &self,
        domain: &str,
        element_type: &str,
    ) -> Option<SelectorPerformance> {
        if let Some(l2) = &self.l2
            && let Ok(best) = l2.get_best_selectors(domain, element_type).await
            && let Some(found) = best.into_iter().find(|s| s.success_rate() > OPTIMIZED_SELECTOR_THRESHOLD)
        {
            return Some(found);
        }

        let mut hot = self.l1.best_selectors_hot(domain, element_type);
        hot.sort_by(|a, b| b.success_rate().partial_cmp(&a.success_rate()).unwrap_or(std::cmp::Ordering::Equal));
        hot.into_iter().find(|s| s.success_rate() > OPTIMIZED_SELECTOR_THRESHOLD)
    }

    pub fn l1_sweep(&self) -> usize {
        self.l1.sweep_expired(self.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bypass_on_search_context() {
        assert!(should_bypass("https://example.com", "search results"));
    }

    #[test]
    fn bypass_on_realtime_path() {
        assert!(should_bypass("https://example.com/api/live/", ""));
    }

    #[test]
    fn ttl_dynamic_selector_is_zero() {
        assert_eq!(ttl_policy("https://example.com", Some(".price"), ""), TtlPolicy::Dynamic);
        assert_eq!(TtlPolicy::Dynamic.seconds(), 0);
    }

    #[test]
    fn ttl_structural_is_a_day() {
        assert_eq!(
            ttl_policy("https://example.com", Some("nav.main"), ""),
            TtlPolicy::Structural
        );
        assert_eq!(TtlPolicy::Structural.seconds(), 86_400);
    }

    #[test]
    fn ttl_plain_text_selector() {
        assert_eq!(
            ttl_policy("https://example.com", Some("Read More"), ""),
            TtlPolicy::PlainText
        );
    }

    #[test]
    fn ttl_default_when_no_selector() {
        assert_eq!(ttl_policy("https://example.com", None, ""), TtlPolicy::Default);
    }

    #[tokio::test]
    async fn put_is_noop_on_bypass() {
        let service = CacheService::new(L1Store::new(None), None);
        let page = CachedPage {
            cache_key: String::new(),
            url: "https://example.com".into(),
            title: "t".into(),
            content: "c".into(),
            content_hash: "h".into(),
            word_count: 1,
            selector_used: Some(".price".into()),
            extraction_method: "selector".into(),
            ttl_seconds: 0,
            summary: None,
            key_points: None,
            entities: None,
            success_rate: 1.0,
        };
        service.put("https://example.com", Some(".price"), "", page).await.unwrap();
        let got = service.get("https://example.com", Some(".price"), "").await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let service = CacheService::new(L1Store::new(None), None);
        service.set_now_for_test(1_000);
        let page = CachedPage {
            cache_key: String::new(),
            url: "https://docs.example.org/guide".into(),
            title: "Guide".into(),
            content: "hello world".into(),
            content_hash: "h".into(),
            word_count: 2,
            selector_used: None,
            extraction_method: "universal".into(),
            ttl_seconds: 0,
            summary: None,
            key_points: None,
            entities: None,
            success_rate: 1.0,
        };
        service.put("https://docs.example.org/guide", None, "", page).await.unwrap();
        let got = service.get("https://docs.example.org/guide", None, "").await.unwrap();
        assert!(got.is_some());
        let (page, origin) = got.unwrap();
        assert_eq!(origin, CacheOrigin::L1);
        assert_eq!(page.content, "hello world");
    }
}
