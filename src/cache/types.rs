//! Data model for the tiered extraction cache.

use serde::{Deserialize, Serialize};

/// Which layer served (or should persist) a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheOrigin {
    L1,
    L2,
}

/// An extraction record, the payload cached under a (url, selector, context) key.
///
/// Carries the supplemental fields the original schema exposes (`summary`,
/// `key_points`, `entities`, `success_rate`) alongside the minimal attribute
/// list from the data model: summarization itself is out of scope, so those
/// fields are simply threaded through as opaque nullable data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPage {
    pub cache_key: String,
    pub url: String,
    pub title: String,
    pub content: String,
    pub content_hash: String,
    pub word_count: usize,
    pub selector_used: Option<String>,
    pub extraction_method: String,
    pub ttl_seconds: u64,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub key_points: Option<Vec<String>>,
    #[serde(default)]
    pub entities: Option<Vec<String>>,
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
}

fn default_success_rate() -> f64 {
    1.0
}

/// A cache entry as stored by the L1 adapter: payload plus bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: CachedPage,
    pub stored_at: i64,
    pub ttl_seconds: u64,
    pub origin: CacheOrigin,
    pub size_estimate: usize,
}

impl CacheEntry {
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        if self.ttl_seconds == 0 {
            return false;
        }
        now.saturating_sub(self.stored_at) as u64 >= self.ttl_seconds
    }
}

/// Per-(domain, element-type, selector) performance record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorPerformance {
    pub domain: String,
    pub element_type: String,
    pub selector: String,
    pub success_count: u64,
    pub fail_count: u64,
    pub last_used: i64,
    pub avg_find_time_ms: f64,
}

impl SelectorPerformance {
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.fail_count;
        if total == 0 {
            return 0.0;
        }
        self.success_count as f64 / total as f64
    }
}

/// Lower-priority memoization lane for whole agent-step results, keyed by
/// workflow input hash. Scaffolding: not wired into the hot extraction path,
/// matching the original's own unused-but-present `/cache/workflow` route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedWorkflow {
    pub workflow_id: String,
    pub workflow_type: String,
    pub input_hash: String,
    pub result: serde_json::Value,
    pub accessed_count: u64,
    pub total_tokens_saved: u64,
}

/// Aggregate counts/sizes returned by the L2 `stats()` operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub page_count: u64,
    pub selector_count: u64,
    pub workflow_count: u64,
    pub total_bytes: u64,
}

/// A value that may arrive pre-wrapped, e.g. from a browser evaluation
/// result or an upstream service, needing a single consistent unwrap.
///
/// Mirrors the Tool Registry/browser adapter's `unwrap_remote_value` contract
/// (spec §9 "wrapper/duck-typing around remote objects") reused here because
/// cache inputs (url/selector/context) may arrive the same way.
#[derive(Debug, Clone)]
pub enum RawValue {
    Scalar(String),
    Wrapped(Box<RawValue>),
    Tuple(Vec<RawValue>),
}

impl RawValue {
    /// Unwrap a possibly-wrapped value down to its scalar string form.
    ///
    /// Tuples take their first element, matching the original sanitizer's
    /// "arrives as native strings, `.value`-bearing wrappers, or tuples"
    /// contract.
    #[must_use]
    pub fn sanitize(&self) -> String {
        match self {
            RawValue::Scalar(s) => s.clone(),
            RawValue::Wrapped(inner) => inner.sanitize(),
            RawValue::Tuple(items) => items.first().map(RawValue::sanitize).unwrap_or_default(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Scalar(value.to_string())
    }
}
