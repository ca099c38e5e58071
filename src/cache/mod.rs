//! Tiered extraction cache: key normalization, the two storage tiers, and
//! the service that ties them together with bypass/TTL policy.

pub mod key;
pub mod l1;
pub mod l2;
pub mod service;
pub mod types;

pub use key::{make_cache_key, normalize_selector, normalize_url};
pub use l1::{L1Error, L1Store};
pub use l2::{L2Error, L2Store};
pub use service::{should_bypass, ttl_policy, CacheError, CacheService, TtlPolicy};
pub use types::{CacheEntry, CacheOrigin, CacheStats, CachedPage, CachedWorkflow, RawValue, SelectorPerformance};
