//! Shared constants used throughout the crate to avoid magic numbers.

/// Chrome user agent string used for browser launches and stealth injection.
///
/// Updated: 2025-01-29 to Chrome 132 (current stable). Update quarterly.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Screenshot quality: 80% JPEG compression.
pub const SCREENSHOT_QUALITY: u8 = 80;

/// Default agent step budget when `SMOLAGENTS_MAX_STEPS` is unset.
pub const DEFAULT_MAX_STEPS: u32 = 12;

/// Default output chunk size (characters) for streaming the final answer.
pub const DEFAULT_STREAM_CHUNK_SIZE: usize = 75;

/// Pacing delay between streamed chunks.
pub const STREAM_CHUNK_DELAY_MS: u64 = 20;

/// How long a completed Run's final answer is retained for reconnecting subscribers.
pub const LAST_RESULT_RETENTION_SECS: i64 = 300;

/// Number of prior exchanges concatenated into the context prelude.
pub const CONTEXT_HISTORY_TURNS: usize = 6;

/// Ceiling on simultaneous background tabs.
pub const MAX_BACKGROUND_TABS: usize = 3;

/// Default selector-performance entry TTL: 90 days.
pub const DEFAULT_SELECTOR_TTL_SECS: u64 = 7_776_000;

/// Default L1 item cap.
pub const DEFAULT_L1_MAX_ITEMS: usize = 5_000;

/// Default L1 byte budget: 200 MB.
pub const DEFAULT_L1_MAX_BYTES: usize = 200 * 1024 * 1024;

/// Interval between L1 TTL sweeps.
pub const L1_SWEEP_INTERVAL_SECS: u64 = 300;

/// Interval between session-artifact mirror copies.
pub const SESSION_MIRROR_INTERVAL_SECS: u64 = 300;

/// Default timeout waiting for an element to appear, milliseconds.
pub const TIMEOUT_ELEMENT_FIND_MS: u64 = 10_000;

/// Default timeout for an outbound HTTP request, milliseconds.
pub const TIMEOUT_HTTP_REQUEST_MS: u64 = 30_000;

/// Default timeout for an HTTP-backed extraction round-trip, milliseconds.
pub const TIMEOUT_HTTP_EXTRACTION_MS: u64 = 45_000;

/// Default timeout waiting for page load/navigation, milliseconds.
pub const TIMEOUT_PAGE_LOAD_MS: u64 = 30_000;

/// Default result count for `web-search` when the caller doesn't specify one.
pub const SEARCH_MAX_RESULTS_DEFAULT: usize = 5;

/// Hard ceiling on `web-search` result count regardless of caller request.
pub const SEARCH_MAX_RESULTS_LIMIT: usize = 10;
