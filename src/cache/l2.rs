//! L2 Store Adapter: `reqwest` client against the durable page/selector
//! store (spec §4.3, §6).
//!
//! Wire detail grounded on `original_source/duckdb-service/duckdb_service.py`'s
//! route table: `POST page`, `GET page/{cache_key}`, `POST element`,
//! `GET element/{domain}/{element_type}`, `GET stats`, `DELETE expired`.
//! Base URL comes from the `DUCKDB_URL` environment key (spec §6).

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::types::{CacheStats, CachedPage, SelectorPerformance};

#[derive(Debug, thiserror::Error)]
pub enum L2Error {
    #[error("L2 transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("L2 returned an unexpected status: {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Serialize)]
struct PutPageRequest<'a> {
    cache_key: &'a str,
    url: &'a str,
    title: &'a str,
    content: &'a str,
    content_hash: &'a str,
    word_count: usize,
    summary: Option<&'a str>,
    key_points: Option<&'a [String]>,
    entities: Option<&'a [String]>,
    selector_used: Option<&'a str>,
    extraction_method: &'a str,
    ttl_seconds: u64,
}

#[derive(Deserialize)]
struct PutPageResponse {
    #[allow(dead_code)]
    status: String,
    #[allow(dead_code)]
    expires: Option<i64>,
}

#[derive(Serialize)]
struct PutSelectorRequest<'a> {
    domain: &'a str,
    element_type: &'a str,
    selector: &'a str,
    success: bool,
    find_time_ms: Option<f64>,
}

/// Thin request/response client for the durable store. Transport failures
/// are the caller's concern (cache-layer-unavailable is handled by the
/// Tiered Cache Service, not here).
pub struct L2Store {
    client: reqwest::Client,
    base_url: String,
}

impl L2Store {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn get_page(&self, cache_key: &str) -> Result<Option<CachedPage>, L2Error> {
        let url = format!("{}/page/{cache_key}", self.base_url);
        let resp = self.client.get(&url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(L2Error::Status(resp.status()));
        }
        Ok(Some(resp.json::<CachedPage>().await?))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn put_page(&self, page: &CachedPage) -> Result<(), L2Error> {
        let url = format!("{}/page", self.base_url);
        let body = PutPageRequest {
            cache_key: &page.cache_key,
            url: &page.url,
            title: &page.title,
            content: &page.content,
            content_hash: &page.content_hash,
            word_count: page.word_count,
            summary: page.summary.as_deref(),
            key_points: page.key_points.as_deref(),
            entities: page.entities.as_deref(),
            selector_used: page.selector_used.as_deref(),
            extraction_method: &page.extraction_method,
            ttl_seconds: page.ttl_seconds,
        };
        let resp = self.client.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(L2Error::Status(resp.status()));
        }
        let _ = resp.json::<PutPageResponse>().await;
        Ok(())
    }

    pub async fn put_selector(
        &self,
        domain: &str,
        element_type: &str,
        selector: &str,
        success: bool,
        find_time_ms: Option<f64>,
    ) -> Result<(), L2Error> {
        let url = format!("{}/element", self.base_url);
        let body = PutSelectorRequest {
            domain,
            element_type,
            selector,
            success,
            find_time_ms,
        };
        let resp = self.client.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(L2Error::Status(resp.status()));
        }
        Ok(())
    }

    /// Ordered selector-performance records for (domain, element_type),
    /// sorted by (success - failure) desc then avg find-time asc, limited
    /// to 5 by the server per spec §4.3.
    pub async fn get_best_selectors(
        &self,
        domain: &str,
        element_type: &str,
    ) -> Result<Vec<SelectorPerformance>, L2Error> {
        let url = format!("{}/element/{domain}/{element_type}", self.base_url);
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(L2Error::Status(resp.status()));
        }
        Ok(resp.json::<Vec<SelectorPerformance>>().await?)
    }

    pub async fn stats(&self) -> Result<CacheStats, L2Error> {
        let url = format!("{}/stats", self.base_url);
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(L2Error::Status(resp.status()));
        }
        Ok(resp.json::<CacheStats>().await?)
    }

    /// Delete expired rows; returns counts deleted. Logged, not propagated,
    /// when the store is briefly unreachable (background maintenance).
    pub async fn cleanup_expired(&self) -> Result<u64, L2Error> {
        let url = format!("{}/expired", self.base_url);
        let resp = self.client.delete(&url).send().await?;
        if !resp.status().is_success() {
            return Err(L2Error::Status(resp.status()));
        }
        #[derive(Deserialize)]
        struct CleanupResponse {
            deleted: u64,
        }
        match resp.json::<CleanupResponse>().await {
            Ok(r) => Ok(r.deleted),
            Err(e) => {
                warn!("unexpected cleanup_expired response shape: {e}");
                Ok(0)
            }
        }
    }
}
