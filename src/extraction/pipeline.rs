//! Extraction Pipeline: orchestrates the three extraction modes over a Tab.
//!
//! Grounded on the teacher's `page_extractor::extractors` call pattern
//! (`page.evaluate(script).await.context(...)?; js_result.into_value()`) and
//! on `original_source/.../extraction.py` for the progressive selector
//! fallback list and structured-data mining.

use chromiumoxide::Page;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::content::{mine_structured_product_data, ExtractionRecord, LinkRef, MainContentExtractor};
use crate::browser::cloudflare::{detect_challenge, solve_challenge, ChallengeKind};
use crate::browser::errors::KernelError;
use crate::cache::{CacheService, CachedPage};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("active interactive challenge could not be cleared")]
    ChallengeUnsolved,
    #[error("element not found for selector: {0}")]
    ElementNotFound(String),
    #[error("browser transport error: {0}")]
    Kernel(#[from] KernelError),
    #[error("no usable content was extracted")]
    Empty,
}

/// Progressive selector fallback list when the black-box extractor fails:
/// semantic containers first, then common content containers, then
/// article/post classes, then generic sections excluding navigation/menus.
const FALLBACK_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role='main']",
    "#content",
    ".content",
    "#main-content",
    ".main-content",
    ".article-body",
    ".post-content",
    ".post-body",
    "section:not(nav):not(.menu):not(.navigation)",
];

/// Heuristic keyword list used to reject content that looks like stylesheet
/// or script rather than body text.
const NON_CONTENT_KEYWORDS: &[&str] = &[
    "function(", "var ", "@media", "{margin:", "{padding:", "<script", "<style",
];

fn looks_like_non_content(text: &str) -> bool {
    let sample: String = text.chars().take(500).collect::<String>().to_ascii_lowercase();
    NON_CONTENT_KEYWORDS.iter().any(|kw| sample.contains(kw))
}

#[derive(Debug, Deserialize)]
struct PageSnapshot {
    html: String,
    url: String,
}

const SNAPSHOT_SCRIPT: &str = "({ html: document.documentElement.outerHTML, url: document.location.href })";
const LD_JSON_SCRIPT: &str = r#"
Array.from(document.querySelectorAll('script[type="application/ld+json"]')).map(n => n.textContent || '')
"#;

async fn snapshot(page: &Page) -> Result<PageSnapshot, ExtractionError> {
    let result = page
        .evaluate(SNAPSHOT_SCRIPT)
        .await
        .map_err(KernelError::Transport)?;
    result
        .into_value()
        .map_err(|e| ExtractionError::Kernel(KernelError::Other(anyhow::anyhow!("snapshot decode failed: {e}"))))
}

async fn ld_json_blocks(page: &Page) -> Vec<String> {
    match page.evaluate(LD_JSON_SCRIPT).await {
        Ok(result) => result.into_value().unwrap_or_default(),
        Err(e) => {
            debug!("ld+json scan failed: {e}");
            Vec::new()
        }
    }
}

async fn extract_links(page: &Page, origin: &str, limit: usize) -> Vec<LinkRef> {
    let script = format!(
        r#"Array.from(document.querySelectorAll('a[href]')).slice(0, {limit}).map(a => ({{ href: a.href, text: (a.innerText || '').trim() }}))"#
    );
    let raw: Vec<LinkRef> = match page.evaluate(script.as_str()).await {
        Ok(r) => r.into_value().unwrap_or_default(),
        Err(_) => Vec::new(),
    };
    raw.into_iter()
        .map(|mut link| {
            if let Ok(resolved) = Url::parse(origin).and_then(|base| base.join(&link.href)) {
                link.href = resolved.to_string();
            }
            link
        })
        .collect()
}

pub struct ParallelExtractionResult {
    pub by_selector: HashMap<String, String>,
    pub cached_count: usize,
    pub fresh_count: usize,
}

pub struct ExtractionPipeline {
    cache: Arc<CacheService>,
    main_content_extractor: Option<Arc<dyn MainContentExtractor>>,
}

impl ExtractionPipeline {
    #[must_use]
    pub fn new(cache: Arc<CacheService>, main_content_extractor: Option<Arc<dyn MainContentExtractor>>) -> Self {
        Self {
            cache,
            main_content_extractor,
        }
    }

    /// Check for an active interactive challenge and attempt a time-bounded
    /// solve before any extraction runs.
    async fn ensure_no_challenge(&self, page: &Page) -> Result<(), ExtractionError> {
        match detect_challenge(page).await {
            Ok(ChallengeKind::None) => Ok(()),
            Ok(_) => {
                solve_challenge(page, Duration::from_secs(15), Duration::from_millis(300))
                    .await
                    .map_err(|_| ExtractionError::ChallengeUnsolved)
            }
            Err(e) => {
                warn!("challenge detection failed, proceeding optimistically: {e}");
                Ok(())
            }
        }
    }

    /// Universal mode: black-box extractor first, progressive selector
    /// fallback, final paragraph-aggregation fallback.
    pub async fn extract_universal(&self, page: &Page) -> Result<ExtractionRecord, ExtractionError> {
        self.ensure_no_challenge(page).await?;

        let snap = snapshot(page).await?;

        if let Some(extractor) = &self.main_content_extractor
            && let Some(mut record) = extractor.extract(&snap.html, &snap.url)
            && !record.main_text.trim().is_empty()
            && !looks_like_non_content(&record.main_text)
        {
            self.enrich_with_structured_data(page, &mut record).await;
            record.links = extract_links(page, &snap.url, 50).await;
            self.record_attempt(&snap.url, "universal", true).await;
            return Ok(record);
        }

        for selector in FALLBACK_SELECTORS {
            if let Ok(element) = page.find_element(*selector).await
                && let Ok(Some(text)) = element.inner_text().await
                && !text.trim().is_empty()
                && !looks_like_non_content(&text)
            {
                let mut record = ExtractionRecord::new(&snap.url, String::new(), text, "universal-fallback-selector");
                self.enrich_with_structured_data(page, &mut record).await;
                record.links = extract_links(page, &snap.url, 50).await;
                self.record_attempt(&snap.url, "universal", true).await;
                return Ok(record);
            }
        }

        let paragraphs: Vec<String> = match page.evaluate("Array.from(document.querySelectorAll('p')).map(p => p.innerText || '')").await {
            Ok(r) => r.into_value().unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        let aggregated = paragraphs.join("\n\n");
        if aggregated.trim().is_empty() || looks_like_non_content(&aggregated) {
            self.record_attempt(&snap.url, "universal", false).await;
            return Err(ExtractionError::Empty);
        }

        let mut record = ExtractionRecord::new(&snap.url, String::new(), aggregated, "universal-paragraph-aggregate");
        self.enrich_with_structured_data(page, &mut record).await;
        record.links = extract_links(page, &snap.url, 50).await;
        self.record_attempt(&snap.url, "universal", true).await;
        Ok(record)
    }

    async fn enrich_with_structured_data(&self, page: &Page, record: &mut ExtractionRecord) {
        let blocks = ld_json_blocks(page).await;
        if !blocks.is_empty() {
            mine_structured_product_data(&blocks, &mut record.metadata);
        }
    }

    /// Selector mode: a single CSS selector. `extract_all` returns all
    /// matches; otherwise the first.
    pub async fn extract_selector(
        &self,
        page: &Page,
        selector: &str,
        extract_all: bool,
    ) -> Result<ExtractionRecord, ExtractionError> {
        self.ensure_no_challenge(page).await?;
        let snap = snapshot(page).await?;

        let elements = page
            .find_elements(selector)
            .await
            .map_err(|_| ExtractionError::ElementNotFound(selector.to_string()))?;
        if elements.is_empty() {
            self.record_attempt(&snap.url, selector, false).await;
            return Err(ExtractionError::ElementNotFound(selector.to_string()));
        }

        let take = if extract_all { elements.len() } else { 1 };
        let mut texts = Vec::with_capacity(take);
        for element in elements.into_iter().take(take) {
            if let Ok(Some(text)) = element.inner_text().await {
                texts.push(text);
            }
        }

        let combined = texts.join("\n\n");
        self.record_attempt(&snap.url, selector, !combined.trim().is_empty()).await;
        let mut record = ExtractionRecord::new(&snap.url, String::new(), combined, "selector");
        record.links = extract_links(page, &snap.url, 50).await;
        Ok(record)
    }

    /// Parallel mode: check cache per selector, extract misses concurrently,
    /// write successes back.
    pub async fn extract_parallel(
        &self,
        page: &Page,
        selectors: &[String],
    ) -> Result<ParallelExtractionResult, ExtractionError> {
        self.ensure_no_challenge(page).await?;
        let snap = snapshot(page).await?;

        let mut by_selector = HashMap::new();
        let mut cached_count = 0;
        let mut misses = Vec::new();

        for selector in selectors {
            match self.cache.get(&snap.url, Some(selector), "").await {
                Ok(Some((page_cache, _origin))) => {
                    by_selector.insert(selector.clone(), page_cache.content);
                    cached_count += 1;
                }
                _ => misses.push(selector.clone()),
            }
        }

        let fresh_count = misses.len();
        let extracted = futures::future::join_all(
            misses
                .into_iter()
                .map(|selector| async move { (selector.clone(), self.extract_selector(page, &selector, false).await) }),
        )
        .await;

        for (selector, outcome) in extracted {
            match outcome {
                Ok(record) => {
                    let page_cache = CachedPage {
                        cache_key: String::new(),
                        url: snap.url.clone(),
                        title: record.title.clone(),
                        content: record.main_text.clone(),
                        content_hash: String::new(),
                        word_count: record.main_text.split_whitespace().count(),
                        selector_used: Some(selector.clone()),
                        extraction_method: "selector".into(),
                        ttl_seconds: 0,
                        summary: None,
                        key_points: None,
                        entities: None,
                        success_rate: 1.0,
                    };
                    if let Err(e) = self.cache.put(&snap.url, Some(&selector), "", page_cache).await {
                        warn!("failed to persist fresh selector extraction: {e}");
                    }
                    by_selector.insert(selector, record.main_text);
                }
                Err(e) => {
                    debug!("selector '{selector}' failed in parallel extraction: {e}");
                }
            }
        }

        Ok(ParallelExtractionResult {
            by_selector,
            cached_count,
            fresh_count,
        })
    }

    async fn record_attempt(&self, url: &str, selector: &str, success: bool) {
        if let Some(host) = url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) {
            self.cache.record_selector_attempt(&host, "content", selector, success, None).await;
        }
    }
}
