//! Web search functionality using browser automation
//!
//! Performs `DuckDuckGo` searches against the shared `BrowserKernel`'s
//! background-tab capacity, never against tab-0. Returns structured results
//! with titles, URLs, and snippets (spec §4.7 `web_search` tool).

mod search;
mod types;

pub use types::{MAX_RESULTS, MAX_RETRIES, SearchResult, SearchResults};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::browser::BrowserKernel;

/// Perform a web search using a background tab opened on the shared kernel.
///
/// Opens a background tab, performs the search with retry/backoff, extracts
/// results, and closes the tab regardless of outcome.
pub async fn search_with_kernel(
    kernel: &BrowserKernel,
    query: impl Into<String>,
    max_results: usize,
) -> Result<SearchResults> {
    let query = query.into();
    info!("Starting web search for query: {}", query);

    let tab_index = kernel
        .open_background_tab("about:blank")
        .await
        .context("Failed to open background tab for search")?;

    let search_page = kernel
        .tab_page(tab_index)
        .await
        .context("Failed to acquire search tab page")?;

    let outcome = search::retry_with_backoff(
        || async {
            search::perform_search(&search_page, &query).await?;
            let mut results = search::extract_results(&search_page).await?;
            results.truncate(max_results.min(MAX_RESULTS));
            Ok(results)
        },
        MAX_RETRIES,
    )
    .await;

    if let Err(e) = kernel.close_tab(tab_index).await {
        warn!("Failed to close search tab: {}", e);
    }

    let results = outcome?;
    info!("Search completed successfully with {} results", results.len());
    Ok(SearchResults::new(query, results))
}
