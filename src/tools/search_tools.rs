//! `web-search` tool: DuckDuckGo search bound to the configured result cap.

use super::types::{ToolArgs, ToolError};
use crate::browser::BrowserKernel;
use crate::utils::constants::{SEARCH_MAX_RESULTS_DEFAULT, SEARCH_MAX_RESULTS_LIMIT};
use crate::web_search::search_with_kernel;

pub async fn web_search(kernel: &BrowserKernel, args: &ToolArgs) -> Result<String, ToolError> {
    let query = args.get_str("query")?;
    let requested = args.get_u64_opt("max_results", SEARCH_MAX_RESULTS_DEFAULT as u64) as usize;
    let max_results = requested.min(SEARCH_MAX_RESULTS_LIMIT);

    let results = search_with_kernel(kernel, query, max_results)
        .await
        .map_err(|e| ToolError::Search(e.to_string()))?;

    let mut out = format!("{} results for \"{}\"\n", results.results.len(), results.query);
    for result in &results.results {
        out.push_str(&format!(
            "\n{}. {} — {}\n   {}\n",
            result.rank, result.title, result.url, result.snippet
        ));
    }
    Ok(out)
}
