//! Extraction-facing tools: extract-content, extract-multiple,
//! capture-markdown, visit-webpage.

use super::types::{ToolArgs, ToolError};
use crate::browser::BrowserKernel;
use crate::extraction::{format_compact, ExtractionPipeline};

pub async fn extract_content(
    kernel: &BrowserKernel,
    pipeline: &ExtractionPipeline,
    args: &ToolArgs,
) -> Result<String, ToolError> {
    let selector = args.get_str_opt("selector");
    let extract_all = args.get_bool_opt("all", false);

    let record = kernel
        .with_tab0(|page| async move {
            if let Some(selector) = selector {
                pipeline
                    .extract_selector(&page, selector, extract_all)
                    .await
                    .map_err(|e| crate::browser::errors::KernelError::Other(anyhow::anyhow!(e)))
            } else {
                pipeline
                    .extract_universal(&page)
                    .await
                    .map_err(|e| crate::browser::errors::KernelError::Other(anyhow::anyhow!(e)))
            }
        })
        .await?;

    Ok(format_compact(&record))
}

pub async fn extract_multiple(
    kernel: &BrowserKernel,
    pipeline: &ExtractionPipeline,
    args: &ToolArgs,
) -> Result<String, ToolError> {
    let selectors = args.get_str_array("selectors");
    if selectors.is_empty() {
        return Err(ToolError::InvalidArgument {
            tool: "extract-multiple".into(),
            message: "selectors array must be non-empty".into(),
        });
    }

    let result = kernel
        .with_tab0(|page| async move {
            pipeline
                .extract_parallel(&page, &selectors)
                .await
                .map_err(|e| crate::browser::errors::KernelError::Other(anyhow::anyhow!(e)))
        })
        .await?;

    let mut out = format!(
        "{} cached, {} freshly extracted\n",
        result.cached_count, result.fresh_count
    );
    for (selector, content) in &result.by_selector {
        out.push_str(&format!("\n--- {selector} ---\n{content}\n"));
    }
    Ok(out)
}

pub async fn capture_markdown(
    kernel: &BrowserKernel,
    pipeline: &ExtractionPipeline,
) -> Result<String, ToolError> {
    let record = kernel
        .with_tab0(|page| async move {
            pipeline
                .extract_universal(&page)
                .await
                .map_err(|e| crate::browser::errors::KernelError::Other(anyhow::anyhow!(e)))
        })
        .await?;

    let mut out = format!("# {}\n\n", record.title);
    out.push_str(&record.main_text);
    Ok(out)
}

/// navigate + extract composite; always a fresh extraction, never served
/// implicitly from cache (decided in DESIGN.md's Open Question 1).
pub async fn visit_webpage(
    kernel: &BrowserKernel,
    pipeline: &ExtractionPipeline,
    args: &ToolArgs,
) -> Result<String, ToolError> {
    let url = args.get_str("url")?;
    kernel
        .navigate(url, None, std::time::Duration::from_millis(30_000))
        .await?;

    let record = kernel
        .with_tab0(|page| async move {
            pipeline
                .extract_universal(&page)
                .await
                .map_err(|e| crate::browser::errors::KernelError::Other(anyhow::anyhow!(e)))
        })
        .await?;

    Ok(format_compact(&record))
}
