//! Static enum-backed Tool Registry (spec §9 REDESIGN FLAGS): the catalog
//! is fixed at compile time, dispatched with a single match rather than the
//! teacher's `mcp::registry` decorator-discovery mechanism.

use std::sync::Arc;

use super::browser_tools;
use super::extraction_tools;
use super::search_tools;
use super::types::{ToolArgs, ToolError, ToolName, ToolOutcome};
use crate::browser::BrowserKernel;
use crate::extraction::ExtractionPipeline;

pub struct ToolRegistry {
    kernel: Arc<BrowserKernel>,
    pipeline: Arc<ExtractionPipeline>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new(kernel: Arc<BrowserKernel>, pipeline: Arc<ExtractionPipeline>) -> Self {
        Self { kernel, pipeline }
    }

    #[must_use]
    pub fn catalog() -> &'static [ToolName] {
        ToolName::all()
    }

    /// Dispatch a named tool call, rendering either its observation or its
    /// error to a single text result for the orchestrator's observation step.
    pub async fn call(&self, name: &str, args: ToolArgs) -> ToolOutcome {
        let Some(tool) = ToolName::from_str_lenient(name) else {
            return ToolOutcome {
                tool: name.to_string(),
                success: false,
                observation: ToolError::UnknownTool(name.to_string()).to_string(),
            };
        };

        let result = self.dispatch(tool, &args).await;
        match result {
            Ok(observation) => ToolOutcome {
                tool: tool.as_str().to_string(),
                success: true,
                observation,
            },
            Err(e) => ToolOutcome {
                tool: tool.as_str().to_string(),
                success: false,
                observation: e.to_string(),
            },
        }
    }

    async fn dispatch(&self, tool: ToolName, args: &ToolArgs) -> Result<String, ToolError> {
        match tool {
            ToolName::Navigate => browser_tools::navigate(&self.kernel, args).await,
            ToolName::GetCurrentUrl => browser_tools::get_current_url(&self.kernel).await,
            ToolName::ClickElement => browser_tools::click_element(&self.kernel, args).await,
            ToolName::TypeText => browser_tools::type_text(&self.kernel, args).await,
            ToolName::PressKey => browser_tools::press_key(&self.kernel, args).await,
            ToolName::CloudflareBypass => browser_tools::cloudflare_bypass(&self.kernel).await,
            ToolName::TakeScreenshot => browser_tools::take_screenshot(&self.kernel).await,
            ToolName::GetElementPosition => browser_tools::get_element_position(&self.kernel, args).await,
            ToolName::CaptureApiResponse => browser_tools::capture_api_response(&self.kernel, args).await,
            ToolName::OpenBackgroundTab => browser_tools::open_background_tab(&self.kernel, args).await,
            ToolName::ListTabs => browser_tools::list_tabs(&self.kernel).await,
            ToolName::CloseTab => browser_tools::close_tab(&self.kernel, args).await,
            ToolName::ExtractContent => extraction_tools::extract_content(&self.kernel, &self.pipeline, args).await,
            ToolName::ExtractMultiple => extraction_tools::extract_multiple(&self.kernel, &self.pipeline, args).await,
            ToolName::CaptureMarkdown => extraction_tools::capture_markdown(&self.kernel, &self.pipeline).await,
            ToolName::VisitWebpage => extraction_tools::visit_webpage(&self.kernel, &self.pipeline, args).await,
            ToolName::WebSearch => search_tools::web_search(&self.kernel, args).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_matches_required_tool_count() {
        assert_eq!(ToolRegistry::catalog().len(), 17);
    }

    #[test]
    fn unknown_tool_name_round_trips_to_none() {
        assert!(ToolName::from_str_lenient("not-a-real-tool").is_none());
    }
}
