//! Tool Registry data model: arguments, results, and the error taxonomy.
//!
//! Grounded on the teacher's `mcp::types` request/response shapes, adapted
//! from rmcp's dynamic tool-call envelope to a static match over a closed
//! enum (spec §9 REDESIGN FLAGS: "static catalog, not decorator discovery").

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::browser::errors::KernelError;
use crate::extraction::ExtractionError;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid argument for {tool}: {message}")]
    InvalidArgument { tool: String, message: String },
    #[error(transparent)]
    Kernel(#[from] KernelError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("search failed: {0}")]
    Search(String),
}

/// The closed set of tools the orchestrator may invoke, matching spec
/// §4.7's "required tools" list one-for-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolName {
    Navigate,
    GetCurrentUrl,
    ClickElement,
    TypeText,
    PressKey,
    ExtractContent,
    ExtractMultiple,
    CaptureMarkdown,
    WebSearch,
    VisitWebpage,
    CloudflareBypass,
    TakeScreenshot,
    GetElementPosition,
    CaptureApiResponse,
    OpenBackgroundTab,
    ListTabs,
    CloseTab,
}

impl ToolName {
    #[must_use]
    pub fn all() -> &'static [ToolName] {
        use ToolName::*;
        &[
            Navigate,
            GetCurrentUrl,
            ClickElement,
            TypeText,
            PressKey,
            ExtractContent,
            ExtractMultiple,
            CaptureMarkdown,
            WebSearch,
            VisitWebpage,
            CloudflareBypass,
            TakeScreenshot,
            GetElementPosition,
            CaptureApiResponse,
            OpenBackgroundTab,
            ListTabs,
            CloseTab,
        ]
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::Navigate => "navigate",
            ToolName::GetCurrentUrl => "get-current-url",
            ToolName::ClickElement => "click-element",
            ToolName::TypeText => "type-text",
            ToolName::PressKey => "press-key",
            ToolName::ExtractContent => "extract-content",
            ToolName::ExtractMultiple => "extract-multiple",
            ToolName::CaptureMarkdown => "capture-markdown",
            ToolName::WebSearch => "web-search",
            ToolName::VisitWebpage => "visit-webpage",
            ToolName::CloudflareBypass => "cloudflare-bypass",
            ToolName::TakeScreenshot => "take-screenshot",
            ToolName::GetElementPosition => "get-element-position",
            ToolName::CaptureApiResponse => "capture-api-response",
            ToolName::OpenBackgroundTab => "open-background-tab",
            ToolName::ListTabs => "list-tabs",
            ToolName::CloseTab => "close-tab",
        }
    }

    #[must_use]
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.as_str() == s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolArgs(pub Value);

impl ToolArgs {
    pub fn get_str(&self, key: &str) -> Result<&str, ToolError> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArgument {
                tool: key.to_string(),
                message: format!("missing or non-string field '{key}'"),
            })
    }

    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_bool_opt(&self, key: &str, default: bool) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn get_u64_opt(&self, key: &str, default: u64) -> u64 {
        self.0.get(key).and_then(Value::as_u64).unwrap_or(default)
    }

    pub fn get_str_array(&self, key: &str) -> Vec<String> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }
}

/// Outcome of a single tool invocation, rendered to text before being fed
/// back to the model as an observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub tool: String,
    pub success: bool,
    pub observation: String,
}
