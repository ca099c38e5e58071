//! Tool Registry: the static catalog of side-effecting primitives the agent
//! may invoke, and their dispatch implementations.

pub mod browser_tools;
pub mod extraction_tools;
pub mod registry;
pub mod search_tools;
pub mod types;

pub use registry::ToolRegistry;
pub use types::{ToolArgs, ToolError, ToolName, ToolOutcome};
