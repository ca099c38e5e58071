//! Extraction Pipeline: universal/selector/parallel extraction modes, plus
//! compact output formatting for direct model consumption.

pub mod content;
pub mod format;
pub mod pipeline;

pub use content::{ExtractionRecord, MainContentExtractor};
pub use format::format_compact;
pub use pipeline::{ExtractionError, ExtractionPipeline, ParallelExtractionResult};
