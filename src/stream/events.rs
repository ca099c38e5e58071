//! Stream event taxonomy emitted by a running Run: status → content → done,
//! or error at any point (spec §4.9/§4.10).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Status { message: String },
    Content { chunk: String },
    Error { message: String },
    Done { final_answer: String, step_count: u32 },
}
