//! Agent Orchestrator: the plan → act → observe loop, grounded directly on
//! `original_source/.../agent_manager.py::run_agent_streaming`.
//!
//! Each step asks the model for one code block, runs the Code-Repair Pass,
//! executes the repaired block line-by-line against the Tool Registry, and
//! appends the rendered observation to the running transcript. The loop
//! stops at the step budget or when a `final_answer(...)` call appears.
//! Disconnecting a stream subscriber never cancels the Run: the loop keeps
//! driving to completion and publishes to the bus regardless of listeners.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use super::history::{HistoryRecord, HistoryStore};
use super::model::{ChatMessage, ModelClient, ModelError};
use super::repair::repair_code;
use crate::stream::{RunBus, StreamEvent};
use crate::tools::{ToolArgs, ToolRegistry};
use crate::utils::constants::{CONTEXT_HISTORY_TURNS, LAST_RESULT_RETENTION_SECS, STREAM_CHUNK_DELAY_MS};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("run {0} not found")]
    RunNotFound(Uuid),
}

#[derive(Debug, Clone)]
pub struct Step {
    pub index: u32,
    pub code: String,
    pub observation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Exhausted,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Run {
    pub id: Uuid,
    pub query: String,
    pub steps: Vec<Step>,
    pub status: RunStatus,
    pub final_answer: Option<String>,
}

struct RetainedResult {
    answer: String,
    stored_at: Instant,
}

/// A single parsed call out of a repaired code block: `tool_name(args...)`.
#[derive(Debug)]
struct ParsedCall {
    name: String,
    args: Value,
}

/// Parse one line of repaired code into a tool call. Supports the smolagents
/// convention of `snake_case(arg1="...", arg2="...")` or a single positional
/// string argument, e.g. `navigate("https://example.com")`.
fn parse_call(line: &str) -> Option<ParsedCall> {
    let line = line.trim();
    let open = line.find('(')?;
    let close = line.rfind(')')?;
    if close < open {
        return None;
    }
    let name = line[..open].trim().replace('_', "-");
    let inner = line[open + 1..close].trim();

    if inner.is_empty() {
        return Some(ParsedCall { name, args: Value::Object(Default::default()) });
    }

    if !inner.contains('=') {
        let value = inner.trim_matches(|c| c == '"' || c == '\'');
        return Some(ParsedCall {
            name,
            args: serde_json::json!({ "value": value, "url": value, "query": value, "selector": value, "text": value }),
        });
    }

    let mut map = serde_json::Map::new();
    for part in inner.split(',') {
        let Some((key, value)) = part.split_once('=') else { continue };
        let key = key.trim().to_string();
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        map.insert(key, Value::String(value.to_string()));
    }
    Some(ParsedCall { name, args: Value::Object(map) })
}

fn extract_final_answer(code: &str) -> Option<String> {
    let call = code.lines().rev().find_map(parse_call)?;
    if call.name != "final-answer" && call.name != "final_answer" {
        return None;
    }
    call.args
        .get("value")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Instruction appended to the transcript when the model must be pushed
/// toward a terminal `final_answer(...)` call (spec §4.9(3)/(7), §7).
const FINALIZE_INSTRUCTION: &str =
    "You are out of time for further exploration. End now with a single final_answer(...) call summarizing what you found.";

/// Format the final answer per spec §4.9(4): a search-result record
/// (`query` + `results`) renders as markdown bullet links capped at 10 shown
/// plus an overflow count; other structured JSON pretty-prints; anything
/// else is passed through as-is.
fn format_final_answer(raw: &str) -> String {
    let trimmed = raw.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) if map.contains_key("query") && map.contains_key("results") => {
            format_search_result_answer(&map)
        }
        Ok(value @ (Value::Object(_) | Value::Array(_))) => {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| trimmed.to_string())
        }
        _ => trimmed.to_string(),
    }
}

const SEARCH_RESULT_DISPLAY_CAP: usize = 10;

fn format_search_result_answer(map: &serde_json::Map<String, Value>) -> String {
    let query = map.get("query").and_then(Value::as_str).unwrap_or_default();
    let results = map.get("results").and_then(Value::as_array).cloned().unwrap_or_default();

    let mut out = format!("Results for \"{query}\":\n\n");
    for (rank, result) in results.iter().take(SEARCH_RESULT_DISPLAY_CAP).enumerate() {
        let title = result.get("title").and_then(Value::as_str).unwrap_or("untitled");
        let url = result.get("url").and_then(Value::as_str).unwrap_or("");
        out.push_str(&format!("{}. [{title}]({url})\n", rank + 1));
    }

    let overflow = results.len().saturating_sub(SEARCH_RESULT_DISPLAY_CAP);
    if overflow > 0 {
        out.push_str(&format!("\n…and {overflow} more result(s) not shown\n"));
    }
    out
}

pub struct Orchestrator {
    model: ModelClient,
    tools: Arc<ToolRegistry>,
    history: Option<Arc<HistoryStore>>,
    max_steps: u32,
    stream_chunk_size: usize,
    last_results: Mutex<HashMap<Uuid, RetainedResult>>,
    /// Run-ID → cancellation flag for Runs currently in flight (spec §4.9(7)).
    /// Each Run registers itself on start and deregisters on termination;
    /// `cancel` only has to find the flag and flip it.
    cancellations: Mutex<HashMap<Uuid, Arc<AtomicBool>>>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        model: ModelClient,
        tools: Arc<ToolRegistry>,
        history: Option<Arc<HistoryStore>>,
        max_steps: u32,
        stream_chunk_size: usize,
    ) -> Self {
        Self {
            model,
            tools,
            history,
            max_steps,
            stream_chunk_size,
            last_results: Mutex::new(HashMap::new()),
            cancellations: Mutex::new(HashMap::new()),
        }
    }

    /// Mark an in-flight Run cancelled. Observed at the Run's next suspension
    /// point (top of the step loop); subscriber disconnect alone never does
    /// this (spec §4.9(7)/§5).
    pub async fn cancel(&self, run_id: Uuid) -> Result<(), OrchestratorError> {
        let guard = self.cancellations.lock().await;
        let flag = guard.get(&run_id).ok_or(OrchestratorError::RunNotFound(run_id))?;
        flag.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Run a query to completion, publishing status/content/done events on
    /// `bus` as it goes. Returns the finished `Run`. The caller typically
    /// spawns this and returns `bus.subscribe()` to the HTTP layer immediately.
    ///
    /// `run_id` is chosen by the caller (the HTTP layer mints it before the
    /// Run starts, to hand back to the client for `/stream` and `/cancel`)
    /// rather than generated here, so `cancel(run_id)` addresses the same Run
    /// the client is holding a handle to.
    pub async fn run_agent_streaming(
        &self,
        run_id: Uuid,
        query: String,
        prior_turns: Vec<ChatMessage>,
        bus: &RunBus,
    ) -> Run {
        let mut steps = Vec::new();
        let mut transcript = prior_turns;
        transcript.truncate(CONTEXT_HISTORY_TURNS);
        transcript.push(ChatMessage::user(query.clone()));

        bus.publish(StreamEvent::Status {
            message: format!("starting run {run_id}"),
        });

        let cancel_flag = Arc::new(AtomicBool::new(false));
        self.cancellations.lock().await.insert(run_id, cancel_flag.clone());

        let mut final_answer = None;
        let mut status = RunStatus::Completed;
        let mut used_empty_response_retry = false;
        let mut step_index: u32 = 0;

        while step_index < self.max_steps {
            if cancel_flag.load(Ordering::SeqCst) {
                status = RunStatus::Cancelled;
                break;
            }

            bus.publish(StreamEvent::Status {
                message: format!("step {}/{}", step_index + 1, self.max_steps),
            });

            let completion = match self.model.complete(&transcript).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("model completion failed on run {run_id}: {e}");
                    bus.publish(StreamEvent::Error { message: e.to_string() });
                    status = RunStatus::Failed;
                    break;
                }
            };

            if completion.trim().is_empty() {
                warn!("empty model completion on run {run_id}, step {step_index}");
                if used_empty_response_retry {
                    status = RunStatus::Exhausted;
                    break;
                }
                used_empty_response_retry = true;
                transcript.push(ChatMessage::user(FINALIZE_INSTRUCTION.to_string()));
                continue;
            }

            let repaired = repair_code(&completion);
            transcript.push(ChatMessage::assistant(repaired.clone()));

            if let Some(answer) = extract_final_answer(&repaired) {
                final_answer = Some(answer);
                steps.push(Step {
                    index: step_index,
                    code: repaired,
                    observation: String::new(),
                });
                break;
            }

            let mut observation = String::new();
            for line in repaired.lines() {
                let Some(call) = parse_call(line) else { continue };
                let outcome = self.tools.call(&call.name, ToolArgs(call.args)).await;
                observation.push_str(&format!("[{}] {}\n", outcome.tool, outcome.observation));
            }

            transcript.push(ChatMessage::user(format!("Observation:\n{observation}")));
            steps.push(Step {
                index: step_index,
                code: repaired,
                observation,
            });
            step_index += 1;
        }

        // Step-budget exhaustion (spec §4.9(3)): retry once with an explicit
        // finalization instruction before giving up as `exhausted`. Does not
        // apply if the loop already ended in a terminal non-`Completed` state
        // (cancelled, failed, or exhausted via the empty-response path above).
        if final_answer.is_none() && status == RunStatus::Completed {
            warn!("step budget exhausted on run {run_id} without a final answer, retrying once");
            transcript.push(ChatMessage::user(FINALIZE_INSTRUCTION.to_string()));
            match self.model.complete(&transcript).await {
                Ok(text) if !text.trim().is_empty() => {
                    let repaired = repair_code(&text);
                    transcript.push(ChatMessage::assistant(repaired.clone()));
                    match extract_final_answer(&repaired) {
                        Some(answer) => {
                            final_answer = Some(answer);
                            steps.push(Step {
                                index: step_index,
                                code: repaired,
                                observation: String::new(),
                            });
                        }
                        None => status = RunStatus::Exhausted,
                    }
                }
                _ => status = RunStatus::Exhausted,
            }
        }

        self.cancellations.lock().await.remove(&run_id);

        let final_answer = final_answer.unwrap_or_else(|| match status {
            RunStatus::Cancelled => "run cancelled before a final answer was produced".to_string(),
            RunStatus::Failed => "model completion failed before a final answer was produced".to_string(),
            _ => {
                status = RunStatus::Exhausted;
                "no final answer produced within the step budget".to_string()
            }
        });
        let final_answer = format_final_answer(&final_answer);

        self.stream_final_answer(&final_answer, bus).await;

        bus.publish(StreamEvent::Done {
            final_answer: final_answer.clone(),
            step_count: steps.len() as u32,
        });

        self.retain_result(run_id, final_answer.clone()).await;

        if let Some(history) = &self.history {
            history
                .record(HistoryRecord {
                    run_id: run_id.to_string(),
                    query: query.clone(),
                    result: final_answer.clone(),
                    step_count: steps.len() as u32,
                    completed_at: chrono::Utc::now(),
                    status: format!("{status:?}"),
                })
                .await;
        }

        info!("run {run_id} completed with {} steps", steps.len());

        Run {
            id: run_id,
            query,
            steps,
            status,
            final_answer: Some(final_answer),
        }
    }

    /// Stream the final answer in fixed-size chunks with a pacing delay,
    /// matching the original's 75-char/20ms cadence.
    async fn stream_final_answer(&self, answer: &str, bus: &RunBus) {
        let chars: Vec<char> = answer.chars().collect();
        for chunk in chars.chunks(self.stream_chunk_size.max(1)) {
            bus.publish(StreamEvent::Content {
                chunk: chunk.iter().collect(),
            });
            sleep(Duration::from_millis(STREAM_CHUNK_DELAY_MS)).await;
        }
    }

    async fn retain_result(&self, run_id: Uuid, answer: String) {
        let mut guard = self.last_results.lock().await;
        guard.retain(|_, v| v.stored_at.elapsed() < Duration::from_secs(LAST_RESULT_RETENTION_SECS as u64));
        guard.insert(
            run_id,
            RetainedResult {
                answer,
                stored_at: Instant::now(),
            },
        );
    }

    /// Fetch a retained final answer for reconnecting subscribers, if still
    /// within the 5-minute retention window.
    pub async fn last_result(&self, run_id: Uuid) -> Result<String, OrchestratorError> {
        let guard = self.last_results.lock().await;
        guard
            .get(&run_id)
            .filter(|r| r.stored_at.elapsed() < Duration::from_secs(LAST_RESULT_RETENTION_SECS as u64))
            .map(|r| r.answer.clone())
            .ok_or(OrchestratorError::RunNotFound(run_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positional_string_call() {
        let call = parse_call(r#"navigate("https://example.com")"#).unwrap();
        assert_eq!(call.name, "navigate");
        assert_eq!(call.args.get("url").unwrap().as_str().unwrap(), "https://example.com");
    }

    #[test]
    fn parses_keyword_args_call() {
        let call = parse_call(r#"type_text(selector=".box", text="hi")"#).unwrap();
        assert_eq!(call.name, "type-text");
        assert_eq!(call.args.get("selector").unwrap().as_str().unwrap(), ".box");
        assert_eq!(call.args.get("text").unwrap().as_str().unwrap(), "hi");
    }

    #[test]
    fn extracts_final_answer_from_last_call() {
        let code = "navigate(\"https://example.com\")\nfinal_answer(\"done\")";
        assert_eq!(extract_final_answer(code).as_deref(), Some("done"));
    }

    #[test]
    fn formats_plain_text_answer_unchanged() {
        assert_eq!(format_final_answer("  the capital of France is Paris  "), "the capital of France is Paris");
    }

    #[test]
    fn formats_search_results_as_capped_markdown_bullets() {
        let results: Vec<Value> = (0..13)
            .map(|i| serde_json::json!({ "rank": i + 1, "title": format!("Result {i}"), "url": format!("https://example.com/{i}") }))
            .collect();
        let raw = serde_json::json!({ "query": "rust async", "results": results }).to_string();

        let formatted = format_final_answer(&raw);

        assert!(formatted.contains("Results for \"rust async\""));
        assert!(formatted.contains("1. [Result 0](https://example.com/0)"));
        assert!(formatted.contains("10. [Result 9](https://example.com/9)"));
        assert!(!formatted.contains("Result 10]"));
        assert!(formatted.contains("and 3 more result(s)"));
    }

    #[test]
    fn formats_other_structured_values_as_pretty_json() {
        let formatted = format_final_answer(r#"{"count": 3, "ok": true}"#);
        assert!(formatted.contains('\n'));
        assert!(formatted.contains("\"count\": 3"));
    }
}
