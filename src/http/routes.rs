//! HTTP surface for agent clients (spec §6): chat/SSE, last-result,
//! execution-history, health, and the tab-management set.

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

use super::state::AppState;
use crate::agent::ChatMessage;
use crate::stream::{RunBus, StreamEvent};
use crate::tools::{ToolArgs, ToolName};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/chat/:run_id/stream", get(chat_stream))
        .route("/chat/:run_id/cancel", post(cancel_run))
        .route("/last-result/:run_id", get(last_result))
        .route("/execution-history", get(execution_history))
        .route("/tabs", get(list_tabs).post(open_background_tab))
        .route("/tabs/:index", axum::routing::delete(close_tab))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub run_id: Uuid,
}

/// Kick off a Run in the background and hand back its id immediately; the
/// caller subscribes to `/chat/{run_id}/stream` for events.
async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> impl IntoResponse {
    let run_id = Uuid::new_v4();
    let bus = RunBus::new();

    {
        let mut runs = state.active_runs.write().await;
        runs.insert(run_id, bus.clone());
    }

    let orchestrator = state.orchestrator.clone();
    let active_runs = state.active_runs.clone();
    let history: Vec<ChatMessage> = request
        .history
        .into_iter()
        .map(|turn| ChatMessage {
            role: turn.role,
            content: turn.content,
        })
        .collect();

    tokio::spawn(async move {
        let bus_for_run = {
            let runs = active_runs.read().await;
            runs.get(&run_id).cloned()
        };
        let Some(bus_for_run) = bus_for_run else { return };
        orchestrator.run_agent_streaming(run_id, request.message, history, &bus_for_run).await;
        // Keep the bus registered briefly so a slow SSE subscriber can still
        // drain the final `done` event; disconnecting never cancels the Run.
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        active_runs.write().await.remove(&run_id);
    });

    Json(ChatResponse { run_id })
}

async fn chat_stream(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = {
        let runs = state.active_runs.read().await;
        runs.get(&run_id).map(RunBus::subscribe)
    };

    let stream = async_stream::stream! {
        let Some(receiver) = receiver else {
            yield Ok(Event::default().event("error").data("unknown or expired run id"));
            return;
        };
        let mut events = BroadcastStream::new(receiver);
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    let payload = serde_json::to_string(&event).unwrap_or_default();
                    yield Ok(Event::default().event(event_kind(&event)).data(payload));
                }
                Err(e) => {
                    warn!("stream subscriber lagged: {e}");
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn event_kind(event: &StreamEvent) -> &'static str {
    match event {
        StreamEvent::Status { .. } => "status",
        StreamEvent::Content { .. } => "content",
        StreamEvent::Error { .. } => "error",
        StreamEvent::Done { .. } => "done",
    }
}

/// Explicit cancellation by Run-ID (spec §4.9(7)). Observed at the Run's
/// next suspension point; a disconnecting `/stream` subscriber alone never
/// reaches this path.
async fn cancel_run(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> impl IntoResponse {
    match state.orchestrator.cancel(run_id).await {
        Ok(()) => Json(serde_json::json!({ "run_id": run_id, "cancelled": true })).into_response(),
        Err(e) => (axum::http::StatusCode::NOT_FOUND, e.to_string()).into_response(),
    }
}

async fn last_result(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> impl IntoResponse {
    match state.orchestrator.last_result(run_id).await {
        Ok(answer) => Json(serde_json::json!({ "run_id": run_id, "final_answer": answer })).into_response(),
        Err(e) => (axum::http::StatusCode::NOT_FOUND, e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    20
}

async fn execution_history(
    State(state): State<AppState>,
    axum::extract::Query(query): axum::extract::Query<HistoryQuery>,
) -> impl IntoResponse {
    let Some(history) = &state.history else {
        return Json(serde_json::json!({ "runs": [] }));
    };
    match history.recent(query.limit).await {
        Ok(records) => Json(serde_json::json!({
            "runs": records.into_iter().map(|r| serde_json::json!({
                "run_id": r.run_id,
                "query": r.query,
                "result": r.result,
                "step_count": r.step_count,
                "completed_at": r.completed_at,
                "status": r.status,
            })).collect::<Vec<_>>(),
        })),
        Err(e) => {
            warn!("execution history query failed: {e}");
            Json(serde_json::json!({ "runs": [] }))
        }
    }
}

async fn list_tabs(State(state): State<AppState>) -> impl IntoResponse {
    match state.kernel.list_tabs().await {
        Ok(tabs) => Json(serde_json::to_value(
            tabs.into_iter()
                .map(|t| serde_json::json!({ "index": t.index, "url": t.url, "closeable": t.closeable }))
                .collect::<Vec<_>>(),
        ))
        .into_response(),
        Err(e) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenTabRequest {
    pub url: String,
}

async fn open_background_tab(State(state): State<AppState>, Json(request): Json<OpenTabRequest>) -> impl IntoResponse {
    let args = ToolArgs(serde_json::json!({ "url": request.url }));
    let outcome = state.tools.call(ToolName::OpenBackgroundTab.as_str(), args).await;
    Json(serde_json::json!({ "success": outcome.success, "observation": outcome.observation }))
}

async fn close_tab(State(state): State<AppState>, Path(index): Path<usize>) -> impl IntoResponse {
    let args = ToolArgs(serde_json::json!({ "index": index }));
    let outcome = state.tools.call(ToolName::CloseTab.as_str(), args).await;
    Json(serde_json::json!({ "success": outcome.success, "observation": outcome.observation }))
}
