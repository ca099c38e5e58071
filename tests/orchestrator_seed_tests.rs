//! Seed-test scenarios 5 (final-answer discipline) and 6 (reconnection
//! window), exercised through the real `Orchestrator` against a mocked
//! model endpoint. No browser is launched: the scripted completion below
//! never calls a tool, so the `ToolRegistry`'s `BrowserKernel` handle stays
//! untouched.

use std::sync::Arc;
use std::time::Duration;

use autobrowse_agent::agent::{ModelClient, Orchestrator};
use autobrowse_agent::browser::BrowserKernel;
use autobrowse_agent::cache::{CacheService, L1Store};
use autobrowse_agent::extraction::ExtractionPipeline;
use autobrowse_agent::stream::RunBus;
use autobrowse_agent::tools::ToolRegistry;
use uuid::Uuid;

fn build_orchestrator(model: ModelClient, max_steps: u32) -> Orchestrator {
    let kernel = Arc::new(BrowserKernel::new(true, std::env::temp_dir().join("autobrowse_test_session")).unwrap());
    let cache = Arc::new(CacheService::new(L1Store::new(None), None));
    let pipeline = Arc::new(ExtractionPipeline::new(cache, None));
    let tools = Arc::new(ToolRegistry::new(kernel, pipeline));
    Orchestrator::new(model, tools, None, max_steps, 75)
}

#[tokio::test]
async fn scenario_5_only_the_last_final_answer_survives() {
    let mut server = mockito::Server::new_async().await;
    let body = serde_json::json!({
        "choices": [{
            "message": {
                "content": "final_answer(\"A\")\nnavigate(\"https://example.com\")\nfinal_answer(\"B\")",
            }
        }]
    });
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let model = ModelClient::new(server.url(), "test-key", "test-model", Duration::from_secs(5));
    let orchestrator = build_orchestrator(model, 4);
    let bus = RunBus::new();

    let run = orchestrator
        .run_agent_streaming(Uuid::new_v4(), "do the thing".into(), vec![], &bus)
        .await;

    assert_eq!(run.final_answer.as_deref(), Some("B"));
    assert_eq!(run.steps.len(), 1);
}

#[tokio::test]
async fn scenario_6_reconnect_returns_the_retained_answer() {
    let mut server = mockito::Server::new_async().await;
    let body = serde_json::json!({
        "choices": [{ "message": { "content": "final_answer(\"done\")" } }]
    });
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let model = ModelClient::new(server.url(), "test-key", "test-model", Duration::from_secs(5));
    let orchestrator = build_orchestrator(model, 4);
    let bus = RunBus::new();

    // Simulate a subscriber that disconnects early: subscribe, drop, then
    // run the query to completion. The Run must still finish and retain
    // its answer regardless of the dropped subscriber.
    drop(bus.subscribe());
    let run = orchestrator
        .run_agent_streaming(Uuid::new_v4(), "do the thing".into(), vec![], &bus)
        .await;

    let retained = orchestrator.last_result(run.id).await.unwrap();
    assert_eq!(retained, "done");
}

#[tokio::test]
async fn exhausting_the_step_budget_without_a_final_answer_marks_the_run_exhausted() {
    let mut server = mockito::Server::new_async().await;
    // A line that never resolves to a real tool keeps this test browser-free:
    // the registry reports `unknown tool` as the observation and the loop
    // continues without ever touching the kernel. Every completion here,
    // including the post-exhaustion retry, still never calls final_answer.
    let body = serde_json::json!({
        "choices": [{ "message": { "content": "think(\"still working on it\")" } }]
    });
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect_at_least(1)
        .create_async()
        .await;

    let model = ModelClient::new(server.url(), "test-key", "test-model", Duration::from_secs(5));
    let orchestrator = build_orchestrator(model, 2);
    let bus = RunBus::new();

    let run = orchestrator
        .run_agent_streaming(Uuid::new_v4(), "do the thing".into(), vec![], &bus)
        .await;

    // The post-exhaustion retry doesn't push a Step unless it produces a
    // final_answer, so the step count stays at the original budget.
    assert_eq!(run.steps.len(), 2);
    assert!(matches!(run.status, autobrowse_agent::agent::RunStatus::Exhausted));
}

#[tokio::test]
async fn empty_model_completion_retries_once_then_exhausts() {
    let mut server = mockito::Server::new_async().await;
    let body = serde_json::json!({
        "choices": [{ "message": { "content": "" } }]
    });
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect_at_least(1)
        .create_async()
        .await;

    let model = ModelClient::new(server.url(), "test-key", "test-model", Duration::from_secs(5));
    let orchestrator = build_orchestrator(model, 10);
    let bus = RunBus::new();

    let run = orchestrator
        .run_agent_streaming(Uuid::new_v4(), "do the thing".into(), vec![], &bus)
        .await;

    assert!(matches!(run.status, autobrowse_agent::agent::RunStatus::Exhausted));
    assert!(run.steps.is_empty());
}

#[tokio::test]
async fn cancelling_a_run_marks_it_cancelled() {
    let mut server = mockito::Server::new_async().await;
    let body = serde_json::json!({
        "choices": [{ "message": { "content": "think(\"still working on it\")" } }]
    });
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect_at_least(1)
        .create_async()
        .await;

    let model = ModelClient::new(server.url(), "test-key", "test-model", Duration::from_secs(5));
    let orchestrator = Arc::new(build_orchestrator(model, 1_000));
    let bus = RunBus::new();
    let run_id = Uuid::new_v4();

    let orchestrator_for_run = orchestrator.clone();
    let handle =
        tokio::spawn(async move { orchestrator_for_run.run_agent_streaming(run_id, "do the thing".into(), vec![], &bus).await });

    // Give the run a moment to register itself in the cancellation map
    // before cancelling it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    orchestrator.cancel(run_id).await.unwrap();

    let run = handle.await.unwrap();
    assert_eq!(run.id, run_id);
    assert!(matches!(run.status, autobrowse_agent::agent::RunStatus::Cancelled));
}

#[tokio::test]
async fn cancelling_an_unknown_run_id_errors() {
    let server = mockito::Server::new_async().await;
    let model = ModelClient::new(server.url(), "test-key", "test-model", Duration::from_secs(5));
    let orchestrator = build_orchestrator(model, 4);

    assert!(orchestrator.cancel(Uuid::new_v4()).await.is_err());
}
