//! Binary entry point: assembles the Browser Session Kernel, the tiered
//! cache, the Tool Registry and the Agent Orchestrator, and serves the
//! HTTP/SSE surface over `axum`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;

use autobrowse_agent::agent::{HistoryStore, ModelClient, Orchestrator};
use autobrowse_agent::browser::BrowserKernel;
use autobrowse_agent::cache::{CacheService, L1Store, L2Store};
use autobrowse_agent::extraction::ExtractionPipeline;
use autobrowse_agent::http::{self, AppState};
use autobrowse_agent::tools::ToolRegistry;
use autobrowse_agent::AppConfig;

fn durable_session_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("autobrowse-agent")
        .join("session")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env();

    let kernel = Arc::new(BrowserKernel::new(
        std::env::var("HEADLESS").map(|v| v != "0").unwrap_or(true),
        durable_session_dir(),
    )?);

    let remote = match &config.redis_url {
        Some(url) => L1Store::connect_remote(url).await,
        None => None,
    };
    let l1 = L1Store::new(remote);
    let l2 = config.duckdb_url.as_deref().map(L2Store::new);
    let cache = Arc::new(CacheService::new(l1, l2));

    let pipeline = Arc::new(ExtractionPipeline::new(cache.clone(), None));
    let tools = Arc::new(ToolRegistry::new(kernel.clone(), pipeline.clone()));

    let model = ModelClient::new(
        config.active_openai_url.clone(),
        config.openai_api_key.clone(),
        std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        config.timeout_http_request,
    );

    let history = match std::env::var("HISTORY_DATABASE_URL") {
        Ok(url) => match HistoryStore::connect(&url).await {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                tracing::warn!("execution history store unavailable, continuing without it: {e}");
                None
            }
        },
        Err(_) => None,
    };

    let orchestrator = Arc::new(Orchestrator::new(
        model,
        tools.clone(),
        history.clone(),
        config.smolagents_max_steps,
        config.agent_stream_chunk_size,
    ));

    let state = AppState {
        kernel: kernel.clone(),
        tools,
        orchestrator,
        active_runs: Arc::new(RwLock::new(Default::default())),
        history,
    };

    let app = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.http_bind_addr).await?;
    tracing::info!("listening on {}", config.http_bind_addr);

    let shutdown_kernel = kernel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received, closing browser kernel");
            shutdown_kernel.shutdown().await;
        })
        .await?;

    Ok(())
}
