//! Shared application state handed to every axum handler.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::agent::{HistoryStore, Orchestrator};
use crate::browser::BrowserKernel;
use crate::stream::RunBus;
use crate::tools::ToolRegistry;

#[derive(Clone)]
pub struct AppState {
    pub kernel: Arc<BrowserKernel>,
    pub tools: Arc<ToolRegistry>,
    pub orchestrator: Arc<Orchestrator>,
    /// Buses for runs currently in flight, so a reconnecting subscriber can
    /// attach to the same stream rather than missing events.
    pub active_runs: Arc<RwLock<HashMap<Uuid, RunBus>>>,
    /// Shared with the orchestrator's own handle; used by the
    /// execution-history endpoint for read-only queries.
    pub history: Option<Arc<HistoryStore>>,
}
