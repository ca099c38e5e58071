//! HTTP surface for agent clients: chat/SSE, last-result, execution-history,
//! health, and tab management.

pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
