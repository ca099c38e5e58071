//! Autonomous browser-automation agent: a long-lived Browser Session Kernel,
//! a tiered extraction cache, an enum-backed Tool Registry, and an Agent
//! Orchestrator that drives a plan→act→observe loop against them, exposed
//! over an `axum` HTTP/SSE surface.

pub mod agent;
pub mod browser;
pub mod cache;
pub mod config;
pub mod extraction;
pub mod http;
pub mod stream;
pub mod tools;
pub mod utils;
pub mod web_search;

pub use config::AppConfig;
