//! HTTP API: server, routing, and the authentication pipeline.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;

pub use app::{AppState, build_app, router};
pub use config::AppConfig;
