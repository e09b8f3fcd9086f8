//! JSON HTTP API over the garden services.

pub mod api;
pub mod auth;
pub mod dashboard;
pub mod server;
pub mod webhook;

pub use api::{AppState, SharedState, api_router};
pub use server::{ServerConfig, build_router, open_database, service_context, start_server};
