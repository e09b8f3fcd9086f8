use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::api::{self, AppState};
use crate::audit::AuditLogger;
use crate::config::TuinConfig;
use crate::services::ServiceContext;
use crate::store::{DbHandle, TuinDb};
use crate::tools::build_monitor::{BuildMonitor, MonitorConfig};

/// Configuration for the HTTP server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            db_path: PathBuf::from(".tuin/tuinbeheer.db"),
            dev_mode: false,
        }
    }
}

impl ServerConfig {
    pub fn from_config(config: &TuinConfig) -> Self {
        let server = &config.toml.server;
        Self {
            host: server.host.clone(),
            port: server.port,
            db_path: config.db_path(),
            dev_mode: server.dev_mode,
        }
    }
}

/// Build the full application router with request tracing.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the database, creating its directory when missing.
pub fn open_database(db_path: &std::path::Path) -> Result<DbHandle> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
    }
    let db = TuinDb::new(db_path).context("Failed to initialize garden database")?;
    Ok(DbHandle::new(db))
}

/// Database, audit log and limits for one process.
pub fn service_context(config: &TuinConfig, db_path: &std::path::Path) -> Result<ServiceContext> {
    let db = open_database(db_path)?;
    let audit = AuditLogger::new(
        config
            .toml
            .logging
            .audit_file
            .as_ref()
            .map(|p| config.resolve(p)),
    );
    Ok(ServiceContext::new(db, audit, &config.toml))
}

/// Start the garden server and block until Ctrl-C.
pub async fn start_server(config: &TuinConfig, server: ServerConfig) -> Result<()> {
    let ctx = service_context(config, &server.db_path)?;
    let monitor = BuildMonitor::new(MonitorConfig::from_config(config));
    let state = Arc::new(AppState::new(
        ctx,
        config.toml.webhook.secret.clone(),
        Some(monitor),
    ));

    let mut app = build_router(state);
    if server.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(addr = %local_addr, db = %server.db_path.display(), "Tuinbeheer server listening");
    println!("Tuinbeheer running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let db = DbHandle::new(TuinDb::new_in_memory().unwrap());
        let state = Arc::new(AppState::new(ServiceContext::with_defaults(db), None, None));
        build_router(state)
    }

    #[tokio::test]
    async fn test_health_via_full_router() {
        let app = test_router();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_routes_mounted() {
        let app = test_router();
        let req = Request::builder()
            .uri("/api/gardens")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        // Mounted but requires a session
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = test_router();
        let req = Request::builder()
            .uri("/some/client/route")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_open_database_creates_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("tuin.db");
        let handle = open_database(&path).unwrap();
        assert!(path.exists());
        assert_eq!(handle.lock_sync().unwrap().count_gardens().unwrap(), 0);
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.db_path, PathBuf::from(".tuin/tuinbeheer.db"));
        assert!(!config.dev_mode);
    }
}
