//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the API, the UI page and the log stream
//! - Wire up middleware (tracing, limits, request ID, timeouts)
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ManagerConfig;
use crate::daemon::ConfigEngine;
use crate::http::{handlers, pages, stream};
use crate::lifecycle::Shutdown;
use crate::service::RestartCoordinator;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConfigEngine>,
    pub restart: Arc<RestartCoordinator>,
    pub config: Arc<ManagerConfig>,
    pub shutdown: Arc<Shutdown>,
}

/// HTTP server for the web UI and its JSON API.
pub struct HttpServer {
    router: Router,
    shutdown: Arc<Shutdown>,
}

impl HttpServer {
    pub fn new(
        config: Arc<ManagerConfig>,
        engine: Arc<ConfigEngine>,
        restart: Arc<RestartCoordinator>,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        let state = AppState {
            engine,
            restart,
            config: Arc::clone(&config),
            shutdown: Arc::clone(&shutdown),
        };
        let router = Self::build_router(&config, state);
        Self { router, shutdown }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The log stream is long-lived and sits outside the request timeout.
    #[allow(deprecated)]
    fn build_router(config: &ManagerConfig, state: AppState) -> Router {
        let api = Router::new()
            .route("/", get(pages::index))
            .route("/api/status", get(handlers::get_status))
            .route("/api/daemon/status", get(handlers::get_daemon_status))
            .route(
                "/api/config",
                get(handlers::get_config).put(handlers::put_config),
            )
            .route("/api/config/preview", get(handlers::get_preview))
            .route(
                "/api/backups",
                get(handlers::list_backups).post(handlers::create_backup),
            )
            .route(
                "/api/backups/{id}",
                get(handlers::get_backup).delete(handlers::delete_backup),
            )
            .route("/api/backups/{id}/restore", post(handlers::restore_backup))
            .route("/api/restart", post(handlers::start_restart))
            .route("/api/restart/stop", post(handlers::stop_restart))
            .route("/api/probe/mirror", post(handlers::probe_mirror))
            .route("/api/probe/proxy", post(handlers::probe_proxy))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )));

        let streams = Router::new().route("/api/restart/stream", get(stream::restart_stream));

        api.merge(streams)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-store"),
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut shutdown = self.shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn server(dir: &std::path::Path) -> HttpServer {
        let mut config = ManagerConfig::default();
        config.paths.daemon_config = dir.join("dockerd.json");
        config.paths.backup_dir = dir.join("backups");
        config.security.max_body_size = 64;
        std::fs::write(&config.paths.daemon_config, "{}").unwrap();

        let engine = Arc::new(ConfigEngine::new(config.engine_settings()));
        let restart = Arc::new(RestartCoordinator::new(config.service.clone()));
        HttpServer::new(Arc::new(config), engine, restart, Arc::new(Shutdown::new()))
    }

    #[tokio::test]
    async fn test_request_id_is_generated() {
        let dir = tempfile::tempdir().unwrap();
        let res = server(dir.path())
            .router()
            .oneshot(Request::get("/api/config").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let id = res.headers()["x-request-id"].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
        assert_eq!(res.headers()[header::CACHE_CONTROL], "no-store");
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let res = server(dir.path())
            .router()
            .oneshot(
                Request::get("/api/backups")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn test_body_limit() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(r#"{{"edits":{{"no-proxy":"{}"}}}}"#, "x".repeat(200));
        let res = server(dir.path())
            .router()
            .oneshot(
                Request::put("/api/config")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::CONTENT_LENGTH, body.len())
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let dir = tempfile::tempdir().unwrap();
        let res = server(dir.path())
            .router()
            .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
