//! JSON API handlers.
//!
//! Engine calls do blocking file I/O and run on the blocking pool.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::daemon::{BackupRecord, ConfigDocument, ConfigEngine, EngineResult, FileInfo, Preview};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::service::{probe, status, system, DaemonStatus};

/// Run an engine operation off the async workers.
async fn with_engine<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&ConfigEngine) -> EngineResult<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    let result = tokio::task::spawn_blocking(move || op(&engine)).await?;
    Ok(result?)
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub daemon: DaemonStatus,
    pub dsm_version: String,
    pub docker_version: String,
    pub port: system::PortStatus,
    pub config: FileInfo,
    pub backup_dir: String,
    pub backup_count: Option<usize>,
    pub restart_in_progress: bool,
}

pub async fn get_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let service = &state.config.service;
    let timeout = Duration::from_secs(service.command_timeout_secs);
    let (daemon, dsm_version, docker_version, port) = tokio::join!(
        status::probe_status(service),
        system::dsm_version(std::path::Path::new(system::DSM_VERSION_FILE)),
        system::docker_version(timeout),
        system::port_status(&state.config.listener.bind_address, Duration::from_secs(1)),
    );

    let (config, backup_count) = with_engine(&state, |engine| {
        let count = engine.list_backups().ok().map(|b| b.len());
        Ok((engine.file_info(), count))
    })
    .await?;

    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        daemon,
        dsm_version,
        docker_version,
        port,
        config,
        backup_dir: state.engine.backups().dir().display().to_string(),
        backup_count,
        restart_in_progress: state.restart.is_running(),
    }))
}

pub async fn get_daemon_status(State(state): State<AppState>) -> Json<DaemonStatus> {
    Json(status::probe_status(&state.config.service).await)
}

pub async fn get_config(State(state): State<AppState>) -> Result<Json<ConfigDocument>, ApiError> {
    Ok(Json(with_engine(&state, |engine| engine.read()).await?))
}

pub async fn get_preview(State(state): State<AppState>) -> Result<Json<Preview>, ApiError> {
    Ok(Json(with_engine(&state, |engine| engine.preview()).await?))
}

#[derive(Deserialize)]
pub struct UpdateRequest {
    pub edits: Map<String, Value>,
}

#[derive(Serialize)]
pub struct ConfigResponse {
    pub success: bool,
    pub config: ConfigDocument,
}

impl ConfigResponse {
    fn ok(config: ConfigDocument) -> Json<Self> {
        Json(Self {
            success: true,
            config,
        })
    }
}

pub async fn put_config(
    State(state): State<AppState>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let keys: Vec<&String> = request.edits.keys().collect();
    tracing::info!(fields = ?keys, "Updating daemon configuration");
    let document = with_engine(&state, move |engine| engine.update(&request.edits)).await?;
    Ok(ConfigResponse::ok(document))
}

pub async fn list_backups(
    State(state): State<AppState>,
) -> Result<Json<Vec<BackupRecord>>, ApiError> {
    Ok(Json(with_engine(&state, |engine| engine.list_backups()).await?))
}

pub async fn create_backup(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<BackupRecord>), ApiError> {
    let record = with_engine(&state, |engine| engine.backup_now()).await?;
    tracing::info!(backup = %record.id, "Manual backup created");
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct BackupQuery {
    /// Return the file byte for byte instead of the parsed document.
    pub raw: bool,
}

pub async fn get_backup(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<BackupQuery>,
) -> Result<Response, ApiError> {
    if query.raw {
        let content = with_engine(&state, move |engine| engine.read_backup_raw(&id)).await?;
        return Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], content).into_response());
    }
    let document = with_engine(&state, move |engine| engine.retrieve_backup(&id)).await?;
    Ok(Json(document).into_response())
}

pub async fn delete_backup(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let target = id.clone();
    with_engine(&state, move |engine| engine.delete_backup(&target)).await?;
    tracing::info!(backup = %id, "Backup deleted");
    Ok(Json(serde_json::json!({ "success": true, "deleted": id })))
}

pub async fn restore_backup(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConfigResponse>, ApiError> {
    tracing::info!(backup = %id, "Restoring backup");
    let document = with_engine(&state, move |engine| engine.rollback(&id)).await?;
    Ok(ConfigResponse::ok(document))
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct RestartRequest {
    pub fallback: bool,
}

/// The body is optional; an empty one means the primary command.
pub async fn start_restart(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request: RestartRequest = if body.is_empty() {
        RestartRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };
    state.restart.start(request.fallback)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "success": true, "fallback": request.fallback })),
    ))
}

pub async fn stop_restart(State(state): State<AppState>) -> Json<Value> {
    state.restart.stop();
    Json(serde_json::json!({ "success": true }))
}

#[derive(Deserialize)]
pub struct ProbeRequest {
    pub url: String,
    #[serde(default)]
    pub https: bool,
}

pub async fn probe_mirror(Json(request): Json<ProbeRequest>) -> Json<probe::ProbeResult> {
    Json(probe::probe_mirror(&request.url).await)
}

pub async fn probe_proxy(Json(request): Json<ProbeRequest>) -> Json<probe::ProbeResult> {
    Json(probe::probe_proxy(&request.url, request.https).await)
}
