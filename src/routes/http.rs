// Handlers: version, ingest, pod metadata

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::AppState;
use super::error::ApiError;
use crate::models::{IngestBatch, PodInfo};

/// GET /version — service name and version, fixed at build time.
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /api/samples — hands the batch to the writer; waits for channel space when it is full.
pub(super) async fn ingest_handler(
    State(state): State<AppState>,
    Json(batch): Json<IngestBatch>,
) -> Result<StatusCode, ApiError> {
    if batch.is_empty() {
        return Ok(StatusCode::ACCEPTED);
    }
    let items = batch.len();
    state
        .ingest_tx
        .send(batch)
        .await
        .map_err(|_| ApiError::Unavailable)?;
    tracing::debug!(items, "ingest batch queued");
    Ok(StatusCode::ACCEPTED)
}

/// GET /api/nodes/{node}/pods
pub(super) async fn node_pods_handler(
    State(state): State<AppState>,
    Path(node): Path<String>,
) -> Result<Json<Vec<PodInfo>>, ApiError> {
    Ok(Json(state.repo.list_pods(&node).await?))
}

/// GET /api/pods/{name} — newest pod with that name.
pub(super) async fn pod_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<PodInfo>, ApiError> {
    state
        .repo
        .find_pod(&name)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("pod {name} not found")))
}
