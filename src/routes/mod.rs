// HTTP routes

mod error;
mod http;
mod usage;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::models::IngestBatch;
use crate::sample_repo::SampleRepo;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) repo: Arc<SampleRepo>,
    pub(crate) ingest_tx: mpsc::Sender<IngestBatch>,
    pub(crate) config: AppConfig,
}

pub fn app(
    repo: Arc<SampleRepo>,
    ingest_tx: mpsc::Sender<IngestBatch>,
    config: AppConfig,
) -> Router {
    let state = AppState {
        repo,
        ingest_tx,
        config,
    };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/samples", post(http::ingest_handler)) // POST /api/samples
        .route("/api/pods/{name}", get(http::pod_handler)) // GET /api/pods/{name}
        .route("/api/nodes/{node}/pods", get(http::node_pods_handler)) // GET /api/nodes/{node}/pods
        .route("/api/nodes/{node}/resources", get(usage::resources_handler)) // GET /api/nodes/{node}/resources
        .route("/api/nodes/{node}/network", get(usage::network_handler)) // GET /api/nodes/{node}/network
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
