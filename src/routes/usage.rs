// Aggregated usage queries: resources and network per node

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use super::AppState;
use super::error::ApiError;
use crate::engine::WindowWidth;
use crate::models::{NetworkUsageRow, ResourceUsageRow};
use crate::pipeline::{GroupBy, RunContext, UsageRequest, network, resource};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UsageParams {
    /// Inclusive lower bound, nanoseconds since the epoch.
    #[serde(default)]
    start: i64,
    /// Exclusive upper bound; open-ended when absent.
    end: Option<i64>,
    group_by: Option<String>,
    window_secs: Option<u64>,
}

fn usage_request(
    state: &AppState,
    node: String,
    params: UsageParams,
) -> Result<UsageRequest, ApiError> {
    if params.start < 0 {
        return Err(ApiError::BadRequest(format!(
            "start must be >= 0, got {}",
            params.start
        )));
    }
    if let Some(end) = params.end
        && end <= params.start
    {
        return Err(ApiError::BadRequest(format!(
            "end must be after start, got start={} end={}",
            params.start, end
        )));
    }
    let group_by = match params.group_by.as_deref() {
        Some(s) => s
            .parse::<GroupBy>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => GroupBy::Pod,
    };
    let window_secs = params
        .window_secs
        .unwrap_or(state.config.aggregation.window_secs);
    let window = WindowWidth::from_secs(window_secs)
        .map_err(|e| ApiError::BadRequest(format!("windowSecs: {e}")))?;
    Ok(UsageRequest {
        node,
        start_ns: params.start,
        end_ns: params.end,
        group_by,
        window,
    })
}

/// GET /api/nodes/{node}/resources — CPU %, disk throughput and memory per window and group.
pub(super) async fn resources_handler(
    State(state): State<AppState>,
    Path(node): Path<String>,
    Query(params): Query<UsageParams>,
) -> Result<Json<Vec<ResourceUsageRow>>, ApiError> {
    let request = usage_request(&state, node, params)?;
    let ctx = RunContext::new(state.config.aggregation.parallel_threshold);
    // Dropped with the handler future, so a disconnected client stops the reduction.
    let _cancel_on_drop = ctx.cancel.clone().drop_guard();
    let rows = resource::resource_usage(state.repo.as_ref(), &request, &ctx).await?;
    Ok(Json(rows))
}

/// GET /api/nodes/{node}/network — per-second network rates per window and group.
pub(super) async fn network_handler(
    State(state): State<AppState>,
    Path(node): Path<String>,
    Query(params): Query<UsageParams>,
) -> Result<Json<Vec<NetworkUsageRow>>, ApiError> {
    let request = usage_request(&state, node, params)?;
    let ctx = RunContext::new(state.config.aggregation.parallel_threshold);
    let _cancel_on_drop = ctx.cancel.clone().drop_guard();
    let rows = network::network_usage(state.repo.as_ref(), &request, &ctx).await?;
    Ok(Json(rows))
}
