//! HTTP handlers for the REST API

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use tracing::{error, instrument};

use crate::controller::{monitored_clusters, ControllerState};

use super::dto::{ClusterListResponse, ErrorResponse, HealthResponse};

/// Health check endpoint
#[instrument(skip(state))]
pub async fn health(State(state): State<Arc<ControllerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        leader: state.is_leader.load(Ordering::Relaxed),
    })
}

/// Prometheus text exposition of the operator metrics
pub async fn metrics() -> Result<String, StatusCode> {
    use prometheus_client::encoding::text::encode;
    let mut buffer = String::new();
    encode(&mut buffer, &crate::controller::metrics::REGISTRY).map_err(|e| {
        error!("Failed to encode metrics: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(buffer)
}

/// List the clusters that currently receive a snitch URL
#[instrument(skip(state))]
pub async fn list_clusters(
    State(state): State<Arc<ControllerState>>,
) -> Result<Json<ClusterListResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.store.list_sync_sets(None).await {
        Ok(sync_sets) => {
            let items = monitored_clusters(&sync_sets);
            let total = items.len();
            Ok(Json(ClusterListResponse { items, total }))
        }
        Err(e) => {
            error!("Failed to list SyncSets: {:?}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("list_failed", &e.to_string())),
            ))
        }
    }
}
