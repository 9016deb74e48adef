//! HTTP intake and read endpoints.
//!
//! Intake accepts a request, persists it, and drives the pipeline on a
//! background task; the response is the freshly submitted record. Reads
//! return the durable record and its governance entries, so callers can
//! follow a request all the way to its confirmation token or failure
//! reason.

use crate::error::{ApiError, ApiResult};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use haven_orchestrator::LifecycleOrchestrator;
use haven_storage::{GovernanceRecord, GovernanceStore, HavenStorage, QueryWindow, RequestStore};
use haven_types::{RequestId, ResidentId, ResidentRequest};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<LifecycleOrchestrator>,
    pub storage: Arc<dyn HavenStorage>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/requests", post(submit_request))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/governance", get(get_governance))
        .route("/residents/:id/requests", get(list_resident_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SubmitBody {
    resident_id: String,
    message_text: String,
}

#[derive(Debug, Deserialize)]
struct WindowParams {
    #[serde(default)]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

async fn submit_request(
    State(state): State<AppState>,
    Json(body): Json<SubmitBody>,
) -> ApiResult<(StatusCode, Json<ResidentRequest>)> {
    let request = state
        .orchestrator
        .submit(ResidentId::new(body.resident_id), body.message_text)
        .await?;

    // Drive the pipeline off the request path; progress is observable
    // through the persisted record.
    let orchestrator = state.orchestrator.clone();
    let id = request.request_id.clone();
    tokio::spawn(async move {
        if let Err(err) = orchestrator.process(&id).await {
            tracing::error!(request_id = %id, error = %err, "pipeline run failed");
        }
    });

    Ok((StatusCode::ACCEPTED, Json(request)))
}

async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ResidentRequest>> {
    let id = RequestId::new(id);
    let record = state
        .storage
        .get_request(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("request {}", id)))?;
    Ok(Json(record))
}

async fn get_governance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<GovernanceRecord>>> {
    let id = RequestId::new(id);
    let entries = state.storage.governance_for_request(&id).await?;
    Ok(Json(entries))
}

async fn list_resident_requests(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(window): Query<WindowParams>,
) -> ApiResult<Json<Vec<ResidentRequest>>> {
    let requests = state
        .storage
        .list_by_resident(
            &ResidentId::new(id),
            QueryWindow {
                limit: window.limit,
                offset: window.offset,
            },
        )
        .await?;
    Ok(Json(requests))
}
