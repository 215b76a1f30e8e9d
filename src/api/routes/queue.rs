//! Queue view handlers and the explicit reconcile trigger.

use crate::api::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

/// GET /queue - Downloads the tracker still has work for
#[utoipa::path(
    get,
    path = "/api/v1/queue",
    tag = "queue",
    responses(
        (status = 200, description = "Downloads with pending work", body = Vec<crate::types::TrackedDownload>)
    )
)]
pub async fn get_queue(State(state): State<AppState>) -> impl IntoResponse {
    let queued = state.tracker.queued_downloads().await;
    Json(queued.to_vec())
}

/// GET /tracked - Every tracked download, including removed ones
#[utoipa::path(
    get,
    path = "/api/v1/tracked",
    tag = "queue",
    responses(
        (status = 200, description = "All tracked downloads", body = Vec<crate::types::TrackedDownload>)
    )
)]
pub async fn get_tracked(State(state): State<AppState>) -> impl IntoResponse {
    let tracked = state.tracker.tracked_downloads().await;
    Json(tracked.to_vec())
}

/// GET /completed - Finished downloads whose import has not concluded
#[utoipa::path(
    get,
    path = "/api/v1/completed",
    tag = "queue",
    responses(
        (status = 200, description = "Completed downloads awaiting import", body = Vec<crate::types::TrackedDownload>)
    )
)]
pub async fn get_completed(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.tracker.completed_downloads().await)
}

/// GET /stats - Tracking statistics
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "queue",
    responses(
        (status = 200, description = "Tracking statistics", body = crate::types::TrackingStats)
    )
)]
pub async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.tracker.stats().await)
}

/// POST /check - Run a reconciliation pass now
///
/// Waits for the pass to finish, so a 204 means the views are current.
#[utoipa::path(
    post,
    path = "/api/v1/check",
    tag = "queue",
    responses(
        (status = 204, description = "Reconciliation pass finished")
    )
)]
pub async fn run_check(State(state): State<AppState>) -> impl IntoResponse {
    state.tracker.check_now().await;
    StatusCode::NO_CONTENT
}
