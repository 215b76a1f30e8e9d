//! History handlers.

use super::HistoryQuery;
use crate::api::AppState;
use crate::types::HistoryEventType;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

/// GET /history - Grab/fail/import history (with pagination)
#[utoipa::path(
    get,
    path = "/api/v1/history",
    tag = "history",
    params(
        ("event_type" = Option<String>, Query, description = "Filter by event kind (grabbed/failed/imported)"),
        ("limit" = Option<i64>, Query, description = "Maximum number of rows to return"),
        ("offset" = Option<i64>, Query, description = "Number of rows to skip")
    ),
    responses(
        (status = 200, description = "History rows, most recent first", body = Vec<crate::types::HistoryRecord>),
        (status = 400, description = "Invalid query parameters"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(50).clamp(1, 1000) as usize;
    let offset = query.offset.unwrap_or(0).max(0) as usize;

    let event_filter = if let Some(event_str) = query.event_type {
        match event_str.to_lowercase().as_str() {
            "grabbed" => Some(HistoryEventType::Grabbed),
            "failed" => Some(HistoryEventType::Failed),
            "imported" => Some(HistoryEventType::Imported),
            _ => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": {"code": "invalid_event_type", "message": "Invalid event filter. Must be 'grabbed', 'failed' or 'imported'"}})),
                ).into_response();
            }
        }
    } else {
        None
    };

    match state.db.query_history(event_filter, limit, offset).await {
        Ok(rows) => match state.db.count_history(event_filter).await {
            Ok(total) => {
                let response = json!({
                    "items": rows,
                    "total": total,
                    "limit": limit,
                    "offset": offset
                });
                (StatusCode::OK, Json(response)).into_response()
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to count history");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": {"code": "database_error", "message": "Failed to count history rows"}}))).into_response()
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "failed to query history");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": {"code": "database_error", "message": "Failed to retrieve history"}}))).into_response()
        }
    }
}
