//! Download client handlers.

use super::ClientResponse;
use crate::api::AppState;
use crate::error::Error;
use crate::types::ClientId;
use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};

/// GET /clients - List configured download clients
#[utoipa::path(
    get,
    path = "/api/v1/clients",
    tag = "clients",
    responses(
        (status = 200, description = "Configured download clients", body = Vec<ClientResponse>)
    )
)]
pub async fn list_clients(State(state): State<AppState>) -> impl IntoResponse {
    let clients: Vec<ClientResponse> = state
        .tracker
        .registry()
        .all()
        .iter()
        .map(|client| {
            let definition = client.definition();
            ClientResponse {
                id: definition.id,
                name: definition.name.clone(),
                kind: definition.kind,
                protocol: client.protocol(),
                enable: definition.enable,
                category: definition.category.clone(),
            }
        })
        .collect();

    Json(clients)
}

/// POST /clients/:id/test - Test a client connection
///
/// Runs the backend's version probe and reports latency or the error.
#[utoipa::path(
    post,
    path = "/api/v1/clients/{id}/test",
    tag = "clients",
    params(
        ("id" = i64, Path, description = "Client definition id")
    ),
    responses(
        (status = 200, description = "Test outcome", body = crate::types::ClientTestResult),
        (status = 404, description = "No client with this id", body = crate::error::ApiError)
    )
)]
pub async fn test_client(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let Some(client) = state.tracker.registry().get(ClientId::new(id)) else {
        return Error::NotFound(format!("download client {id}")).into_response();
    };

    let result = client.test().await;
    Json(result).into_response()
}
