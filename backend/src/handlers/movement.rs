//! HTTP handlers for movement requests

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    error::AppResult,
    middleware::CurrentUser,
    services::movement::{ApplyMovementInput, CreateMovementInput, MovementService},
    AppState,
};

pub async fn list_open_requests(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<impl IntoResponse> {
    let service = MovementService::new(state.db);
    Ok(Json(service.list_open_requests().await?))
}

pub async fn create_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<CreateMovementInput>,
) -> AppResult<impl IntoResponse> {
    let service = MovementService::new(state.db);
    let request = service.create_request(user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn get_request(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(request_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = MovementService::new(state.db);
    Ok(Json(service.get_request(request_id).await?))
}

/// Apply a request to the scanned devices
pub async fn apply_movement(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(request_id): Path<i64>,
    Json(input): Json<ApplyMovementInput>,
) -> AppResult<impl IntoResponse> {
    let service = MovementService::new(state.db);
    let result = service
        .apply_movement(user.0.user_id, request_id, input)
        .await?;
    Ok(Json(result))
}

pub async fn reject_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(request_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = MovementService::new(state.db);
    Ok(Json(service.reject_request(user.0.user_id, request_id).await?))
}

/// Audit rows written by a request
pub async fn request_changes(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(request_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = MovementService::new(state.db);
    Ok(Json(service.changes_for_request(request_id).await?))
}
