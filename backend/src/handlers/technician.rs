//! HTTP handlers for technician device-type assignments

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::CurrentUser,
    services::technician::{SetAssignmentInput, TechnicianService},
    AppState,
};

pub async fn get_technician_assignment(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let service = TechnicianService::new(state.db);
    Ok(Json(service.get_assignment(user_id).await?))
}

pub async fn set_technician_assignment(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(input): Json<SetAssignmentInput>,
) -> AppResult<impl IntoResponse> {
    let service = TechnicianService::new(state.db);
    Ok(Json(service.set_assignment(user_id, input).await?))
}

pub async fn remove_technician_assignment(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let service = TechnicianService::new(state.db);
    service.remove_assignment(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
