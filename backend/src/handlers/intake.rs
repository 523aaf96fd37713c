//! HTTP handlers for the intake ledger

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    error::AppResult,
    middleware::CurrentUser,
    services::intake::{
        AddDiscountInput, CreateIntakeInput, IntakeService, MaterializeInput, RecordDetailInput,
    },
    AppState,
};

pub async fn list_intakes(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<impl IntoResponse> {
    let service = IntakeService::new(state.db);
    Ok(Json(service.list_intakes().await?))
}

pub async fn create_intake(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<CreateIntakeInput>,
) -> AppResult<impl IntoResponse> {
    let service = IntakeService::new(state.db);
    let intake = service.create_intake(user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(intake)))
}

/// Intake with its details, discounts and totals
pub async fn get_intake(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(intake_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = IntakeService::new(state.db);
    Ok(Json(service.get_intake(intake_id).await?))
}

/// Record a detail line on an intake
pub async fn record_intake(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(intake_id): Path<i64>,
    Json(input): Json<RecordDetailInput>,
) -> AppResult<impl IntoResponse> {
    let service = IntakeService::new(state.db);
    let detail = service.record_intake(user.0.user_id, intake_id, input).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn add_discount(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(intake_id): Path<i64>,
    Json(input): Json<AddDiscountInput>,
) -> AppResult<impl IntoResponse> {
    let service = IntakeService::new(state.db);
    let discount = service.add_discount(intake_id, input).await?;
    Ok((StatusCode::CREATED, Json(discount)))
}

/// Create the usable devices of a detail line
pub async fn materialize_devices(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(detail_id): Path<i64>,
    Json(input): Json<MaterializeInput>,
) -> AppResult<impl IntoResponse> {
    let service = IntakeService::new(state.db);
    let report = service
        .materialize_devices(
            user.0.user_id,
            detail_id,
            input,
            state.config.inventory.max_batch_size,
        )
        .await?;
    Ok(Json(report))
}

/// Create the spare parts of a detail line
pub async fn materialize_spares(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(detail_id): Path<i64>,
    Json(input): Json<MaterializeInput>,
) -> AppResult<impl IntoResponse> {
    let service = IntakeService::new(state.db);
    let report = service
        .materialize_spares(
            user.0.user_id,
            detail_id,
            input,
            state.config.inventory.max_batch_size,
        )
        .await?;
    Ok(Json(report))
}

pub async fn list_spares(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(intake_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = IntakeService::new(state.db);
    Ok(Json(service.list_spares(intake_id).await?))
}
