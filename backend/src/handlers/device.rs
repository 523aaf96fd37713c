//! HTTP handlers for devices, the inventory grid and faults

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    error::AppResult,
    middleware::CurrentUser,
    services::{
        device::{DeviceFilter, DeviceService, UpdateDevicesInput},
        fault::{FaultService, ReportFaultInput, ResolveFaultInput},
        movement::MovementService,
    },
    AppState,
};

/// List devices with filters and pagination
pub async fn list_devices(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(filter): Query<DeviceFilter>,
) -> AppResult<impl IntoResponse> {
    let service = DeviceService::new(state.db);
    let page = service
        .list_devices(filter, state.config.inventory.default_page_size)
        .await?;
    Ok(Json(page))
}

pub async fn get_device(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(triage): Path<String>,
) -> AppResult<impl IntoResponse> {
    let service = DeviceService::new(state.db);
    Ok(Json(service.get_device_by_triage(&triage).await?))
}

/// Devices that can go into a package
pub async fn list_package_candidates(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<impl IntoResponse> {
    let service = DeviceService::new(state.db);
    Ok(Json(service.list_package_candidates().await?))
}

/// Save edits from the inventory grid
pub async fn update_devices(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(input): Json<UpdateDevicesInput>,
) -> AppResult<impl IntoResponse> {
    let service = DeviceService::new(state.db);
    Ok(Json(service.update_devices(input).await?))
}

pub async fn invalidate_device(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(triage): Path<String>,
) -> AppResult<impl IntoResponse> {
    let service = DeviceService::new(state.db);
    Ok(Json(service.invalidate_device(&triage).await?))
}

/// Stage history of a device
pub async fn device_history(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(triage): Path<String>,
) -> AppResult<impl IntoResponse> {
    let service = MovementService::new(state.db);
    Ok(Json(service.changes_for_device(&triage).await?))
}

pub async fn list_faults(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(triage): Path<String>,
) -> AppResult<impl IntoResponse> {
    let service = FaultService::new(state.db);
    Ok(Json(service.list_faults(&triage).await?))
}

pub async fn report_fault(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(triage): Path<String>,
    Json(input): Json<ReportFaultInput>,
) -> AppResult<impl IntoResponse> {
    let service = FaultService::new(state.db);
    let fault = service.report_fault(user.0.user_id, &triage, input).await?;
    Ok((StatusCode::CREATED, Json(fault)))
}

pub async fn resolve_fault(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(fault_id): Path<i64>,
    Json(input): Json<ResolveFaultInput>,
) -> AppResult<impl IntoResponse> {
    let service = FaultService::new(state.db);
    Ok(Json(service.resolve_fault(user.0.user_id, fault_id, input).await?))
}
