//! HTTP handlers for warehouse locations

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::{
    error::AppResult,
    middleware::CurrentUser,
    services::warehouse::{
        CreateLevelInput, CreatePalletInput, CreateSectorInput, PlaceOnPalletInput,
        WarehouseService,
    },
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct PalletQuery {
    pub sector_id: Option<i64>,
}

pub async fn list_aisles(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<impl IntoResponse> {
    let service = WarehouseService::new(state.db);
    Ok(Json(service.list_aisles().await?))
}

pub async fn create_aisle(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<impl IntoResponse> {
    let service = WarehouseService::new(state.db);
    Ok((StatusCode::CREATED, Json(service.create_aisle().await?)))
}

pub async fn list_levels(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(aisle_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = WarehouseService::new(state.db);
    Ok(Json(service.list_levels(aisle_id).await?))
}

pub async fn create_level(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(input): Json<CreateLevelInput>,
) -> AppResult<impl IntoResponse> {
    let service = WarehouseService::new(state.db);
    Ok((StatusCode::CREATED, Json(service.create_level(input).await?)))
}

pub async fn list_sectors(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(level_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = WarehouseService::new(state.db);
    Ok(Json(service.list_sectors(level_id).await?))
}

pub async fn create_sector(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(input): Json<CreateSectorInput>,
) -> AppResult<impl IntoResponse> {
    let service = WarehouseService::new(state.db);
    Ok((StatusCode::CREATED, Json(service.create_sector(input).await?)))
}

pub async fn list_pallets(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<PalletQuery>,
) -> AppResult<impl IntoResponse> {
    let service = WarehouseService::new(state.db);
    Ok(Json(service.list_pallets(query.sector_id).await?))
}

pub async fn create_pallet(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(input): Json<CreatePalletInput>,
) -> AppResult<impl IntoResponse> {
    let service = WarehouseService::new(state.db);
    Ok((StatusCode::CREATED, Json(service.create_pallet(input).await?)))
}

pub async fn place_device(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(triage): Path<String>,
    Json(input): Json<PlaceOnPalletInput>,
) -> AppResult<impl IntoResponse> {
    let service = WarehouseService::new(state.db);
    Ok(Json(service.place_device(&triage, input).await?))
}

pub async fn place_spare(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(spare_id): Path<i64>,
    Json(input): Json<PlaceOnPalletInput>,
) -> AppResult<impl IntoResponse> {
    let service = WarehouseService::new(state.db);
    service.place_spare(spare_id, input).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Everything stored in an aisle
pub async fn devices_in_aisle(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(aisle_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = WarehouseService::new(state.db);
    Ok(Json(service.devices_in_aisle(aisle_id).await?))
}
