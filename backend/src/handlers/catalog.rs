//! HTTP handlers for catalogs and device types

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    error::{AppError, AppResult},
    middleware::CurrentUser,
    models::{registered_slugs, CatalogKind},
    services::catalog::{
        CatalogService, CreateDeviceTypeInput, CreateEntryInput, CreateIntakeTypeInput,
        CreatePackageTypeInput, CreatePortInput,
    },
    AppState,
};

fn catalog_kind(name: &str) -> AppResult<CatalogKind> {
    CatalogKind::from_str(name).ok_or_else(|| AppError::NotFound(format!("Catalog {}", name)))
}

pub async fn list_device_types(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<impl IntoResponse> {
    let service = CatalogService::new(state.db);
    Ok(Json(service.list_device_types().await?))
}

pub async fn create_device_type(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(input): Json<CreateDeviceTypeInput>,
) -> AppResult<impl IntoResponse> {
    let service = CatalogService::new(state.db);
    let device_type = service.create_device_type(input).await?;
    Ok((StatusCode::CREATED, Json(device_type)))
}

/// Slugs a triaged device type may use
pub async fn list_registered_slugs(_user: CurrentUser) -> impl IntoResponse {
    Json(registered_slugs())
}

pub async fn list_entries(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(catalog): Path<String>,
) -> AppResult<impl IntoResponse> {
    let kind = catalog_kind(&catalog)?;
    let service = CatalogService::new(state.db);
    Ok(Json(service.list_entries(kind).await?))
}

pub async fn create_entry(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(catalog): Path<String>,
    Json(input): Json<CreateEntryInput>,
) -> AppResult<impl IntoResponse> {
    let kind = catalog_kind(&catalog)?;
    let service = CatalogService::new(state.db);
    let entry = service.create_entry(kind, input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_ports(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<impl IntoResponse> {
    let service = CatalogService::new(state.db);
    Ok(Json(service.list_ports().await?))
}

pub async fn create_port(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(input): Json<CreatePortInput>,
) -> AppResult<impl IntoResponse> {
    let service = CatalogService::new(state.db);
    let port = service.create_port(input).await?;
    Ok((StatusCode::CREATED, Json(port)))
}

pub async fn list_intake_types(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<impl IntoResponse> {
    let service = CatalogService::new(state.db);
    Ok(Json(service.list_intake_types().await?))
}

pub async fn create_intake_type(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(input): Json<CreateIntakeTypeInput>,
) -> AppResult<impl IntoResponse> {
    let service = CatalogService::new(state.db);
    let intake_type = service.create_intake_type(input).await?;
    Ok((StatusCode::CREATED, Json(intake_type)))
}

pub async fn list_package_types(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<impl IntoResponse> {
    let service = CatalogService::new(state.db);
    Ok(Json(service.list_package_types().await?))
}

pub async fn create_package_type(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(input): Json<CreatePackageTypeInput>,
) -> AppResult<impl IntoResponse> {
    let service = CatalogService::new(state.db);
    let package_type = service.create_package_type(input).await?;
    Ok((StatusCode::CREATED, Json(package_type)))
}
