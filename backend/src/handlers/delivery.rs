//! HTTP handlers for deliveries, packages and accounting

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
    services::{
        delivery::{CreateDeliveryInput, DeliveryService, ReviewDeliveryInput},
        package::{AccountingInput, AssignDeviceInput, CreatePackagesInput, PackageService},
    },
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct DeliveryQuery {
    pub in_creation: Option<bool>,
}

pub async fn list_deliveries(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<DeliveryQuery>,
) -> AppResult<impl IntoResponse> {
    let service = DeliveryService::new(state.db);
    Ok(Json(service.list_deliveries(query.in_creation).await?))
}

pub async fn create_delivery(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<CreateDeliveryInput>,
) -> AppResult<impl IntoResponse> {
    let service = DeliveryService::new(state.db);
    let delivery = service.create_delivery(user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(delivery)))
}

pub async fn get_delivery(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(delivery_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = DeliveryService::new(state.db);
    Ok(Json(service.get_delivery(delivery_id).await?))
}

pub async fn review_delivery(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(delivery_id): Path<i64>,
    Json(input): Json<ReviewDeliveryInput>,
) -> AppResult<impl IntoResponse> {
    let service = DeliveryService::new(state.db);
    let review = service
        .review_delivery(user.0.user_id, delivery_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(delivery_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = DeliveryService::new(state.db);
    Ok(Json(service.list_reviews(delivery_id).await?))
}

/// Close a delivery and mark its devices delivered
pub async fn finalize_delivery(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(delivery_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = DeliveryService::new(state.db);
    Ok(Json(service.finalize_delivery(user.0.user_id, delivery_id).await?))
}

pub async fn list_packages(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(delivery_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = PackageService::new(state.db);
    Ok(Json(service.list_packages(delivery_id).await?))
}

pub async fn create_packages(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(delivery_id): Path<i64>,
    Json(input): Json<CreatePackagesInput>,
) -> AppResult<impl IntoResponse> {
    let service = PackageService::new(state.db);
    let packages = service
        .create_packages(
            user.0.user_id,
            delivery_id,
            input,
            state.config.inventory.max_batch_size,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(packages)))
}

pub async fn remove_package(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(package_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = PackageService::new(state.db);
    service.remove_package(package_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_assignments(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(package_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = PackageService::new(state.db);
    Ok(Json(service.list_assignments(package_id).await?))
}

pub async fn assign_device(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(package_id): Path<i64>,
    Json(input): Json<AssignDeviceInput>,
) -> AppResult<impl IntoResponse> {
    let service = PackageService::new(state.db);
    let assignment = service
        .assign_device(user.0.user_id, package_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn unassign_device(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path((package_id, triage)): Path<(i64, String)>,
) -> AppResult<impl IntoResponse> {
    let service = PackageService::new(state.db);
    service.unassign_device(package_id, &triage).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Quality-control approval of every device in a package
pub async fn approve_package(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(package_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = PackageService::new(state.db);
    Ok(Json(
        service.approve_package_batch(user.0.user_id, package_id).await?,
    ))
}

pub async fn accounting_approve(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(input): Json<AccountingInput>,
) -> AppResult<impl IntoResponse> {
    let service = PackageService::new(state.db);
    Ok(Json(service.accounting_approve(input).await?))
}

pub async fn accounting_reject(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(input): Json<AccountingInput>,
) -> AppResult<impl IntoResponse> {
    let service = PackageService::new(state.db);
    Ok(Json(service.accounting_reject(input).await?))
}
