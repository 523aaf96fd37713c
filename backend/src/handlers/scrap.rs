//! HTTP handlers for scrap companies and disposals

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    error::AppResult,
    middleware::CurrentUser,
    services::scrap::{
        AddScrapDetailInput, AddScrappedDeviceInput, CreateCompanyInput, CreateDisposalInput,
        ScrapService,
    },
    AppState,
};

pub async fn list_scrap_companies(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<impl IntoResponse> {
    let service = ScrapService::new(state.db);
    Ok(Json(service.list_companies().await?))
}

pub async fn create_scrap_company(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(input): Json<CreateCompanyInput>,
) -> AppResult<impl IntoResponse> {
    let service = ScrapService::new(state.db);
    let company = service.create_company(input).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

pub async fn list_disposals(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<impl IntoResponse> {
    let service = ScrapService::new(state.db);
    Ok(Json(service.list_disposals().await?))
}

pub async fn create_disposal(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<CreateDisposalInput>,
) -> AppResult<impl IntoResponse> {
    let service = ScrapService::new(state.db);
    let disposal = service.create_disposal(user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(disposal)))
}

/// Disposal with its detail lines and devices
pub async fn get_disposal(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(disposal_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = ScrapService::new(state.db);
    Ok(Json(service.get_disposal(disposal_id).await?))
}

pub async fn add_scrap_detail(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(disposal_id): Path<i64>,
    Json(input): Json<AddScrapDetailInput>,
) -> AppResult<impl IntoResponse> {
    let service = ScrapService::new(state.db);
    let detail = service.add_detail(disposal_id, input).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn add_scrapped_device(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(disposal_id): Path<i64>,
    Json(input): Json<AddScrappedDeviceInput>,
) -> AppResult<impl IntoResponse> {
    let service = ScrapService::new(state.db);
    let device = service
        .add_device(user.0.user_id, disposal_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(device)))
}

pub async fn close_disposal(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(disposal_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = ScrapService::new(state.db);
    Ok(Json(service.close_disposal(disposal_id).await?))
}
