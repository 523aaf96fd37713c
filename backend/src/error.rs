//! Error handling for the inventory server
//!
//! Provides consistent error responses in Spanish and English

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::DomainError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_es: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_es: String,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Catalog errors
    #[error("Unknown device type: {0}")]
    UnknownDeviceType(String),

    #[error("Invalid catalog entry: {slug}")]
    InvalidCatalogEntry { slug: String, options: String },

    #[error("Pricing required")]
    PricingRequired,

    // Lifecycle errors
    #[error("Movement request {0} already completed")]
    RequestAlreadyCompleted(i64),

    #[error("Inadmissible state: {0}")]
    InadmissibleState(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or("record").to_string();
                return AppError::DuplicateEntry(constraint);
            }
        }
        AppError::DatabaseError(err)
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::UnknownDeviceType(slug) => AppError::UnknownDeviceType(slug),
            DomainError::InvalidCatalogEntry { slug, options } => {
                AppError::InvalidCatalogEntry { slug, options }
            }
            DomainError::PricingRequired => AppError::PricingRequired,
            DomainError::RequestAlreadyCompleted(id) => AppError::RequestAlreadyCompleted(id),
            e @ DomainError::InadmissibleState { .. } => AppError::InadmissibleState(e.to_string()),
            e @ DomainError::InvalidQuantity { .. } => AppError::Validation {
                field: "quantity".to_string(),
                message: e.to_string(),
                message_es: "La cantidad no es válida".to_string(),
            },
            e @ DomainError::TechnicianNotAssigned { .. } => AppError::Forbidden(e.to_string()),
            DomainError::InvalidTransition(msg) => AppError::InvalidStateTransition(msg),
            DomainError::Validation { field, message } => AppError::Validation {
                message_es: format!("Dato no válido: {}", field),
                field,
                message,
            },
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::ValidationError(errors.to_string())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Validation { field, message, message_es } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_es: message_es.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_es: format!("Datos no válidos: {}", msg),
                    field: None,
                },
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "DUPLICATE_ENTRY".to_string(),
                    message_en: format!("A record with this {} already exists", field),
                    message_es: format!("Ya existe un registro con este {}", field),
                    field: Some(field.clone()),
                },
            ),
            AppError::Conflict { resource, message, message_es } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "CONFLICT".to_string(),
                    message_en: message.clone(),
                    message_es: message_es.clone(),
                    field: Some(resource.clone()),
                },
            ),
            AppError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                ErrorDetail {
                    code: "FORBIDDEN".to_string(),
                    message_en: msg.clone(),
                    message_es: "El técnico no tiene asignado este tipo de dispositivo".to_string(),
                    field: None,
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_es: format!("No se encontró {}", resource),
                    field: None,
                },
            ),
            AppError::UnknownDeviceType(slug) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "UNKNOWN_DEVICE_TYPE".to_string(),
                    message_en: format!("No device specialization declares the slug '{}'", slug),
                    message_es: format!("Ningún tipo de dispositivo usa el slug '{}'", slug),
                    field: Some("slug".to_string()),
                },
            ),
            AppError::InvalidCatalogEntry { slug, options } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "INVALID_CATALOG_ENTRY".to_string(),
                    message_en: format!(
                        "Slug '{}' is not registered for triage; options are: {}",
                        slug, options
                    ),
                    message_es: format!(
                        "El slug '{}' no está registrado para triage; opciones: {}",
                        slug, options
                    ),
                    field: Some("slug".to_string()),
                },
            ),
            AppError::PricingRequired => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "PRICING_REQUIRED".to_string(),
                    message_en: "This intake type requires a subtotal price".to_string(),
                    message_es: "Este tipo de entrada requiere un precio subtotal".to_string(),
                    field: Some("subtotal".to_string()),
                },
            ),
            AppError::RequestAlreadyCompleted(id) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "REQUEST_ALREADY_COMPLETED".to_string(),
                    message_en: format!("Movement request {} was already completed", id),
                    message_es: format!("La solicitud de movimiento {} ya fue terminada", id),
                    field: None,
                },
            ),
            AppError::InadmissibleState(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INADMISSIBLE_STATE".to_string(),
                    message_en: msg.clone(),
                    message_es: format!("Estado no admitido por la etapa: {}", msg),
                    field: None,
                },
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INVALID_STATE_TRANSITION".to_string(),
                    message_en: msg.clone(),
                    message_es: format!("No se puede cambiar el estado: {}", msg),
                    field: None,
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message_en: "A database error occurred".to_string(),
                    message_es: "Ocurrió un error en la base de datos".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_es: "Error interno del servidor".to_string(),
                    field: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: "An internal server error occurred".to_string(),
                    message_es: "Error interno del servidor".to_string(),
                    field: None,
                },
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
