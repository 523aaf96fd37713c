//! Domain errors raised by the inventory rules

use thiserror::Error;
use uuid::Uuid;

use crate::models::{DeviceStage, DeviceState};

/// Errors produced by domain rules, independent of storage or transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("No device specialization declares the slug '{0}'")]
    UnknownDeviceType(String),

    #[error("Device type slug '{slug}' is not registered; options are: {options}")]
    InvalidCatalogEntry { slug: String, options: String },

    #[error("The intake type requires a subtotal price")]
    PricingRequired,

    #[error("Movement request {0} was already completed")]
    RequestAlreadyCompleted(i64),

    #[error("Stage {stage} does not admit state {state} (device {triage})")]
    InadmissibleState {
        triage: String,
        stage: DeviceStage,
        state: DeviceState,
    },

    #[error("Quantity must be at least {min}, got {got}")]
    InvalidQuantity { min: i64, got: i64 },

    #[error("User {user_id} is not assigned to device type {device_type_id}")]
    TechnicianNotAssigned { user_id: Uuid, device_type_id: i64 },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("{field}: {message}")]
    Validation { field: String, message: String },
}

impl DomainError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
