//! Scrap disposal: discarded equipment handed over to a recycling company

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::device::{Device, DeviceStage};
use super::intake::IntakeDetail;
use crate::error::{DomainError, DomainResult};
use crate::validation::validate_amount;

/// Company that collects scrap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapCompany {
    pub id: i64,
    pub name: String,
}

/// One hand-over of scrap to a company
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapDisposal {
    pub id: i64,
    pub date: NaiveDate,
    pub company_id: i64,
    pub total_price: Decimal,
    /// Weight in pounds
    pub weight: Decimal,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub in_creation: bool,
}

/// Quantity of one device type in a disposal, optionally traced to an intake detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapDetail {
    pub id: i64,
    pub disposal_id: i64,
    pub intake_detail_id: Option<i64>,
    pub device_type_id: i64,
    pub quantity: Decimal,
}

/// A discarded device that left with a disposal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrappedDevice {
    pub disposal_id: i64,
    pub device_id: Uuid,
    pub triage: String,
    pub added_by: Uuid,
    pub added_at: DateTime<Utc>,
}

impl ScrapDisposal {
    pub fn ensure_open(&self) -> DomainResult<()> {
        if !self.in_creation {
            return Err(DomainError::InvalidTransition(format!(
                "scrap disposal {} is already closed",
                self.id
            )));
        }
        Ok(())
    }

    /// Close the disposal; it must carry at least one detail or device
    pub fn close(&mut self, details: usize, devices: usize) -> DomainResult<()> {
        self.ensure_open()?;
        if details == 0 && devices == 0 {
            return Err(DomainError::InvalidTransition(format!(
                "scrap disposal {} is empty",
                self.id
            )));
        }
        self.in_creation = false;
        Ok(())
    }
}

/// Validate the money and weight of a disposal
pub fn validate_disposal_amounts(total_price: Decimal, weight: Decimal) -> DomainResult<()> {
    validate_amount("total_price", total_price, 12)?;
    validate_amount("weight", weight, 12)
}

/// Validate a scrap detail, checking that a traced intake detail has the same device type
pub fn check_scrap_detail(
    device_type_id: i64,
    quantity: Decimal,
    intake_detail: Option<&IntakeDetail>,
) -> DomainResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(DomainError::validation("quantity", "Quantity must be positive"));
    }
    validate_amount("quantity", quantity, 12)?;
    if let Some(detail) = intake_detail {
        if detail.device_type_id != device_type_id {
            return Err(DomainError::validation(
                "intake_detail_id",
                format!(
                    "Intake detail {} is of device type {}, not {}",
                    detail.id, detail.device_type_id, device_type_id
                ),
            ));
        }
    }
    Ok(())
}

/// Only valid devices in the Discarded stage may leave as scrap
pub fn check_scrappable(device: &Device) -> DomainResult<()> {
    if !device.valid || device.stage != DeviceStage::Discarded {
        return Err(DomainError::InvalidTransition(format!(
            "device {} is {} and cannot be scrapped",
            device.triage, device.stage
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceKind, DeviceState};

    fn disposal() -> ScrapDisposal {
        ScrapDisposal {
            id: 3,
            date: Utc::now().date_naive(),
            company_id: 1,
            total_price: Decimal::ZERO,
            weight: Decimal::new(1205, 1),
            notes: None,
            created_by: Uuid::nil(),
            in_creation: true,
        }
    }

    #[test]
    fn test_close_requires_content() {
        let mut d = disposal();
        assert!(d.close(0, 0).is_err());
        assert!(d.in_creation);

        d.close(1, 0).unwrap();
        assert!(!d.in_creation);
        assert!(d.ensure_open().is_err());
        assert!(d.close(1, 0).is_err());
    }

    #[test]
    fn test_only_discarded_devices_are_scrappable() {
        let mut device = Device::new_intake(DeviceKind::Monitor, 1, 1, 1);
        assert!(check_scrappable(&device).is_err());

        device.stage = DeviceStage::Discarded;
        device.state = DeviceState::Discarded;
        assert!(check_scrappable(&device).is_ok());

        device.valid = false;
        assert!(check_scrappable(&device).is_err());
    }

    #[test]
    fn test_scrap_detail_quantity() {
        assert!(check_scrap_detail(1, Decimal::new(25, 1), None).is_ok());
        assert!(check_scrap_detail(1, Decimal::ZERO, None).is_err());
        assert!(check_scrap_detail(1, Decimal::new(-1, 0), None).is_err());
    }

    #[test]
    fn test_scrap_detail_follows_intake_device_type() {
        let detail = IntakeDetail {
            id: 8,
            intake_id: 2,
            device_type_id: 4,
            usable: 0,
            for_parts: 0,
            scrap: 6,
            total: 6,
            unit_price: None,
            subtotal: None,
            discounted_unit_price: None,
            total_price: None,
            created_by: Uuid::nil(),
        };
        assert!(check_scrap_detail(4, Decimal::new(6, 0), Some(&detail)).is_ok());
        match check_scrap_detail(5, Decimal::new(6, 0), Some(&detail)) {
            Err(DomainError::Validation { field, .. }) => assert_eq!(field, "intake_detail_id"),
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_disposal_amounts_are_non_negative() {
        assert!(validate_disposal_amounts(Decimal::new(1500, 2), Decimal::new(42, 0)).is_ok());
        assert!(validate_disposal_amounts(Decimal::new(-1, 0), Decimal::ZERO).is_err());
        assert!(validate_disposal_amounts(Decimal::ZERO, Decimal::new(-5, 1)).is_err());
    }
}
