//! Outbound deliveries, their packages and per-device approval

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::device::{check_admissible, Device, DeviceStage, DeviceState};
use crate::error::{DomainError, DomainResult};
use crate::validation::validate_quantity;

/// Outbound batch of packages, usually for a school
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: i64,
    pub delivery_type_id: i64,
    pub date: NaiveDate,
    pub school_code: Option<String>,
    /// False for outbound batches that are not school deliveries
    pub is_delivery: bool,
    pub in_creation: bool,
    pub needs_review: bool,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Bundle of devices within a delivery, typically one full computer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: i64,
    pub delivery_id: i64,
    /// Position within the delivery, unique per delivery
    pub index: i32,
    pub package_type_id: Option<i64>,
    pub approved: bool,
    pub approved_kardex: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Package {
    /// Display label, e.g. "P12-3"
    pub fn label(&self) -> String {
        format!("P{}-{}", self.delivery_id, self.index)
    }

    /// Accounting checked the package against the kardex
    pub fn approve_kardex(&mut self) {
        self.approved = true;
        self.approved_kardex = true;
    }

    /// Accounting found a kardex mismatch; the package approval itself stays
    pub fn reject_kardex(&mut self) {
        self.approved_kardex = false;
    }
}

/// Assignment of a device to a package, approved by quality control on its own
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageAssignment {
    pub id: i64,
    pub package_id: i64,
    pub device_id: Uuid,
    pub assigned_by: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub approved: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
}

impl PackageAssignment {
    pub fn approve(&mut self, actor: Uuid, at: DateTime<Utc>) {
        self.approved = true;
        self.approved_by = Some(actor);
        self.approved_at = Some(at);
    }

    pub fn revoke(&mut self) {
        self.approved = false;
    }
}

/// Review of a delivery before it leaves the warehouse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReview {
    pub id: i64,
    pub delivery_id: i64,
    pub reviewed_by: Uuid,
    pub reviewed_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub approved: bool,
}

/// Indices for `count` new packages after the highest index ever issued
pub fn next_package_indices(highest_issued: i32, count: i32) -> DomainResult<Vec<i32>> {
    validate_quantity(count as i64, 1)?;
    (1..=count)
        .map(|i| {
            highest_issued.checked_add(i).ok_or_else(|| {
                DomainError::validation("count", "No package indices are left for this delivery")
            })
        })
        .collect()
}

/// Packages and assignments of a delivery can change only while it is in creation
pub fn check_delivery_open(delivery_id: i64, in_creation: bool) -> DomainResult<()> {
    if !in_creation {
        return Err(DomainError::InvalidTransition(format!(
            "delivery {} is already closed",
            delivery_id
        )));
    }
    Ok(())
}

/// Approve every assignment of a package. Returns how many were approved.
pub fn approve_assignments(
    assignments: &mut [PackageAssignment],
    actor: Uuid,
    at: DateTime<Utc>,
) -> usize {
    for assignment in assignments.iter_mut() {
        assignment.approve(actor, at);
    }
    assignments.len()
}

/// Check a device can be placed in a package
pub fn check_assignable(device: &Device, already_assigned: bool) -> DomainResult<()> {
    if already_assigned {
        return Err(DomainError::InvalidTransition(format!(
            "device {} is already assigned to a package",
            device.triage
        )));
    }
    if !device.is_assignable() {
        return Err(DomainError::InvalidTransition(format!(
            "device {} is {} / {} and cannot be packaged",
            device.triage, device.stage, device.state
        )));
    }
    Ok(())
}

/// Result of an accounting decision, reported to the caller without failing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountingOutcome {
    pub status: AccountingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountingStatus {
    Approved,
    Rejected,
}

impl AccountingOutcome {
    pub fn approved() -> Self {
        Self {
            status: AccountingStatus::Approved,
            code: None,
            message: "The device has been approved".to_string(),
        }
    }

    pub fn package_approved() -> Self {
        Self {
            status: AccountingStatus::Approved,
            code: None,
            message: "The package has been approved".to_string(),
        }
    }

    pub fn rejected() -> Self {
        Self {
            status: AccountingStatus::Rejected,
            code: None,
            message: "The device has been rejected".to_string(),
        }
    }

    pub fn package_rejected() -> Self {
        Self {
            status: AccountingStatus::Rejected,
            code: None,
            message: "The package has been rejected".to_string(),
        }
    }

    /// Soft outcome when the device is not part of the delivery (code 1)
    pub fn not_in_delivery() -> Self {
        Self {
            status: AccountingStatus::Rejected,
            code: Some(1),
            message: "The device does not belong to this delivery".to_string(),
        }
    }
}

/// Accounting approval of a single device: it passes quality control and becomes Ready
pub fn accounting_approve_device(device: &mut Device) -> DomainResult<DeviceStage> {
    device.move_to_stage(DeviceStage::Ready)
}

/// Accounting rejection of a single device: back to rework, assignment unapproved.
///
/// The device stays in its package. When the current stage does not admit a
/// pending device, it is returned to InTransit.
pub fn accounting_reject_device(device: &mut Device, assignment: &mut PackageAssignment) {
    device.state = DeviceState::Pending;
    if !device.stage.admits(DeviceState::Pending) {
        device.stage = DeviceStage::InTransit;
    }
    assignment.revoke();
}

/// Check a delivery may be closed and its devices handed over
pub fn check_finalizable(
    delivery: &Delivery,
    packages: &[Package],
    assignments: &[PackageAssignment],
    devices: &[Device],
) -> DomainResult<()> {
    if !delivery.in_creation {
        return Err(DomainError::InvalidTransition(format!(
            "delivery {} is already closed",
            delivery.id
        )));
    }
    if delivery.needs_review {
        return Err(DomainError::InvalidTransition(format!(
            "delivery {} still needs review",
            delivery.id
        )));
    }
    if packages.is_empty() {
        return Err(DomainError::InvalidTransition(format!(
            "delivery {} has no packages",
            delivery.id
        )));
    }
    if let Some(package) = packages.iter().find(|p| !p.approved) {
        return Err(DomainError::InvalidTransition(format!(
            "package {} is not approved",
            package.label()
        )));
    }
    if assignments.iter().any(|a| !a.approved) {
        return Err(DomainError::InvalidTransition(
            "some packaged devices are not approved".to_string(),
        ));
    }
    for device in devices {
        if device.stage != DeviceStage::Ready {
            return Err(DomainError::InvalidTransition(format!(
                "device {} is {} instead of Ready",
                device.triage, device.stage
            )));
        }
        check_admissible(&device.triage, DeviceStage::Ready, device.state)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeviceKind;

    fn assignment(id: i64, device_id: Uuid) -> PackageAssignment {
        PackageAssignment {
            id,
            package_id: 1,
            device_id,
            assigned_by: Uuid::nil(),
            assigned_at: Utc::now(),
            approved: false,
            approved_at: None,
            approved_by: None,
        }
    }

    fn good_device(kind: DeviceKind, stage: DeviceStage) -> Device {
        let mut device = Device::new_intake(kind, 1, 1, 1);
        device.state = DeviceState::Good;
        device.stage = stage;
        device
    }

    #[test]
    fn test_next_package_indices_continue_sequence() {
        assert_eq!(next_package_indices(0, 3).unwrap(), vec![1, 2, 3]);
        assert_eq!(next_package_indices(5, 2).unwrap(), vec![6, 7]);
        assert!(next_package_indices(5, 0).is_err());
    }

    #[test]
    fn test_approve_assignments() {
        let actor = Uuid::new_v4();
        let mut rows = vec![assignment(1, Uuid::new_v4()), assignment(2, Uuid::new_v4())];
        assert_eq!(approve_assignments(&mut rows, actor, Utc::now()), 2);
        assert!(rows.iter().all(|a| a.approved && a.approved_by == Some(actor)));
    }

    #[test]
    fn test_accounting_approve_requires_good_device() {
        let mut device = Device::new_intake(DeviceKind::Monitor, 1, 1, 1);
        device.stage = DeviceStage::QualityControl;
        assert!(accounting_approve_device(&mut device).is_err());

        device.state = DeviceState::Good;
        accounting_approve_device(&mut device).unwrap();
        assert_eq!(device.stage, DeviceStage::Ready);
    }

    #[test]
    fn test_accounting_reject_returns_device_to_rework() {
        let mut device = good_device(DeviceKind::Cpu, DeviceStage::Ready);
        let mut row = assignment(1, device.id);
        row.approve(Uuid::nil(), Utc::now());

        accounting_reject_device(&mut device, &mut row);
        assert_eq!(device.state, DeviceState::Pending);
        assert_eq!(device.stage, DeviceStage::InTransit);
        assert!(!row.approved);
    }

    #[test]
    fn test_already_assigned_device_is_refused() {
        let device = good_device(DeviceKind::Mouse, DeviceStage::InTransit);
        assert!(check_assignable(&device, false).is_ok());
        assert!(check_assignable(&device, true).is_err());

        let stored = Device::new_intake(DeviceKind::Mouse, 2, 1, 1);
        assert!(check_assignable(&stored, false).is_err());
    }

    #[test]
    fn test_not_in_delivery_is_code_one() {
        let outcome = AccountingOutcome::not_in_delivery();
        assert_eq!(outcome.code, Some(1));
        assert_eq!(outcome.status, AccountingStatus::Rejected);
    }
}
