//! Movement requests and the stage-change audit trail

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::device::{check_admissible, Device, DeviceKind, DeviceStage};
use crate::error::{DomainError, DomainResult};
use crate::validation::validate_quantity;

/// A technician's request to move a batch of devices of one type between stages.
///
/// Example: move 5 monitors from Stored to InTransit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementRequest {
    pub id: i64,
    pub source_stage: DeviceStage,
    pub target_stage: DeviceStage,
    pub device_type_id: i64,
    pub kind: DeviceKind,
    pub quantity: i32,
    pub requested_by: Uuid,
    pub authorized_by: Option<Uuid>,
    /// User who carried the movement out
    pub applied_by: Option<Uuid>,
    pub completed: bool,
    pub rejected: bool,
    pub created_on: NaiveDate,
}

/// One device actually moved by a request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageChange {
    pub request_id: i64,
    pub device_id: Uuid,
    pub stage_before: DeviceStage,
    pub stage_after: DeviceStage,
    pub changed_at: DateTime<Utc>,
    pub changed_by: Uuid,
}

/// What applying a request did
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementOutcome {
    /// Devices of the requested type, whose stage is now the target stage
    pub moved: Vec<Uuid>,
    /// Audit rows to persist, one per device whose stage actually changed
    pub changes: Vec<StageChange>,
    /// Candidates ignored because they are of another type
    pub skipped: usize,
}

/// Validate the fields of a new movement request
pub fn validate_new_request(quantity: i32) -> DomainResult<()> {
    validate_quantity(quantity as i64, 1)
}

impl MovementRequest {
    /// Move every candidate of the requested type to the target stage and close the request.
    ///
    /// Candidates of another type are left untouched. If any matching device holds a
    /// state the target stage does not admit, nothing is changed. An audit row is
    /// produced only for devices whose stage differs from the target.
    pub fn apply(
        &mut self,
        devices: &mut [Device],
        actor: Uuid,
        at: DateTime<Utc>,
    ) -> DomainResult<MovementOutcome> {
        if self.completed {
            return Err(DomainError::RequestAlreadyCompleted(self.id));
        }

        for device in devices.iter().filter(|d| d.kind == self.kind) {
            check_admissible(&device.triage, self.target_stage, device.state)?;
        }

        let mut outcome = MovementOutcome::default();
        for device in devices.iter_mut() {
            if device.kind != self.kind {
                outcome.skipped += 1;
                continue;
            }
            let before = device.stage;
            device.stage = self.target_stage;
            outcome.moved.push(device.id);
            if before != self.target_stage {
                outcome.changes.push(StageChange {
                    request_id: self.id,
                    device_id: device.id,
                    stage_before: before,
                    stage_after: self.target_stage,
                    changed_at: at,
                    changed_by: actor,
                });
            }
        }

        self.completed = true;
        self.applied_by = Some(actor);
        Ok(outcome)
    }

    /// Turn the request down without moving anything
    pub fn reject(&mut self, actor: Uuid) -> DomainResult<()> {
        if self.completed {
            return Err(DomainError::RequestAlreadyCompleted(self.id));
        }
        self.rejected = true;
        self.completed = true;
        self.authorized_by = Some(actor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeviceState;

    fn request(kind: DeviceKind, from: DeviceStage, to: DeviceStage) -> MovementRequest {
        MovementRequest {
            id: 1,
            source_stage: from,
            target_stage: to,
            device_type_id: 1,
            kind,
            quantity: 3,
            requested_by: Uuid::nil(),
            authorized_by: None,
            applied_by: None,
            completed: false,
            rejected: false,
            created_on: Utc::now().date_naive(),
        }
    }

    #[test]
    fn test_apply_moves_matching_devices() {
        let mut req = request(DeviceKind::Keyboard, DeviceStage::Stored, DeviceStage::InTransit);
        let mut devices: Vec<Device> = (1..=3)
            .map(|i| Device::new_intake(DeviceKind::Keyboard, i, 1, 1))
            .chain((1..=2).map(|i| Device::new_intake(DeviceKind::Monitor, i, 2, 1)))
            .collect();

        let actor = Uuid::new_v4();
        let outcome = req.apply(&mut devices, actor, Utc::now()).unwrap();

        assert_eq!(outcome.moved.len(), 3);
        assert_eq!(req.applied_by, Some(actor));
        assert_eq!(req.authorized_by, None);
        assert_eq!(outcome.changes.len(), 3);
        assert_eq!(outcome.skipped, 2);
        assert!(req.completed);
        for device in &devices {
            match device.kind {
                DeviceKind::Keyboard => assert_eq!(device.stage, DeviceStage::InTransit),
                _ => assert_eq!(device.stage, DeviceStage::Stored),
            }
        }
    }

    #[test]
    fn test_apply_twice_fails() {
        let mut req = request(DeviceKind::Mouse, DeviceStage::Stored, DeviceStage::InTransit);
        let mut devices = vec![Device::new_intake(DeviceKind::Mouse, 1, 1, 1)];
        req.apply(&mut devices, Uuid::nil(), Utc::now()).unwrap();

        let err = req.apply(&mut devices, Uuid::nil(), Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::RequestAlreadyCompleted(1));
    }

    #[test]
    fn test_no_audit_for_noop_move() {
        let mut req = request(DeviceKind::Mouse, DeviceStage::Stored, DeviceStage::InTransit);
        let mut devices = vec![
            Device::new_intake(DeviceKind::Mouse, 1, 1, 1),
            Device::new_intake(DeviceKind::Mouse, 2, 1, 1),
        ];
        devices[1].stage = DeviceStage::InTransit;

        let outcome = req.apply(&mut devices, Uuid::nil(), Utc::now()).unwrap();
        assert_eq!(outcome.moved.len(), 2);
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(outcome.changes[0].device_id, devices[0].id);
    }

    #[test]
    fn test_inadmissible_state_changes_nothing() {
        let mut req = request(DeviceKind::Cpu, DeviceStage::InTransit, DeviceStage::QualityControl);
        let mut devices = vec![
            Device::new_intake(DeviceKind::Cpu, 1, 1, 1),
            Device::new_intake(DeviceKind::Cpu, 2, 1, 1),
        ];
        devices[0].state = DeviceState::Good;
        devices[0].stage = DeviceStage::InTransit;
        devices[1].stage = DeviceStage::InTransit;

        let err = req.apply(&mut devices, Uuid::nil(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::InadmissibleState { .. }));
        assert!(!req.completed);
        assert!(devices.iter().all(|d| d.stage == DeviceStage::InTransit));
    }

    #[test]
    fn test_reject_closes_request() {
        let actor = Uuid::new_v4();
        let mut req = request(DeviceKind::Cpu, DeviceStage::Stored, DeviceStage::InTransit);
        req.reject(actor).unwrap();
        assert!(req.completed && req.rejected);
        assert_eq!(req.authorized_by, Some(actor));
        assert!(req.reject(actor).is_err());
    }

    #[test]
    fn test_quantity_must_be_positive() {
        assert!(validate_new_request(0).is_err());
        assert!(validate_new_request(1).is_ok());
    }
}
