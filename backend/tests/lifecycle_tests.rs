//! Lifecycle tests for the inventory server
//!
//! Movement requests, the stage/state table and the stage-change audit trail

use chrono::Utc;
use proptest::prelude::*;
use shared::{
    check_admissible, Device, DeviceKind, DeviceStage, DeviceState, DomainError, MovementRequest,
};
use uuid::Uuid;

fn request(kind: DeviceKind, from: DeviceStage, to: DeviceStage, quantity: i32) -> MovementRequest {
    MovementRequest {
        id: 7,
        source_stage: from,
        target_stage: to,
        device_type_id: 1,
        kind,
        quantity,
        requested_by: Uuid::new_v4(),
        authorized_by: None,
        applied_by: None,
        completed: false,
        rejected: false,
        created_on: Utc::now().date_naive(),
    }
}

fn devices(kind: DeviceKind, count: i32) -> Vec<Device> {
    (1..=count).map(|i| Device::new_intake(kind, i, 1, 1)).collect()
}

fn kind_strategy() -> impl Strategy<Value = DeviceKind> {
    prop::sample::select(DeviceKind::ALL.to_vec())
}

fn stage_strategy() -> impl Strategy<Value = DeviceStage> {
    prop::sample::select(DeviceStage::ALL.to_vec())
}

fn state_strategy() -> impl Strategy<Value = DeviceState> {
    prop::sample::select(DeviceState::ALL.to_vec())
}

// ============================================================================
// Movement scenario: 3 keyboards among 5 candidates
// ============================================================================

#[test]
fn test_movement_moves_only_requested_kind() {
    let actor = Uuid::new_v4();
    let mut req = request(DeviceKind::Keyboard, DeviceStage::Stored, DeviceStage::InTransit, 3);
    let mut candidates = devices(DeviceKind::Keyboard, 3);
    candidates.extend(devices(DeviceKind::Monitor, 2));

    let outcome = req.apply(&mut candidates, actor, Utc::now()).unwrap();

    assert_eq!(outcome.moved.len(), 3);
    assert_eq!(outcome.changes.len(), 3);
    assert_eq!(outcome.skipped, 2);
    assert!(req.completed);

    for device in &candidates {
        match device.kind {
            DeviceKind::Keyboard => assert_eq!(device.stage, DeviceStage::InTransit),
            _ => assert_eq!(device.stage, DeviceStage::Stored),
        }
    }
    for change in &outcome.changes {
        assert_eq!(change.stage_before, DeviceStage::Stored);
        assert_eq!(change.stage_after, DeviceStage::InTransit);
        assert_eq!(change.changed_by, actor);
        assert_eq!(change.request_id, req.id);
    }
}

#[test]
fn test_quantity_does_not_cap_the_batch() {
    let mut req = request(DeviceKind::Mouse, DeviceStage::Stored, DeviceStage::InTransit, 1);
    let mut candidates = devices(DeviceKind::Mouse, 4);

    let outcome = req.apply(&mut candidates, Uuid::nil(), Utc::now()).unwrap();
    assert_eq!(outcome.moved.len(), 4);
}

// ============================================================================
// Applying twice
// ============================================================================

#[test]
fn test_second_apply_fails_without_new_audit_rows() {
    let mut req = request(DeviceKind::Cpu, DeviceStage::Stored, DeviceStage::InTransit, 2);
    let mut candidates = devices(DeviceKind::Cpu, 2);

    let first = req.apply(&mut candidates, Uuid::nil(), Utc::now()).unwrap();
    assert_eq!(first.changes.len(), 2);

    let before: Vec<DeviceStage> = candidates.iter().map(|d| d.stage).collect();
    let second = req.apply(&mut candidates, Uuid::nil(), Utc::now());
    assert!(matches!(second, Err(DomainError::RequestAlreadyCompleted(7))));
    let after: Vec<DeviceStage> = candidates.iter().map(|d| d.stage).collect();
    assert_eq!(before, after);
}

#[test]
fn test_applier_is_recorded_apart_from_authorizer() {
    let mut req = request(DeviceKind::Monitor, DeviceStage::Stored, DeviceStage::InTransit, 1);
    let technician = Uuid::new_v4();
    let mut candidates = devices(DeviceKind::Monitor, 1);

    req.apply(&mut candidates, technician, Utc::now()).unwrap();
    assert_eq!(req.applied_by, Some(technician));
    assert_eq!(req.authorized_by, None);
}

#[test]
fn test_rejected_request_cannot_be_applied() {
    let mut req = request(DeviceKind::Hdd, DeviceStage::Stored, DeviceStage::InTransit, 1);
    let approver = Uuid::new_v4();
    req.reject(approver).unwrap();
    assert!(req.rejected && req.completed);
    assert_eq!(req.authorized_by, Some(approver));

    let mut candidates = devices(DeviceKind::Hdd, 1);
    assert!(req.apply(&mut candidates, approver, Utc::now()).is_err());
    assert_eq!(candidates[0].stage, DeviceStage::Stored);
    assert!(req.reject(approver).is_err());
}

// ============================================================================
// No-op transitions and inadmissible states
// ============================================================================

#[test]
fn test_no_audit_row_when_stage_is_unchanged() {
    let mut req = request(DeviceKind::Laptop, DeviceStage::Stored, DeviceStage::InTransit, 2);
    let mut candidates = devices(DeviceKind::Laptop, 2);
    candidates[0].stage = DeviceStage::InTransit;

    let outcome = req.apply(&mut candidates, Uuid::nil(), Utc::now()).unwrap();
    assert_eq!(outcome.moved.len(), 2);
    assert_eq!(outcome.changes.len(), 1);
    assert_eq!(outcome.changes[0].device_id, candidates[1].id);
}

#[test]
fn test_inadmissible_target_mutates_nothing() {
    let mut req = request(DeviceKind::Monitor, DeviceStage::InTransit, DeviceStage::QualityControl, 2);
    let mut candidates = devices(DeviceKind::Monitor, 2);
    candidates[0].state = DeviceState::Good;
    candidates[0].stage = DeviceStage::InTransit;
    candidates[1].stage = DeviceStage::InTransit;

    let result = req.apply(&mut candidates, Uuid::nil(), Utc::now());
    assert!(matches!(result, Err(DomainError::InadmissibleState { .. })));
    assert!(candidates.iter().all(|d| d.stage == DeviceStage::InTransit));
    assert!(!req.completed);
}

#[test]
fn test_admissibility_table() {
    use DeviceStage::*;
    use DeviceState::*;

    assert_eq!(Stored.admitted_states(), &[Pending, Good]);
    assert_eq!(InTransit.admitted_states(), &[Pending, Good]);
    assert_eq!(QualityControl.admitted_states(), &[Good]);
    assert_eq!(Ready.admitted_states(), &[Good]);
    assert_eq!(DeviceStage::Discarded.admitted_states(), &[DeviceState::Discarded]);
    assert_eq!(DeviceStage::Delivered.admitted_states(), &[DeviceState::Delivered]);
}

#[test]
fn test_delivery_requires_ready() {
    let mut device = Device::new_intake(DeviceKind::Tablet, 1, 1, 1);
    device.state = DeviceState::Good;
    device.stage = DeviceStage::QualityControl;
    assert!(device.deliver().is_err());

    device.stage = DeviceStage::Ready;
    device.deliver().unwrap();
    assert_eq!(device.stage, DeviceStage::Delivered);
    assert_eq!(device.state, DeviceState::Delivered);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every stage admits at least one state and the check agrees with the table
    #[test]
    fn property_admissibility_is_total(stage in stage_strategy(), state in state_strategy()) {
        prop_assert!(!stage.admitted_states().is_empty());
        let admitted = stage.admitted_states().contains(&state);
        prop_assert_eq!(check_admissible("X-1", stage, state).is_ok(), admitted);
    }

    /// Devices of another kind are never touched by a request
    #[test]
    fn property_other_kinds_are_skipped(
        requested in kind_strategy(),
        other in kind_strategy(),
        matching in 0i32..6,
        foreign in 0i32..6,
    ) {
        prop_assume!(requested != other);
        let mut req = request(requested, DeviceStage::Stored, DeviceStage::InTransit, 1);
        let mut candidates = devices(requested, matching);
        candidates.extend(devices(other, foreign));

        let outcome = req.apply(&mut candidates, Uuid::nil(), Utc::now()).unwrap();
        prop_assert_eq!(outcome.skipped, foreign as usize);
        prop_assert_eq!(outcome.changes.len(), matching as usize);
        for device in candidates.iter().filter(|d| d.kind == other) {
            prop_assert_eq!(device.stage, DeviceStage::Stored);
            prop_assert!(outcome.changes.iter().all(|c| c.device_id != device.id));
        }
    }

    /// Audit rows are written only for real stage changes
    #[test]
    fn property_audit_rows_only_for_changes(
        start in prop::collection::vec(prop::sample::select(vec![DeviceStage::Stored, DeviceStage::InTransit]), 0..10),
        target in prop::sample::select(vec![DeviceStage::Stored, DeviceStage::InTransit]),
    ) {
        let mut req = request(DeviceKind::Keyboard, DeviceStage::Stored, target, 1);
        let mut candidates = devices(DeviceKind::Keyboard, start.len() as i32);
        for (device, stage) in candidates.iter_mut().zip(&start) {
            device.stage = *stage;
        }

        let outcome = req.apply(&mut candidates, Uuid::nil(), Utc::now()).unwrap();
        let expected = start.iter().filter(|s| **s != target).count();
        prop_assert_eq!(outcome.changes.len(), expected);
        prop_assert!(outcome.changes.iter().all(|c| c.stage_before != c.stage_after));
    }
}
