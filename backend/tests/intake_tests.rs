//! Intake ledger tests for the inventory server
//!
//! Pricing rules, discount allocation and device materialization

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    allocate_discount, intake_totals, parse_triage, price_details, resolve_specialization,
    unit_price, Device, DeviceKind, DeviceStage, DeviceState, DomainError, IntakeDetail,
    IntakeDiscount, MaterializeReport, NewIntakeDetail, MAX_DETAIL_QUANTITY,
};
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;

/// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn new_detail(usable: i32, for_parts: i32, scrap: i32, subtotal: Option<&str>) -> NewIntakeDetail {
    NewIntakeDetail {
        device_type_id: 1,
        usable,
        for_parts,
        scrap,
        subtotal: subtotal.map(dec),
    }
}

fn stored_detail(id: i64, total: i32, subtotal: Option<Decimal>) -> IntakeDetail {
    IntakeDetail {
        id,
        intake_id: 1,
        device_type_id: 1,
        usable: total,
        for_parts: 0,
        scrap: 0,
        total,
        unit_price: None,
        subtotal,
        discounted_unit_price: None,
        total_price: None,
        created_by: Uuid::nil(),
    }
}

fn discount(amount: &str) -> IntakeDiscount {
    IntakeDiscount {
        id: 1,
        intake_id: 1,
        amount: dec(amount),
        description: None,
    }
}

// ============================================================================
// Priced intakes
// ============================================================================

#[test]
fn test_priced_detail_requires_subtotal() {
    let missing = new_detail(3, 1, 0, None);
    assert!(matches!(missing.validate(true), Err(DomainError::PricingRequired)));

    let priced = new_detail(3, 1, 0, Some("400.00"));
    assert!(priced.validate(true).is_ok());
}

#[test]
fn test_zero_subtotal_counts_as_missing() {
    let zero = new_detail(2, 0, 0, Some("0"));
    assert!(matches!(zero.validate(true), Err(DomainError::PricingRequired)));
    assert!(zero.validate(false).is_ok());
}

#[test]
fn test_unpriced_detail_needs_no_subtotal() {
    assert!(new_detail(5, 0, 0, None).validate(false).is_ok());
}

#[test]
fn test_detail_total_and_quantities() {
    let detail = new_detail(3, 2, 1, None);
    assert_eq!(detail.total().unwrap(), 6);

    assert!(new_detail(0, 0, 0, None).validate(false).is_err());
    assert!(new_detail(-1, 2, 0, None).validate(false).is_err());
}

#[test]
fn test_oversized_quantities_are_refused() {
    let huge = new_detail(i32::MAX, 1, 0, None);
    assert!(matches!(huge.total(), Err(DomainError::Validation { .. })));
    assert!(matches!(huge.validate(false), Err(DomainError::Validation { .. })));

    let at_limit = new_detail(MAX_DETAIL_QUANTITY, MAX_DETAIL_QUANTITY, MAX_DETAIL_QUANTITY, None);
    assert!(at_limit.validate(false).is_ok());
    assert_eq!(at_limit.total().unwrap(), 3 * MAX_DETAIL_QUANTITY);

    let over = new_detail(MAX_DETAIL_QUANTITY + 1, 0, 0, None);
    assert!(matches!(
        over.validate(false),
        Err(DomainError::Validation { field, .. }) if field == "usable"
    ));
}

// ============================================================================
// Pricing and discounts
// ============================================================================

#[test]
fn test_unit_price_rounds_to_cents() {
    assert_eq!(unit_price(dec("100"), 3), dec("33.33"));
    assert_eq!(unit_price(dec("100"), 0), Decimal::ZERO);
}

#[test]
fn test_price_details_with_discount() {
    let mut details = vec![
        stored_detail(1, 4, Some(dec("300"))),
        stored_detail(2, 2, Some(dec("100"))),
        stored_detail(3, 1, None),
    ];
    let discounts = vec![discount("40")];

    price_details(&mut details, &discounts);

    assert_eq!(details[0].unit_price, Some(dec("75")));
    assert_eq!(details[0].discounted_unit_price, Some(dec("67.50")));
    assert_eq!(details[0].total_price, Some(dec("270.00")));
    assert_eq!(details[1].discounted_unit_price, Some(dec("45.00")));
    assert_eq!(details[2].total_price, None);

    let totals = intake_totals(&details, &discounts);
    assert_eq!(totals.subtotal, dec("400"));
    assert_eq!(totals.discounted, dec("360"));
    assert_eq!(totals.total, dec("360.00"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Discount shares always add up to the discount
    #[test]
    fn property_discount_allocation_sums_exactly(
        cents in prop::collection::vec(prop::option::of(1i64..1_000_000), 1..8),
        discount_cents in 0i64..100_000,
    ) {
        let subtotals: Vec<Option<Decimal>> = cents.iter().map(|c| c.map(|c| Decimal::new(c, 2))).collect();
        let discount = Decimal::new(discount_cents, 2);
        let shares = allocate_discount(&subtotals, discount);

        prop_assert_eq!(shares.len(), subtotals.len());
        for (share, subtotal) in shares.iter().zip(&subtotals) {
            if subtotal.is_none() {
                prop_assert_eq!(*share, Decimal::ZERO);
            }
        }
        let total: Decimal = shares.iter().sum();
        if subtotals.iter().any(Option::is_some) {
            prop_assert_eq!(total, discount);
        } else {
            prop_assert_eq!(total, Decimal::ZERO);
        }
    }
}

// ============================================================================
// Materialization
// ============================================================================

#[test]
fn test_new_intake_keyboards_start_stored_and_pending() {
    let detail = new_detail(5, 0, 0, None);
    assert!(detail.validate(false).is_ok());

    let kind = resolve_specialization("T").unwrap();
    assert_eq!(kind, DeviceKind::Keyboard);

    let mut report = MaterializeReport::default();
    let devices: Vec<Device> = (1..=detail.usable)
        .map(|indice| {
            let device = Device::new_intake(kind, indice, 1, 1);
            report.record(device.is_consistent());
            device
        })
        .collect();

    assert_eq!(report, MaterializeReport { created: 5, failed: 0 });
    assert!(devices
        .iter()
        .all(|d| d.stage == DeviceStage::Stored && d.state == DeviceState::Pending));

    let triages: HashSet<&str> = devices.iter().map(|d| d.triage.as_str()).collect();
    assert_eq!(triages.len(), 5);

    let indices: Vec<i32> = devices.iter().map(|d| d.indice).collect();
    assert_eq!(indices, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_report_counts_failures_and_continues() {
    let mut report = MaterializeReport::default();
    for ok in [true, false, true, true, false] {
        report.record(ok);
    }
    assert_eq!(report.created, 3);
    assert_eq!(report.failed, 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Triage codes identify kind and indice
    #[test]
    fn property_triage_code_identifies_device(
        kind in prop::sample::select(DeviceKind::ALL.to_vec()),
        indice in 1i32..100_000,
    ) {
        let device = Device::new_intake(kind, indice, 1, 1);
        prop_assert!(device.triage.starts_with(kind.slug()));
        prop_assert_eq!(parse_triage(&device.triage), Some((kind, indice)));
        prop_assert!(device.is_consistent());
    }
}
