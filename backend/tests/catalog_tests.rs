//! Catalog tests for the inventory server
//!
//! Device type registry, save-time catalog checks and grid partial updates

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    registered_slugs, resolve_specialization, validate_device_type, CatalogKind, Device,
    DeviceKind, DevicePatch, DeviceSpecs, DeviceType, DomainError,
};
use std::collections::HashSet;

// ============================================================================
// Specialization registry
// ============================================================================

#[test]
fn test_every_kind_has_a_distinct_slug() {
    let slugs = registered_slugs();
    assert_eq!(slugs.len(), DeviceKind::ALL.len());
    assert_eq!(slugs.iter().collect::<HashSet<_>>().len(), slugs.len());

    for kind in DeviceKind::ALL {
        assert_eq!(resolve_specialization(kind.slug()).unwrap(), kind);
        assert_eq!(DeviceSpecs::empty(kind).kind(), kind);
    }
}

#[test]
fn test_unknown_slug_is_rejected() {
    assert!(matches!(
        resolve_specialization("PRN"),
        Err(DomainError::UnknownDeviceType(slug)) if slug == "PRN"
    ));
    assert!(resolve_specialization("t").is_err());
}

// ============================================================================
// Device type save checks
// ============================================================================

#[test]
fn test_triaged_type_needs_registered_slug() {
    assert!(validate_device_type("Monitor", "M", true).is_ok());

    match validate_device_type("Printer", "PRN", true) {
        Err(DomainError::InvalidCatalogEntry { slug, options }) => {
            assert_eq!(slug, "PRN");
            assert!(options.contains("CPU"));
        }
        other => panic!("expected InvalidCatalogEntry, got {:?}", other),
    }

    // Untriaged types may use any well-formed slug
    assert!(validate_device_type("Cable", "CBL", false).is_ok());
    assert!(validate_device_type("Cable", "", false).is_err());
}

#[test]
fn test_device_type_kind() {
    let laptop = DeviceType {
        id: 1,
        name: "Laptop".to_string(),
        slug: "L".to_string(),
        uses_triage: true,
    };
    assert!(laptop.validate().is_ok());
    assert_eq!(laptop.kind().unwrap(), DeviceKind::Laptop);
}

#[test]
fn test_catalog_kinds_round_trip_names() {
    let tables: HashSet<&str> = CatalogKind::ALL.iter().map(|k| k.table()).collect();
    assert_eq!(tables.len(), CatalogKind::ALL.len());

    for kind in CatalogKind::ALL {
        assert_eq!(CatalogKind::from_str(kind.as_str()), Some(kind));
        assert!(kind.validate_name("x").is_ok());
        assert!(kind.validate_name(&"x".repeat(kind.max_name_len() + 1)).is_err());
    }
    assert_eq!(CatalogKind::from_str("planets"), None);
}

// ============================================================================
// Grid partial update
// ============================================================================

fn monitor() -> Device {
    let mut device = Device::new_intake(DeviceKind::Monitor, 4, 1, 1);
    device.brand_id = Some(3);
    device.serial = Some("SN-1".to_string());
    device.specs = DeviceSpecs::Monitor {
        monitor_type_id: Some(2),
        port_id: Some(5),
        inches: Some(Decimal::new(215, 1)),
    };
    device
}

#[test]
fn test_patch_applies_only_present_fields() {
    let mut device = monitor();
    let patch = DevicePatch {
        triage: device.triage.clone(),
        model_id: Some(9),
        port_id: Some(6),
        ..Default::default()
    };

    let fields = patch.apply(&mut device).unwrap();
    assert_eq!(fields.len(), 2);
    assert!(fields.contains(&"model_id") && fields.contains(&"port_id"));
    assert_eq!(device.model_id, Some(9));
    assert_eq!(device.brand_id, Some(3));
    assert_eq!(device.serial.as_deref(), Some("SN-1"));
    assert_eq!(
        device.specs,
        DeviceSpecs::Monitor {
            monitor_type_id: Some(2),
            port_id: Some(6),
            inches: Some(Decimal::new(215, 1)),
        }
    );
}

#[test]
fn test_patch_with_foreign_field_changes_nothing() {
    let mut device = monitor();
    let original = device.clone();
    let patch = DevicePatch {
        triage: device.triage.clone(),
        brand_id: Some(8),
        ram: Some(8),
        ..Default::default()
    };

    assert!(matches!(patch.apply(&mut device), Err(DomainError::Validation { .. })));
    assert_eq!(device.brand_id, original.brand_id);
    assert_eq!(device.specs, original.specs);
}

#[test]
fn test_patch_references_are_listed() {
    let patch = DevicePatch {
        triage: "M-4".to_string(),
        brand_id: Some(1),
        pallet_id: Some(2),
        ..Default::default()
    };
    assert_eq!(patch.references(), vec![("device_brands", 1), ("pallets", 2)]);
}

#[test]
fn test_patch_rejects_unknown_json_fields() {
    let parsed: Result<DevicePatch, _> =
        serde_json::from_str(r#"{"triage": "M-4", "colour": "black"}"#);
    assert!(parsed.is_err());
}

#[test]
fn test_patch_sets_every_tablet_field() {
    let mut device = Device::new_intake(DeviceKind::Tablet, 2, 1, 1);
    let patch = DevicePatch {
        triage: device.triage.clone(),
        system_version_id: Some(1),
        os_id: Some(2),
        storage: Some(64),
        storage_measure_id: Some(3),
        inches: Some(Decimal::new(10, 0)),
        processor_id: Some(4),
        ram: Some(4),
        ram_measure_id: Some(5),
        external_storage: Some(true),
        ..Default::default()
    };

    let fields = patch.apply(&mut device).unwrap();
    assert_eq!(fields.len(), 9);
    assert_eq!(
        device.specs,
        DeviceSpecs::Tablet {
            system_version_id: Some(1),
            os_id: Some(2),
            storage: Some(64),
            storage_measure_id: Some(3),
            inches: Some(10),
            processor_id: Some(4),
            ram: Some(4),
            ram_measure_id: Some(5),
            external_storage: true,
        }
    );
}

#[test]
fn test_tablet_inches_must_be_whole() {
    for inches in [Decimal::new(105, 1), Decimal::new(-8, 0)] {
        let mut device = Device::new_intake(DeviceKind::Tablet, 3, 1, 1);
        let original = device.clone();
        let patch = DevicePatch {
            triage: device.triage.clone(),
            storage: Some(32),
            inches: Some(inches),
            ..Default::default()
        };

        match patch.apply(&mut device) {
            Err(DomainError::Validation { field, .. }) => assert_eq!(field, "inches"),
            other => panic!("expected inches validation error, got {:?}", other),
        }
        assert_eq!(device.specs, original.specs);
    }
}

#[test]
fn test_tablet_catalog_references_are_listed() {
    let patch = DevicePatch {
        triage: "TAB-1".to_string(),
        os_id: Some(7),
        storage_measure_id: Some(2),
        ..Default::default()
    };
    assert_eq!(
        patch.references(),
        vec![("software_types", 7), ("device_measures", 2)]
    );
}

#[test]
fn test_tablet_fields_do_not_apply_to_monitors() {
    let mut device = monitor();
    let patch = DevicePatch {
        triage: device.triage.clone(),
        external_storage: Some(true),
        ..Default::default()
    };
    assert!(patch.apply(&mut device).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// An empty patch is a no-op on any device
    #[test]
    fn property_empty_patch_changes_nothing(
        kind in prop::sample::select(DeviceKind::ALL.to_vec()),
        indice in 1i32..1000,
    ) {
        let mut device = Device::new_intake(kind, indice, 1, 1);
        let before = device.clone();
        let patch = DevicePatch { triage: device.triage.clone(), ..Default::default() };

        let fields = patch.apply(&mut device).unwrap();
        prop_assert!(fields.is_empty());
        prop_assert_eq!(device.specs, before.specs);
        prop_assert_eq!(device.brand_id, before.brand_id);
        prop_assert_eq!(device.pallet_id, before.pallet_id);
    }
}
