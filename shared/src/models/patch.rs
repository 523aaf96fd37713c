//! Partial updates of device records coming from the inventory grid

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::device::{Device, DeviceSpecs};
use crate::error::{DomainError, DomainResult};

/// Fields to change on one device. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DevicePatch {
    pub triage: String,
    pub brand_id: Option<i64>,
    pub model_id: Option<i64>,
    pub serial: Option<String>,
    pub pallet_id: Option<i64>,
    pub port_id: Option<i64>,
    pub mouse_type_id: Option<i64>,
    pub monitor_type_id: Option<i64>,
    pub capacity: Option<i32>,
    pub measure_id: Option<i64>,
    pub processor_id: Option<i64>,
    pub system_version_id: Option<i64>,
    pub hdd_id: Option<Uuid>,
    pub ram: Option<i32>,
    pub ram_measure_id: Option<i64>,
    pub inches: Option<Decimal>,
    pub port_count: Option<i32>,
    pub speed: Option<i32>,
    pub speed_measure_id: Option<i64>,
    pub os_id: Option<i64>,
    pub storage: Option<i32>,
    pub storage_measure_id: Option<i64>,
    pub external_storage: Option<bool>,
}

fn set<T: Clone>(slot: &mut Option<T>, value: &Option<T>, name: &'static str, applied: &mut Vec<&'static str>) {
    if let Some(v) = value {
        *slot = Some(v.clone());
        applied.push(name);
    }
}

/// Tablet screens are recorded in whole inches
fn whole_inches(value: Decimal) -> DomainResult<i32> {
    if value.is_sign_negative() || !value.fract().is_zero() {
        return Err(DomainError::validation(
            "inches",
            format!("{} is not a whole number of inches", value),
        ));
    }
    value
        .to_i32()
        .ok_or_else(|| DomainError::validation("inches", format!("{} inches is too large", value)))
}

fn not_applicable(patch: &DevicePatch, device: &Device, field: &str) -> DomainError {
    DomainError::validation(
        field,
        format!("{} does not apply to {} ({})", field, device.kind, patch.triage),
    )
}

impl DevicePatch {
    /// Catalog rows referenced by this patch, as (table, id) pairs
    pub fn references(&self) -> Vec<(&'static str, i64)> {
        let mut refs = Vec::new();
        for (table, id) in [
            ("device_brands", self.brand_id),
            ("device_models", self.model_id),
            ("pallets", self.pallet_id),
            ("ports", self.port_id),
            ("mouse_types", self.mouse_type_id),
            ("monitor_types", self.monitor_type_id),
            ("device_measures", self.measure_id),
            ("processors", self.processor_id),
            ("system_versions", self.system_version_id),
            ("device_measures", self.ram_measure_id),
            ("device_measures", self.speed_measure_id),
            ("software_types", self.os_id),
            ("device_measures", self.storage_measure_id),
        ] {
            if let Some(id) = id {
                refs.push((table, id));
            }
        }
        refs
    }

    /// Apply the present fields to `device` and return their names.
    ///
    /// A field that does not exist on the device kind is an error and the device
    /// is left unchanged.
    pub fn apply(&self, device: &mut Device) -> DomainResult<Vec<&'static str>> {
        if device.triage != self.triage {
            return Err(DomainError::validation(
                "triage",
                format!("patch for {} applied to {}", self.triage, device.triage),
            ));
        }

        let mut specs = device.specs.clone();
        let mut applied = Vec::new();
        self.apply_specs(device, &mut specs, &mut applied)?;

        set(&mut device.brand_id, &self.brand_id, "brand_id", &mut applied);
        set(&mut device.model_id, &self.model_id, "model_id", &mut applied);
        set(&mut device.serial, &self.serial, "serial", &mut applied);
        set(&mut device.pallet_id, &self.pallet_id, "pallet_id", &mut applied);
        device.specs = specs;
        Ok(applied)
    }

    fn apply_specs(
        &self,
        device: &Device,
        specs: &mut DeviceSpecs,
        applied: &mut Vec<&'static str>,
    ) -> DomainResult<()> {
        // Fields each kind accepts; anything else present in the patch is refused.
        let accepted: &[&str] = match specs {
            DeviceSpecs::Keyboard { port_id } => {
                set(port_id, &self.port_id, "port_id", applied);
                &["port_id"]
            }
            DeviceSpecs::Mouse { port_id, mouse_type_id } => {
                set(port_id, &self.port_id, "port_id", applied);
                set(mouse_type_id, &self.mouse_type_id, "mouse_type_id", applied);
                &["port_id", "mouse_type_id"]
            }
            DeviceSpecs::Hdd { port_id, capacity, measure_id } => {
                set(port_id, &self.port_id, "port_id", applied);
                set(capacity, &self.capacity, "capacity", applied);
                set(measure_id, &self.measure_id, "measure_id", applied);
                &["port_id", "capacity", "measure_id"]
            }
            DeviceSpecs::Tablet {
                system_version_id,
                os_id,
                storage,
                storage_measure_id,
                inches,
                processor_id,
                ram,
                ram_measure_id,
                external_storage,
            } => {
                set(system_version_id, &self.system_version_id, "system_version_id", applied);
                set(os_id, &self.os_id, "os_id", applied);
                set(storage, &self.storage, "storage", applied);
                set(storage_measure_id, &self.storage_measure_id, "storage_measure_id", applied);
                if let Some(value) = self.inches {
                    *inches = Some(whole_inches(value)?);
                    applied.push("inches");
                }
                set(processor_id, &self.processor_id, "processor_id", applied);
                set(ram, &self.ram, "ram", applied);
                set(ram_measure_id, &self.ram_measure_id, "ram_measure_id", applied);
                if let Some(value) = self.external_storage {
                    *external_storage = value;
                    applied.push("external_storage");
                }
                &[
                    "system_version_id",
                    "os_id",
                    "storage",
                    "storage_measure_id",
                    "inches",
                    "processor_id",
                    "ram",
                    "ram_measure_id",
                    "external_storage",
                ]
            }
            DeviceSpecs::Monitor { monitor_type_id, port_id, inches } => {
                set(monitor_type_id, &self.monitor_type_id, "monitor_type_id", applied);
                set(port_id, &self.port_id, "port_id", applied);
                set(inches, &self.inches, "inches", applied);
                &["monitor_type_id", "port_id", "inches"]
            }
            DeviceSpecs::Cpu {
                processor_id,
                system_version_id,
                hdd_id,
                ram,
                ram_measure_id,
            } => {
                set(processor_id, &self.processor_id, "processor_id", applied);
                set(system_version_id, &self.system_version_id, "system_version_id", applied);
                set(hdd_id, &self.hdd_id, "hdd_id", applied);
                set(ram, &self.ram, "ram", applied);
                set(ram_measure_id, &self.ram_measure_id, "ram_measure_id", applied);
                &["processor_id", "system_version_id", "hdd_id", "ram", "ram_measure_id"]
            }
            DeviceSpecs::Laptop {
                processor_id,
                system_version_id,
                hdd_id,
                ram,
                ram_measure_id,
                inches,
            } => {
                set(processor_id, &self.processor_id, "processor_id", applied);
                set(system_version_id, &self.system_version_id, "system_version_id", applied);
                set(hdd_id, &self.hdd_id, "hdd_id", applied);
                set(ram, &self.ram, "ram", applied);
                set(ram_measure_id, &self.ram_measure_id, "ram_measure_id", applied);
                set(inches, &self.inches, "inches", applied);
                &[
                    "processor_id",
                    "system_version_id",
                    "hdd_id",
                    "ram",
                    "ram_measure_id",
                    "inches",
                ]
            }
            DeviceSpecs::NetworkDevice {
                port_count,
                port_id,
                speed,
                speed_measure_id,
            }
            | DeviceSpecs::AccessPoint {
                port_count,
                port_id,
                speed,
                speed_measure_id,
            } => {
                set(port_count, &self.port_count, "port_count", applied);
                set(port_id, &self.port_id, "port_id", applied);
                set(speed, &self.speed, "speed", applied);
                set(speed_measure_id, &self.speed_measure_id, "speed_measure_id", applied);
                &["port_count", "port_id", "speed", "speed_measure_id"]
            }
        };

        for field in self.present_spec_fields() {
            if !accepted.contains(&field) {
                return Err(not_applicable(self, device, field));
            }
        }
        Ok(())
    }

    fn present_spec_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        let flags = [
            ("port_id", self.port_id.is_some()),
            ("mouse_type_id", self.mouse_type_id.is_some()),
            ("monitor_type_id", self.monitor_type_id.is_some()),
            ("capacity", self.capacity.is_some()),
            ("measure_id", self.measure_id.is_some()),
            ("processor_id", self.processor_id.is_some()),
            ("system_version_id", self.system_version_id.is_some()),
            ("hdd_id", self.hdd_id.is_some()),
            ("ram", self.ram.is_some()),
            ("ram_measure_id", self.ram_measure_id.is_some()),
            ("inches", self.inches.is_some()),
            ("port_count", self.port_count.is_some()),
            ("speed", self.speed.is_some()),
            ("speed_measure_id", self.speed_measure_id.is_some()),
            ("os_id", self.os_id.is_some()),
            ("storage", self.storage.is_some()),
            ("storage_measure_id", self.storage_measure_id.is_some()),
            ("external_storage", self.external_storage.is_some()),
        ];
        for (name, present) in flags {
            if present {
                fields.push(name);
            }
        }
        fields
    }
}
