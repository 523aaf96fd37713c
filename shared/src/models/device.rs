//! Device records, the specialization registry and the stage/state table

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Physical condition of a device
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    /// Not yet repaired nor discarded
    Pending,
    /// Repaired and working
    Good,
    /// Discarded by a technician
    Discarded,
    /// Sent to a school
    Delivered,
}

impl DeviceState {
    pub const ALL: [DeviceState; 4] = [
        DeviceState::Pending,
        DeviceState::Good,
        DeviceState::Discarded,
        DeviceState::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Pending => "pending",
            DeviceState::Good => "good",
            DeviceState::Discarded => "discarded",
            DeviceState::Delivered => "delivered",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DeviceState::Pending),
            "good" => Some(DeviceState::Good),
            "discarded" => Some(DeviceState::Discarded),
            "delivered" => Some(DeviceState::Delivered),
            _ => None,
        }
    }

    /// Legacy integer code (PD=1, BN=2, DS=3, EN=4)
    pub fn code(&self) -> i16 {
        match self {
            DeviceState::Pending => 1,
            DeviceState::Good => 2,
            DeviceState::Discarded => 3,
            DeviceState::Delivered => 4,
        }
    }
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceState::Pending => write!(f, "Pending"),
            DeviceState::Good => write!(f, "Good"),
            DeviceState::Discarded => write!(f, "Discarded"),
            DeviceState::Delivered => write!(f, "Delivered"),
        }
    }
}

/// Position of a device in the refurbishing pipeline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStage {
    /// Stored in the warehouse
    Stored,
    /// Out for repair
    InTransit,
    /// Waiting for quality control
    QualityControl,
    /// Sent to scrap
    Discarded,
    /// Approved by quality control
    Ready,
    /// Placed at a school after an approved delivery
    Delivered,
}

const STORED_STATES: &[DeviceState] = &[DeviceState::Pending, DeviceState::Good];
const GOOD_ONLY: &[DeviceState] = &[DeviceState::Good];
const DISCARDED_ONLY: &[DeviceState] = &[DeviceState::Discarded];
const DELIVERED_ONLY: &[DeviceState] = &[DeviceState::Delivered];

impl DeviceStage {
    pub const ALL: [DeviceStage; 6] = [
        DeviceStage::Stored,
        DeviceStage::InTransit,
        DeviceStage::QualityControl,
        DeviceStage::Discarded,
        DeviceStage::Ready,
        DeviceStage::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStage::Stored => "stored",
            DeviceStage::InTransit => "in_transit",
            DeviceStage::QualityControl => "quality_control",
            DeviceStage::Discarded => "discarded",
            DeviceStage::Ready => "ready",
            DeviceStage::Delivered => "delivered",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "stored" => Some(DeviceStage::Stored),
            "in_transit" => Some(DeviceStage::InTransit),
            "quality_control" => Some(DeviceStage::QualityControl),
            "discarded" => Some(DeviceStage::Discarded),
            "ready" => Some(DeviceStage::Ready),
            "delivered" => Some(DeviceStage::Delivered),
            _ => None,
        }
    }

    /// Legacy integer code (AB=1, TR=2, CC=3, DS=4, LS=5, EN=6)
    pub fn code(&self) -> i16 {
        match self {
            DeviceStage::Stored => 1,
            DeviceStage::InTransit => 2,
            DeviceStage::QualityControl => 3,
            DeviceStage::Discarded => 4,
            DeviceStage::Ready => 5,
            DeviceStage::Delivered => 6,
        }
    }

    /// States a device may hold while in this stage
    pub fn admitted_states(&self) -> &'static [DeviceState] {
        match self {
            DeviceStage::Stored | DeviceStage::InTransit => STORED_STATES,
            DeviceStage::QualityControl | DeviceStage::Ready => GOOD_ONLY,
            DeviceStage::Discarded => DISCARDED_ONLY,
            DeviceStage::Delivered => DELIVERED_ONLY,
        }
    }

    pub fn admits(&self, state: DeviceState) -> bool {
        self.admitted_states().contains(&state)
    }
}

impl std::fmt::Display for DeviceStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceStage::Stored => write!(f, "Stored"),
            DeviceStage::InTransit => write!(f, "In Transit"),
            DeviceStage::QualityControl => write!(f, "Quality Control"),
            DeviceStage::Discarded => write!(f, "Discarded"),
            DeviceStage::Ready => write!(f, "Ready"),
            DeviceStage::Delivered => write!(f, "Delivered"),
        }
    }
}

/// Fail unless `stage` admits `state`
pub fn check_admissible(triage: &str, stage: DeviceStage, state: DeviceState) -> DomainResult<()> {
    if stage.admits(state) {
        Ok(())
    } else {
        Err(DomainError::InadmissibleState {
            triage: triage.to_string(),
            stage,
            state,
        })
    }
}

/// Specialized device kinds known to the triage process
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Keyboard,
    Mouse,
    Hdd,
    Tablet,
    Monitor,
    Cpu,
    Laptop,
    NetworkDevice,
    AccessPoint,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 9] = [
        DeviceKind::Keyboard,
        DeviceKind::Mouse,
        DeviceKind::Hdd,
        DeviceKind::Tablet,
        DeviceKind::Monitor,
        DeviceKind::Cpu,
        DeviceKind::Laptop,
        DeviceKind::NetworkDevice,
        DeviceKind::AccessPoint,
    ];

    /// Discriminator slug used by device type catalog entries and triage codes
    pub fn slug(&self) -> &'static str {
        match self {
            DeviceKind::Keyboard => "T",
            DeviceKind::Mouse => "S",
            DeviceKind::Hdd => "HDD",
            DeviceKind::Tablet => "B",
            DeviceKind::Monitor => "M",
            DeviceKind::Cpu => "CPU",
            DeviceKind::Laptop => "L",
            DeviceKind::NetworkDevice => "R",
            DeviceKind::AccessPoint => "AP",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Keyboard => "keyboard",
            DeviceKind::Mouse => "mouse",
            DeviceKind::Hdd => "hdd",
            DeviceKind::Tablet => "tablet",
            DeviceKind::Monitor => "monitor",
            DeviceKind::Cpu => "cpu",
            DeviceKind::Laptop => "laptop",
            DeviceKind::NetworkDevice => "network_device",
            DeviceKind::AccessPoint => "access_point",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        DeviceKind::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Keyboard => write!(f, "Keyboard"),
            DeviceKind::Mouse => write!(f, "Mouse"),
            DeviceKind::Hdd => write!(f, "HDD"),
            DeviceKind::Tablet => write!(f, "Tablet"),
            DeviceKind::Monitor => write!(f, "Monitor"),
            DeviceKind::Cpu => write!(f, "CPU"),
            DeviceKind::Laptop => write!(f, "Laptop"),
            DeviceKind::NetworkDevice => write!(f, "Network Device"),
            DeviceKind::AccessPoint => write!(f, "Access Point"),
        }
    }
}

/// Map a catalog slug to the specialization declaring it
pub fn resolve_specialization(type_slug: &str) -> DomainResult<DeviceKind> {
    DeviceKind::ALL
        .into_iter()
        .find(|k| k.slug() == type_slug)
        .ok_or_else(|| DomainError::UnknownDeviceType(type_slug.to_string()))
}

/// Every slug declared by a specialization
pub fn registered_slugs() -> Vec<&'static str> {
    DeviceKind::ALL.iter().map(|k| k.slug()).collect()
}

/// Build the triage code for the `indice`-th device of a kind (e.g. "CPU-3")
pub fn triage_code(kind: DeviceKind, indice: i32) -> String {
    format!("{}-{}", kind.slug(), indice)
}

/// Split a triage code back into its kind and sequence number
pub fn parse_triage(code: &str) -> Option<(DeviceKind, i32)> {
    let (slug, indice) = code.rsplit_once('-')?;
    let kind = resolve_specialization(slug).ok()?;
    let indice: i32 = indice.parse().ok()?;
    if indice < 1 {
        return None;
    }
    Some((kind, indice))
}

/// Kind-specific attributes of a device. The tag always equals the owning device's kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceSpecs {
    Keyboard {
        port_id: Option<i64>,
    },
    Mouse {
        port_id: Option<i64>,
        mouse_type_id: Option<i64>,
    },
    Hdd {
        port_id: Option<i64>,
        capacity: Option<i32>,
        measure_id: Option<i64>,
    },
    Tablet {
        system_version_id: Option<i64>,
        os_id: Option<i64>,
        storage: Option<i32>,
        storage_measure_id: Option<i64>,
        inches: Option<i32>,
        processor_id: Option<i64>,
        ram: Option<i32>,
        ram_measure_id: Option<i64>,
        #[serde(default)]
        external_storage: bool,
    },
    Monitor {
        monitor_type_id: Option<i64>,
        port_id: Option<i64>,
        inches: Option<Decimal>,
    },
    Cpu {
        processor_id: Option<i64>,
        system_version_id: Option<i64>,
        hdd_id: Option<Uuid>,
        ram: Option<i32>,
        ram_measure_id: Option<i64>,
    },
    Laptop {
        processor_id: Option<i64>,
        system_version_id: Option<i64>,
        hdd_id: Option<Uuid>,
        ram: Option<i32>,
        ram_measure_id: Option<i64>,
        inches: Option<Decimal>,
    },
    NetworkDevice {
        port_count: Option<i32>,
        port_id: Option<i64>,
        speed: Option<i32>,
        speed_measure_id: Option<i64>,
    },
    AccessPoint {
        port_count: Option<i32>,
        port_id: Option<i64>,
        speed: Option<i32>,
        speed_measure_id: Option<i64>,
    },
}

impl DeviceSpecs {
    /// Payload with every attribute unset
    pub fn empty(kind: DeviceKind) -> Self {
        match kind {
            DeviceKind::Keyboard => DeviceSpecs::Keyboard { port_id: None },
            DeviceKind::Mouse => DeviceSpecs::Mouse {
                port_id: None,
                mouse_type_id: None,
            },
            DeviceKind::Hdd => DeviceSpecs::Hdd {
                port_id: None,
                capacity: None,
                measure_id: None,
            },
            DeviceKind::Tablet => DeviceSpecs::Tablet {
                system_version_id: None,
                os_id: None,
                storage: None,
                storage_measure_id: None,
                inches: None,
                processor_id: None,
                ram: None,
                ram_measure_id: None,
                external_storage: false,
            },
            DeviceKind::Monitor => DeviceSpecs::Monitor {
                monitor_type_id: None,
                port_id: None,
                inches: None,
            },
            DeviceKind::Cpu => DeviceSpecs::Cpu {
                processor_id: None,
                system_version_id: None,
                hdd_id: None,
                ram: None,
                ram_measure_id: None,
            },
            DeviceKind::Laptop => DeviceSpecs::Laptop {
                processor_id: None,
                system_version_id: None,
                hdd_id: None,
                ram: None,
                ram_measure_id: None,
                inches: None,
            },
            DeviceKind::NetworkDevice => DeviceSpecs::NetworkDevice {
                port_count: None,
                port_id: None,
                speed: None,
                speed_measure_id: None,
            },
            DeviceKind::AccessPoint => DeviceSpecs::AccessPoint {
                port_count: None,
                port_id: None,
                speed: None,
                speed_measure_id: None,
            },
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            DeviceSpecs::Keyboard { .. } => DeviceKind::Keyboard,
            DeviceSpecs::Mouse { .. } => DeviceKind::Mouse,
            DeviceSpecs::Hdd { .. } => DeviceKind::Hdd,
            DeviceSpecs::Tablet { .. } => DeviceKind::Tablet,
            DeviceSpecs::Monitor { .. } => DeviceKind::Monitor,
            DeviceSpecs::Cpu { .. } => DeviceKind::Cpu,
            DeviceSpecs::Laptop { .. } => DeviceKind::Laptop,
            DeviceSpecs::NetworkDevice { .. } => DeviceKind::NetworkDevice,
            DeviceSpecs::AccessPoint { .. } => DeviceKind::AccessPoint,
        }
    }

    /// HDD mounted inside a CPU or laptop, if any
    pub fn mounted_hdd(&self) -> Option<Uuid> {
        match self {
            DeviceSpecs::Cpu { hdd_id, .. } | DeviceSpecs::Laptop { hdd_id, .. } => *hdd_id,
            _ => None,
        }
    }
}

/// A device tracked by the inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    /// Unique triage code, e.g. "M-42"
    pub triage: String,
    pub kind: DeviceKind,
    pub indice: i32,
    pub device_type_id: i64,
    pub intake_id: i64,
    pub state: DeviceState,
    pub stage: DeviceStage,
    pub brand_id: Option<i64>,
    pub model_id: Option<i64>,
    pub serial: Option<String>,
    pub pallet_id: Option<i64>,
    pub valid: bool,
    pub specs: DeviceSpecs,
    pub created_at: DateTime<Utc>,
}

impl Device {
    /// A freshly triaged device: stored in the warehouse, pending repair
    pub fn new_intake(kind: DeviceKind, indice: i32, device_type_id: i64, intake_id: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            triage: triage_code(kind, indice),
            kind,
            indice,
            device_type_id,
            intake_id,
            state: DeviceState::Pending,
            stage: DeviceStage::Stored,
            brand_id: None,
            model_id: None,
            serial: None,
            pallet_id: None,
            valid: true,
            specs: DeviceSpecs::empty(kind),
            created_at: Utc::now(),
        }
    }

    /// True when the payload matches the device kind
    pub fn is_consistent(&self) -> bool {
        self.specs.kind() == self.kind
    }

    /// Move to `stage`, refusing stages that do not admit the current state.
    /// Returns the previous stage.
    pub fn move_to_stage(&mut self, stage: DeviceStage) -> DomainResult<DeviceStage> {
        check_admissible(&self.triage, stage, self.state)?;
        let before = self.stage;
        self.stage = stage;
        Ok(before)
    }

    /// Devices that may be picked for a delivery package
    pub fn is_package_candidate(&self) -> bool {
        self.valid && self.state == DeviceState::Good && self.stage == DeviceStage::InTransit
    }

    /// Devices that may be assigned to a package
    pub fn is_assignable(&self) -> bool {
        self.valid
            && self.state == DeviceState::Good
            && matches!(self.stage, DeviceStage::InTransit | DeviceStage::QualityControl)
    }

    /// Close the lifecycle once the device reaches a school
    pub fn deliver(&mut self) -> DomainResult<()> {
        if self.stage != DeviceStage::Ready {
            return Err(DomainError::InvalidTransition(format!(
                "device {} is {} and cannot be delivered",
                self.triage, self.stage
            )));
        }
        self.state = DeviceState::Delivered;
        self.stage = DeviceStage::Delivered;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_slug_resolves_to_its_kind() {
        for kind in DeviceKind::ALL {
            assert_eq!(resolve_specialization(kind.slug()), Ok(kind));
        }
    }

    #[test]
    fn test_unknown_slug_is_rejected() {
        assert_eq!(
            resolve_specialization("XYZ"),
            Err(DomainError::UnknownDeviceType("XYZ".to_string()))
        );
        // Slugs are case sensitive
        assert!(resolve_specialization("cpu").is_err());
    }

    #[test]
    fn test_slugs_are_unique() {
        let mut slugs = registered_slugs();
        slugs.sort();
        slugs.dedup();
        assert_eq!(slugs.len(), DeviceKind::ALL.len());
    }

    #[test]
    fn test_triage_code_roundtrip() {
        assert_eq!(triage_code(DeviceKind::Cpu, 3), "CPU-3");
        assert_eq!(parse_triage("CPU-3"), Some((DeviceKind::Cpu, 3)));
        assert_eq!(parse_triage("AP-10"), Some((DeviceKind::AccessPoint, 10)));
        assert_eq!(parse_triage("CPU-0"), None);
        assert_eq!(parse_triage("Q-1"), None);
        assert_eq!(parse_triage("T1"), None);
    }

    #[test]
    fn test_admissibility_table() {
        assert!(DeviceStage::Stored.admits(DeviceState::Pending));
        assert!(DeviceStage::Stored.admits(DeviceState::Good));
        assert!(DeviceStage::InTransit.admits(DeviceState::Pending));
        assert!(!DeviceStage::QualityControl.admits(DeviceState::Pending));
        assert!(DeviceStage::QualityControl.admits(DeviceState::Good));
        assert!(DeviceStage::Ready.admits(DeviceState::Good));
        assert!(!DeviceStage::Ready.admits(DeviceState::Pending));
        assert!(DeviceStage::Discarded.admits(DeviceState::Discarded));
        assert!(!DeviceStage::Discarded.admits(DeviceState::Good));
        assert!(DeviceStage::Delivered.admits(DeviceState::Delivered));
    }

    #[test]
    fn test_string_codes_roundtrip() {
        for stage in DeviceStage::ALL {
            assert_eq!(DeviceStage::from_str(stage.as_str()), Some(stage));
        }
        for state in DeviceState::ALL {
            assert_eq!(DeviceState::from_str(state.as_str()), Some(state));
        }
        for kind in DeviceKind::ALL {
            assert_eq!(DeviceKind::from_str(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_specs_tag_matches_kind_in_json() {
        let specs = DeviceSpecs::empty(DeviceKind::NetworkDevice);
        let json = serde_json::to_value(&specs).unwrap();
        assert_eq!(json["kind"], DeviceKind::NetworkDevice.as_str());

        let parsed: DeviceSpecs = serde_json::from_str(r#"{"kind":"keyboard"}"#).unwrap();
        assert_eq!(parsed, DeviceSpecs::Keyboard { port_id: None });
    }

    #[test]
    fn test_mounted_hdd() {
        let hdd = Uuid::new_v4();
        let mut specs = DeviceSpecs::empty(DeviceKind::Cpu);
        assert_eq!(specs.mounted_hdd(), None);
        if let DeviceSpecs::Cpu { hdd_id, .. } = &mut specs {
            *hdd_id = Some(hdd);
        }
        assert_eq!(specs.mounted_hdd(), Some(hdd));
        assert_eq!(DeviceSpecs::empty(DeviceKind::Monitor).mounted_hdd(), None);
    }

    #[test]
    fn test_new_intake_device() {
        let device = Device::new_intake(DeviceKind::Monitor, 7, 1, 1);
        assert_eq!(device.triage, "M-7");
        assert_eq!(device.stage, DeviceStage::Stored);
        assert_eq!(device.state, DeviceState::Pending);
        assert!(device.is_consistent());
    }

    #[test]
    fn test_move_to_stage_refuses_inadmissible_state() {
        let mut device = Device::new_intake(DeviceKind::Mouse, 1, 1, 1);
        let err = device.move_to_stage(DeviceStage::QualityControl).unwrap_err();
        assert!(matches!(err, DomainError::InadmissibleState { .. }));
        assert_eq!(device.stage, DeviceStage::Stored);

        device.state = DeviceState::Good;
        assert_eq!(device.move_to_stage(DeviceStage::QualityControl), Ok(DeviceStage::Stored));
        assert_eq!(device.stage, DeviceStage::QualityControl);
    }

    #[test]
    fn test_deliver_requires_ready() {
        let mut device = Device::new_intake(DeviceKind::Cpu, 1, 1, 1);
        device.state = DeviceState::Good;
        assert!(device.deliver().is_err());
        device.stage = DeviceStage::Ready;
        device.deliver().unwrap();
        assert_eq!(device.state, DeviceState::Delivered);
        assert_eq!(device.stage, DeviceStage::Delivered);
    }
}
