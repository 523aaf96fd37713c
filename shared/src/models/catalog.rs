//! Reference catalogs: device types and simple lookup tables

use serde::{Deserialize, Serialize};

use super::device::{registered_slugs, resolve_specialization, DeviceKind};
use crate::error::{DomainError, DomainResult};
use crate::validation::{validate_catalog_name, validate_slug};

/// Device type catalog entry (e.g. "Monitor", slug "M")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceType {
    pub id: i64,
    pub name: String,
    pub slug: String,
    /// Devices of this type are triaged one by one and carry a specialization
    pub uses_triage: bool,
}

impl DeviceType {
    /// Checks run before a device type is saved
    pub fn validate(&self) -> DomainResult<()> {
        validate_device_type(&self.name, &self.slug, self.uses_triage)
    }

    /// Specialization of this type; fails for types that are not triaged
    pub fn kind(&self) -> DomainResult<DeviceKind> {
        resolve_specialization(&self.slug)
    }
}

/// Validate a device type before saving it.
///
/// A type that uses triage must carry a slug declared by one of the device
/// specializations.
pub fn validate_device_type(name: &str, slug: &str, uses_triage: bool) -> DomainResult<()> {
    validate_catalog_name("name", name, 20)?;
    validate_slug(slug)?;
    if uses_triage && resolve_specialization(slug).is_err() {
        return Err(DomainError::InvalidCatalogEntry {
            slug: slug.to_string(),
            options: registered_slugs().join(", "),
        });
    }
    Ok(())
}

/// Intake type; `priced` means every detail must carry a subtotal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeType {
    pub id: i64,
    pub name: String,
    pub priced: bool,
}

/// Lookup tables with a single name column
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Brand,
    Model,
    Measure,
    Processor,
    PortType,
    MouseType,
    MonitorType,
    NetworkType,
    SoftwareType,
    SystemVersion,
    DeliveryType,
}

impl CatalogKind {
    pub const ALL: [CatalogKind; 11] = [
        CatalogKind::Brand,
        CatalogKind::Model,
        CatalogKind::Measure,
        CatalogKind::Processor,
        CatalogKind::PortType,
        CatalogKind::MouseType,
        CatalogKind::MonitorType,
        CatalogKind::NetworkType,
        CatalogKind::SoftwareType,
        CatalogKind::SystemVersion,
        CatalogKind::DeliveryType,
    ];

    /// Storage table backing this catalog
    pub fn table(&self) -> &'static str {
        match self {
            CatalogKind::Brand => "device_brands",
            CatalogKind::Model => "device_models",
            CatalogKind::Measure => "device_measures",
            CatalogKind::Processor => "processors",
            CatalogKind::PortType => "port_types",
            CatalogKind::MouseType => "mouse_types",
            CatalogKind::MonitorType => "monitor_types",
            CatalogKind::NetworkType => "network_types",
            CatalogKind::SoftwareType => "software_types",
            CatalogKind::SystemVersion => "system_versions",
            CatalogKind::DeliveryType => "delivery_types",
        }
    }

    /// Maximum name length accepted by the catalog
    pub fn max_name_len(&self) -> usize {
        match self {
            CatalogKind::Brand | CatalogKind::Model => 20,
            CatalogKind::Measure | CatalogKind::MouseType | CatalogKind::MonitorType => 15,
            CatalogKind::Processor | CatalogKind::SoftwareType => 25,
            CatalogKind::PortType | CatalogKind::SystemVersion | CatalogKind::DeliveryType => 30,
            CatalogKind::NetworkType => 45,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Brand => "brand",
            CatalogKind::Model => "model",
            CatalogKind::Measure => "measure",
            CatalogKind::Processor => "processor",
            CatalogKind::PortType => "port_type",
            CatalogKind::MouseType => "mouse_type",
            CatalogKind::MonitorType => "monitor_type",
            CatalogKind::NetworkType => "network_type",
            CatalogKind::SoftwareType => "software_type",
            CatalogKind::SystemVersion => "system_version",
            CatalogKind::DeliveryType => "delivery_type",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        CatalogKind::ALL.into_iter().find(|k| k.as_str() == s)
    }

    pub fn validate_name(&self, name: &str) -> DomainResult<()> {
        validate_catalog_name("name", name, self.max_name_len())
    }
}

/// Row of a single-name catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
}

/// Device port, typed by a port type entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    pub id: i64,
    pub name: String,
    pub port_type_id: i64,
}

/// Package template listing which device types a bundle should contain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageType {
    pub id: i64,
    pub name: String,
    pub device_type_ids: Vec<i64>,
}
