//! Warehouse locations: aisle → level → sector → pallet

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aisle {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level {
    pub id: i64,
    pub aisle_id: i64,
    /// Single letter, e.g. "A"
    pub level: String,
}

impl Level {
    /// Label such as "3A"
    pub fn label(&self) -> String {
        format!("{}{}", self.aisle_id, self.level)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sector {
    pub id: i64,
    pub level_id: i64,
    pub sector: i32,
}

/// Label of a sector, e.g. "3A-2"
pub fn sector_label(level: &Level, sector: i32) -> String {
    format!("{}-{}", level.label(), sector)
}

/// Pallet holding devices and spare parts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pallet {
    pub id: i64,
    pub sector_id: Option<i64>,
}
