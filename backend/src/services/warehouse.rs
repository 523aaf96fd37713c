//! Warehouse service: aisles, levels, sectors, pallets and placement

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{sector_label, Aisle, Device, Level, Pallet, Sector};
use crate::services::device::{lock_device_by_triage, rows_to_devices, DeviceRow, DEVICE_COLUMNS};
use shared::validate_level_label;

/// Warehouse service for storage locations
#[derive(Clone)]
pub struct WarehouseService {
    db: PgPool,
}

/// Input for creating a level
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLevelInput {
    pub aisle_id: i64,
    #[validate(length(equal = 1))]
    pub level: String,
}

/// Input for creating a sector
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSectorInput {
    pub level_id: i64,
    #[validate(range(min = 1))]
    pub sector: i32,
}

/// Input for creating a pallet
#[derive(Debug, Deserialize)]
pub struct CreatePalletInput {
    pub sector_id: Option<i64>,
}

/// Input for placing something on a pallet
#[derive(Debug, Deserialize)]
pub struct PlaceOnPalletInput {
    pub pallet_id: i64,
}

/// Sector with its display label
#[derive(Debug, Serialize)]
pub struct SectorView {
    #[serde(flatten)]
    pub sector: Sector,
    pub label: String,
}

impl WarehouseService {
    /// Create a new WarehouseService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_aisle(&self) -> AppResult<Aisle> {
        let id = sqlx::query_scalar::<_, i64>("INSERT INTO aisles DEFAULT VALUES RETURNING id")
            .fetch_one(&self.db)
            .await?;

        tracing::info!(aisle_id = id, "Aisle created");
        Ok(Aisle { id })
    }

    pub async fn list_aisles(&self) -> AppResult<Vec<Aisle>> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM aisles ORDER BY id")
            .fetch_all(&self.db)
            .await?;

        Ok(ids.into_iter().map(|id| Aisle { id }).collect())
    }

    /// Create a level, stored upper-case
    pub async fn create_level(&self, input: CreateLevelInput) -> AppResult<Level> {
        input.validate()?;
        validate_level_label(&input.level)?;
        self.ensure_exists("aisles", input.aisle_id, "Aisle").await?;

        let (id, aisle_id, level) = sqlx::query_as::<_, (i64, i64, String)>(
            "INSERT INTO levels (aisle_id, level) VALUES ($1, $2) RETURNING id, aisle_id, level",
        )
        .bind(input.aisle_id)
        .bind(input.level.to_uppercase())
        .fetch_one(&self.db)
        .await?;

        Ok(Level { id, aisle_id, level })
    }

    pub async fn list_levels(&self, aisle_id: i64) -> AppResult<Vec<Level>> {
        let rows = sqlx::query_as::<_, (i64, i64, String)>(
            "SELECT id, aisle_id, level FROM levels WHERE aisle_id = $1 ORDER BY level",
        )
        .bind(aisle_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, aisle_id, level)| Level { id, aisle_id, level })
            .collect())
    }

    pub async fn create_sector(&self, input: CreateSectorInput) -> AppResult<SectorView> {
        input.validate()?;
        let level = self.get_level(input.level_id).await?;

        let (id, level_id, sector) = sqlx::query_as::<_, (i64, i64, i32)>(
            "INSERT INTO sectors (level_id, sector) VALUES ($1, $2) RETURNING id, level_id, sector",
        )
        .bind(input.level_id)
        .bind(input.sector)
        .fetch_one(&self.db)
        .await?;

        let label = sector_label(&level, sector);
        tracing::info!(sector_id = id, label = %label, "Sector created");
        Ok(SectorView {
            sector: Sector { id, level_id, sector },
            label,
        })
    }

    pub async fn list_sectors(&self, level_id: i64) -> AppResult<Vec<SectorView>> {
        let level = self.get_level(level_id).await?;
        let rows = sqlx::query_as::<_, (i64, i64, i32)>(
            "SELECT id, level_id, sector FROM sectors WHERE level_id = $1 ORDER BY sector",
        )
        .bind(level_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, level_id, sector)| SectorView {
                label: sector_label(&level, sector),
                sector: Sector { id, level_id, sector },
            })
            .collect())
    }

    pub async fn create_pallet(&self, input: CreatePalletInput) -> AppResult<Pallet> {
        if let Some(sector_id) = input.sector_id {
            self.ensure_exists("sectors", sector_id, "Sector").await?;
        }

        let (id, sector_id) = sqlx::query_as::<_, (i64, Option<i64>)>(
            "INSERT INTO pallets (sector_id) VALUES ($1) RETURNING id, sector_id",
        )
        .bind(input.sector_id)
        .fetch_one(&self.db)
        .await?;

        Ok(Pallet { id, sector_id })
    }

    pub async fn list_pallets(&self, sector_id: Option<i64>) -> AppResult<Vec<Pallet>> {
        let rows = sqlx::query_as::<_, (i64, Option<i64>)>(
            "SELECT id, sector_id FROM pallets WHERE ($1::bigint IS NULL OR sector_id = $1) ORDER BY id",
        )
        .bind(sector_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, sector_id)| Pallet { id, sector_id })
            .collect())
    }

    /// Put a device on a pallet
    pub async fn place_device(&self, triage: &str, input: PlaceOnPalletInput) -> AppResult<Device> {
        let mut tx = self.db.begin().await?;
        let mut device = lock_device_by_triage(&mut tx, triage).await?;

        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM pallets WHERE id = $1)")
            .bind(input.pallet_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(AppError::NotFound(format!("Pallet {}", input.pallet_id)));
        }

        sqlx::query("UPDATE devices SET pallet_id = $1 WHERE id = $2")
            .bind(input.pallet_id)
            .bind(device.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        device.pallet_id = Some(input.pallet_id);
        tracing::info!(triage = %device.triage, pallet_id = input.pallet_id, "Device placed");
        Ok(device)
    }

    /// Put a spare part on a pallet
    pub async fn place_spare(&self, spare_id: i64, input: PlaceOnPalletInput) -> AppResult<()> {
        self.ensure_exists("pallets", input.pallet_id, "Pallet").await?;

        let result = sqlx::query("UPDATE spare_parts SET pallet_id = $1 WHERE id = $2")
            .bind(input.pallet_id)
            .bind(spare_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Spare part {}", spare_id)));
        }

        tracing::info!(spare_id, pallet_id = input.pallet_id, "Spare part placed");
        Ok(())
    }

    /// Devices stored anywhere in an aisle
    pub async fn devices_in_aisle(&self, aisle_id: i64) -> AppResult<Vec<Device>> {
        self.ensure_exists("aisles", aisle_id, "Aisle").await?;

        let columns = DEVICE_COLUMNS
            .split(", ")
            .map(|c| format!("d.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let rows = sqlx::query_as::<_, DeviceRow>(&format!(
            r#"
            SELECT {}
            FROM devices d
            JOIN pallets p ON p.id = d.pallet_id
            JOIN sectors s ON s.id = p.sector_id
            JOIN levels l ON l.id = s.level_id
            WHERE l.aisle_id = $1
            ORDER BY d.kind, d.indice
            "#,
            columns
        ))
        .bind(aisle_id)
        .fetch_all(&self.db)
        .await?;

        rows_to_devices(rows)
    }

    async fn get_level(&self, level_id: i64) -> AppResult<Level> {
        let (id, aisle_id, level) = sqlx::query_as::<_, (i64, i64, String)>(
            "SELECT id, aisle_id, level FROM levels WHERE id = $1",
        )
        .bind(level_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Level {}", level_id)))?;

        Ok(Level { id, aisle_id, level })
    }

    async fn ensure_exists(&self, table: &str, id: i64, what: &str) -> AppResult<()> {
        let exists = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            table
        ))
        .bind(id)
        .fetch_one(&self.db)
        .await?;

        if !exists {
            return Err(AppError::NotFound(format!("{} {}", what, id)));
        }
        Ok(())
    }
}
