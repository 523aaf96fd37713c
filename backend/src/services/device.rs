//! Device service: queries, grid updates and row locking shared by the lifecycle services

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Device, DeviceKind, DevicePatch, DeviceSpecs, DeviceStage, DeviceState};
use shared::{PaginatedResponse, Pagination};

const MAX_PAGE_SIZE: u32 = 200;

/// Column list matching [`DeviceRow`]
pub(crate) const DEVICE_COLUMNS: &str = "id, triage, kind, indice, device_type_id, intake_id, \
     state, stage, brand_id, model_id, serial, pallet_id, valid, specs, created_at";

/// Device service for listing and editing devices
#[derive(Clone)]
pub struct DeviceService {
    db: PgPool,
}

/// Database row for device
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DeviceRow {
    id: Uuid,
    triage: String,
    kind: String,
    indice: i32,
    device_type_id: i64,
    intake_id: i64,
    state: String,
    stage: String,
    brand_id: Option<i64>,
    model_id: Option<i64>,
    serial: Option<String>,
    pallet_id: Option<i64>,
    valid: bool,
    specs: Json<DeviceSpecs>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DeviceRow> for Device {
    type Error = AppError;

    fn try_from(row: DeviceRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str, value: &str| {
            AppError::Internal(format!("Device {} has unknown {} '{}'", row.triage, what, value))
        };
        let kind = DeviceKind::from_str(&row.kind).ok_or_else(|| corrupt("kind", &row.kind))?;
        let state = DeviceState::from_str(&row.state).ok_or_else(|| corrupt("state", &row.state))?;
        let stage = DeviceStage::from_str(&row.stage).ok_or_else(|| corrupt("stage", &row.stage))?;

        Ok(Device {
            id: row.id,
            triage: row.triage,
            kind,
            indice: row.indice,
            device_type_id: row.device_type_id,
            intake_id: row.intake_id,
            state,
            stage,
            brand_id: row.brand_id,
            model_id: row.model_id,
            serial: row.serial,
            pallet_id: row.pallet_id,
            valid: row.valid,
            specs: row.specs.0,
            created_at: row.created_at,
        })
    }
}

pub(crate) fn rows_to_devices(rows: Vec<DeviceRow>) -> AppResult<Vec<Device>> {
    rows.into_iter().map(Device::try_from).collect()
}

/// Lock a device by triage code for the rest of the transaction
pub(crate) async fn lock_device_by_triage(conn: &mut PgConnection, triage: &str) -> AppResult<Device> {
    let query = format!("SELECT {} FROM devices WHERE triage = $1 FOR UPDATE", DEVICE_COLUMNS);
    let row = sqlx::query_as::<_, DeviceRow>(&query)
        .bind(triage)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Device {}", triage)))?;

    row.try_into()
}

/// Lock a set of devices by ID, in a stable order
pub(crate) async fn lock_devices_by_ids(conn: &mut PgConnection, ids: &[Uuid]) -> AppResult<Vec<Device>> {
    let query = format!(
        "SELECT {} FROM devices WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        DEVICE_COLUMNS
    );
    let rows = sqlx::query_as::<_, DeviceRow>(&query)
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;

    rows_to_devices(rows)
}

/// Persist the stage and state of a device
pub(crate) async fn save_lifecycle(conn: &mut PgConnection, device: &Device) -> AppResult<()> {
    sqlx::query("UPDATE devices SET state = $1, stage = $2 WHERE id = $3")
        .bind(device.state.as_str())
        .bind(device.stage.as_str())
        .bind(device.id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Filters for the device listing
#[derive(Debug, Default, Deserialize)]
pub struct DeviceFilter {
    pub kind: Option<DeviceKind>,
    pub stage: Option<DeviceStage>,
    pub state: Option<DeviceState>,
    pub pallet_id: Option<i64>,
    /// Triage code prefix, e.g. "CPU-1"
    pub triage: Option<String>,
    pub valid: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Input for the inventory grid update
#[derive(Debug, Deserialize)]
pub struct UpdateDevicesInput {
    pub kind: DeviceKind,
    pub devices: Vec<DevicePatch>,
}

/// Result of a grid update
#[derive(Debug, Serialize)]
pub struct UpdateDevicesResult {
    pub updated: usize,
    pub devices: Vec<Device>,
}

impl DeviceService {
    /// Create a new DeviceService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List devices ordered by kind then indice
    pub async fn list_devices(
        &self,
        filter: DeviceFilter,
        default_page_size: u32,
    ) -> AppResult<PaginatedResponse<Device>> {
        let pagination = Pagination {
            page: filter.page.unwrap_or(1),
            per_page: filter.per_page.unwrap_or(default_page_size),
        };
        let limit = pagination.limit(MAX_PAGE_SIZE);
        let offset = pagination.offset(MAX_PAGE_SIZE);
        let triage_prefix = filter.triage.as_deref().map(|t| t.trim().to_uppercase());

        let conditions = r#"
            ($1::text IS NULL OR kind = $1)
            AND ($2::text IS NULL OR stage = $2)
            AND ($3::text IS NULL OR state = $3)
            AND ($4::bigint IS NULL OR pallet_id = $4)
            AND ($5::text IS NULL OR starts_with(triage, $5))
            AND ($6::boolean IS NULL OR valid = $6)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM devices WHERE {}",
            conditions
        ))
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.stage.map(|s| s.as_str()))
        .bind(filter.state.map(|s| s.as_str()))
        .bind(filter.pallet_id)
        .bind(triage_prefix.as_deref())
        .bind(filter.valid)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, DeviceRow>(&format!(
            "SELECT {} FROM devices WHERE {} ORDER BY kind, indice LIMIT $7 OFFSET $8",
            DEVICE_COLUMNS, conditions
        ))
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.stage.map(|s| s.as_str()))
        .bind(filter.state.map(|s| s.as_str()))
        .bind(filter.pallet_id)
        .bind(triage_prefix.as_deref())
        .bind(filter.valid)
        .bind(i64::from(limit))
        .bind(offset as i64)
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(
            rows_to_devices(rows)?,
            pagination.page.max(1),
            limit,
            total.max(0) as u64,
        ))
    }

    /// Get a device by triage code
    pub async fn get_device_by_triage(&self, triage: &str) -> AppResult<Device> {
        let query = format!("SELECT {} FROM devices WHERE triage = $1", DEVICE_COLUMNS);
        let row = sqlx::query_as::<_, DeviceRow>(&query)
            .bind(triage)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Device {}", triage)))?;

        row.try_into()
    }

    /// Devices that may be picked for a package: valid, Good and InTransit
    pub async fn list_package_candidates(&self) -> AppResult<Vec<Device>> {
        let query = format!(
            "SELECT {} FROM devices WHERE valid AND state = $1 AND stage = $2 ORDER BY kind, indice",
            DEVICE_COLUMNS
        );
        let rows = sqlx::query_as::<_, DeviceRow>(&query)
            .bind(DeviceState::Good.as_str())
            .bind(DeviceStage::InTransit.as_str())
            .fetch_all(&self.db)
            .await?;

        let devices = rows_to_devices(rows)?;
        Ok(devices.into_iter().filter(Device::is_package_candidate).collect())
    }

    /// Apply grid edits to devices of one kind, all or nothing.
    ///
    /// Unknown triage codes and references to missing catalog rows fail the
    /// whole update.
    pub async fn update_devices(&self, input: UpdateDevicesInput) -> AppResult<UpdateDevicesResult> {
        let mut tx = self.db.begin().await?;
        let mut updated = Vec::with_capacity(input.devices.len());

        for patch in &input.devices {
            let mut device = lock_device_by_triage(&mut tx, &patch.triage).await?;
            if device.kind != input.kind {
                return Err(AppError::Validation {
                    field: "triage".to_string(),
                    message: format!("{} is a {}, not a {}", device.triage, device.kind, input.kind),
                    message_es: format!("{} no es del tipo {}", device.triage, input.kind),
                });
            }

            for (table, id) in patch.references() {
                let exists = sqlx::query_scalar::<_, bool>(&format!(
                    "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
                    table
                ))
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
                if !exists {
                    return Err(AppError::NotFound(format!("{} {}", table, id)));
                }
            }
            if let Some(hdd_id) = patch.hdd_id {
                let exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM devices WHERE id = $1 AND kind = $2)",
                )
                .bind(hdd_id)
                .bind(DeviceKind::Hdd.as_str())
                .fetch_one(&mut *tx)
                .await?;
                if !exists {
                    return Err(AppError::NotFound(format!("HDD {}", hdd_id)));
                }
            }

            let fields = patch.apply(&mut device)?;
            if fields.is_empty() {
                updated.push(device);
                continue;
            }

            sqlx::query(
                r#"
                UPDATE devices
                SET brand_id = $1, model_id = $2, serial = $3, pallet_id = $4, specs = $5
                WHERE id = $6
                "#,
            )
            .bind(device.brand_id)
            .bind(device.model_id)
            .bind(&device.serial)
            .bind(device.pallet_id)
            .bind(Json(&device.specs))
            .bind(device.id)
            .execute(&mut *tx)
            .await?;

            tracing::debug!(triage = %device.triage, ?fields, "Device fields updated");
            updated.push(device);
        }

        tx.commit().await?;

        tracing::info!(kind = input.kind.as_str(), updated = updated.len(), "Inventory grid updated");
        Ok(UpdateDevicesResult {
            updated: updated.len(),
            devices: updated,
        })
    }

    /// Soft-invalidate a device; devices are never deleted
    pub async fn invalidate_device(&self, triage: &str) -> AppResult<Device> {
        let mut tx = self.db.begin().await?;
        let mut device = lock_device_by_triage(&mut tx, triage).await?;

        sqlx::query("UPDATE devices SET valid = FALSE WHERE id = $1")
            .bind(device.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        device.valid = false;
        tracing::info!(triage = %device.triage, "Device invalidated");
        Ok(device)
    }
}
