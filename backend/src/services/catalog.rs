//! Catalog service: device types and reference lookup tables

use serde::Deserialize;
use sqlx::PgPool;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    validate_device_type, CatalogEntry, CatalogKind, DeviceKind, DeviceType, IntakeType,
    PackageType, Port,
};

/// Catalog service for reference data
#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

/// Database row for device type
#[derive(Debug, sqlx::FromRow)]
struct DeviceTypeRow {
    id: i64,
    name: String,
    slug: String,
    uses_triage: bool,
}

impl From<DeviceTypeRow> for DeviceType {
    fn from(row: DeviceTypeRow) -> Self {
        DeviceType {
            id: row.id,
            name: row.name,
            slug: row.slug,
            uses_triage: row.uses_triage,
        }
    }
}

/// Input for creating a device type
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDeviceTypeInput {
    #[validate(length(min = 1, max = 20))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub slug: String,
    #[serde(default)]
    pub uses_triage: bool,
}

/// Input for creating a single-name catalog entry
#[derive(Debug, Deserialize, Validate)]
pub struct CreateEntryInput {
    #[validate(length(min = 1, max = 45))]
    pub name: String,
}

/// Input for creating a port
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePortInput {
    #[validate(length(min = 1, max = 30))]
    pub name: String,
    pub port_type_id: i64,
}

/// Input for creating an intake type
#[derive(Debug, Deserialize, Validate)]
pub struct CreateIntakeTypeInput {
    #[validate(length(min = 1, max = 30))]
    pub name: String,
    #[serde(default)]
    pub priced: bool,
}

/// Input for creating a package type
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePackageTypeInput {
    #[validate(length(min = 1, max = 30))]
    pub name: String,
    #[serde(default)]
    pub device_type_ids: Vec<i64>,
}

impl CatalogService {
    /// Create a new CatalogService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a device type.
    /// A type that uses triage must carry a slug known to the device registry.
    pub async fn create_device_type(&self, input: CreateDeviceTypeInput) -> AppResult<DeviceType> {
        input.validate()?;
        validate_device_type(&input.name, &input.slug, input.uses_triage)?;

        let row = sqlx::query_as::<_, DeviceTypeRow>(
            r#"
            INSERT INTO device_types (name, slug, uses_triage)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, uses_triage
            "#,
        )
        .bind(&input.name)
        .bind(&input.slug)
        .bind(input.uses_triage)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(device_type_id = row.id, slug = %row.slug, "Device type created");
        Ok(row.into())
    }

    /// List device types ordered by name
    pub async fn list_device_types(&self) -> AppResult<Vec<DeviceType>> {
        let rows = sqlx::query_as::<_, DeviceTypeRow>(
            "SELECT id, name, slug, uses_triage FROM device_types ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a device type by ID
    pub async fn get_device_type(&self, device_type_id: i64) -> AppResult<DeviceType> {
        let row = sqlx::query_as::<_, DeviceTypeRow>(
            "SELECT id, name, slug, uses_triage FROM device_types WHERE id = $1",
        )
        .bind(device_type_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Device type {}", device_type_id)))?;

        Ok(row.into())
    }

    /// Resolve the specialization of a triaged device type
    pub async fn triaged_kind(&self, device_type_id: i64) -> AppResult<(DeviceType, DeviceKind)> {
        let device_type = self.get_device_type(device_type_id).await?;
        if !device_type.uses_triage {
            return Err(AppError::Validation {
                field: "device_type_id".to_string(),
                message: format!("Device type {} does not use triage", device_type.name),
                message_es: format!("El tipo {} no usa triage", device_type.name),
            });
        }
        let kind = device_type.kind()?;
        Ok((device_type, kind))
    }

    /// Create an entry in a single-name catalog
    pub async fn create_entry(
        &self,
        kind: CatalogKind,
        input: CreateEntryInput,
    ) -> AppResult<CatalogEntry> {
        input.validate()?;
        kind.validate_name(&input.name)?;

        let query = format!(
            "INSERT INTO {} (name) VALUES ($1) RETURNING id, name",
            kind.table()
        );
        let (id, name) = sqlx::query_as::<_, (i64, String)>(&query)
            .bind(input.name.trim())
            .fetch_one(&self.db)
            .await?;

        tracing::info!(catalog = kind.as_str(), id, "Catalog entry created");
        Ok(CatalogEntry { id, name })
    }

    /// List the entries of a single-name catalog
    pub async fn list_entries(&self, kind: CatalogKind) -> AppResult<Vec<CatalogEntry>> {
        let query = format!("SELECT id, name FROM {} ORDER BY name", kind.table());
        let rows = sqlx::query_as::<_, (i64, String)>(&query)
            .fetch_all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| CatalogEntry { id, name })
            .collect())
    }

    /// Create a port
    pub async fn create_port(&self, input: CreatePortInput) -> AppResult<Port> {
        input.validate()?;

        let type_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM port_types WHERE id = $1)")
                .bind(input.port_type_id)
                .fetch_one(&self.db)
                .await?;
        if !type_exists {
            return Err(AppError::NotFound(format!("Port type {}", input.port_type_id)));
        }

        let (id, name, port_type_id) = sqlx::query_as::<_, (i64, String, i64)>(
            "INSERT INTO ports (name, port_type_id) VALUES ($1, $2) RETURNING id, name, port_type_id",
        )
        .bind(&input.name)
        .bind(input.port_type_id)
        .fetch_one(&self.db)
        .await?;

        Ok(Port {
            id,
            name,
            port_type_id,
        })
    }

    /// List ports
    pub async fn list_ports(&self) -> AppResult<Vec<Port>> {
        let rows = sqlx::query_as::<_, (i64, String, i64)>(
            "SELECT id, name, port_type_id FROM ports ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, port_type_id)| Port {
                id,
                name,
                port_type_id,
            })
            .collect())
    }

    /// Create an intake type
    pub async fn create_intake_type(&self, input: CreateIntakeTypeInput) -> AppResult<IntakeType> {
        input.validate()?;

        let (id, name, priced) = sqlx::query_as::<_, (i64, String, bool)>(
            "INSERT INTO intake_types (name, priced) VALUES ($1, $2) RETURNING id, name, priced",
        )
        .bind(&input.name)
        .bind(input.priced)
        .fetch_one(&self.db)
        .await?;

        Ok(IntakeType { id, name, priced })
    }

    /// List intake types
    pub async fn list_intake_types(&self) -> AppResult<Vec<IntakeType>> {
        let rows = sqlx::query_as::<_, (i64, String, bool)>(
            "SELECT id, name, priced FROM intake_types ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, priced)| IntakeType { id, name, priced })
            .collect())
    }

    /// Create a package type together with the device types it bundles
    pub async fn create_package_type(
        &self,
        input: CreatePackageTypeInput,
    ) -> AppResult<PackageType> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO package_types (name) VALUES ($1) RETURNING id",
        )
        .bind(&input.name)
        .fetch_one(&mut *tx)
        .await?;

        for device_type_id in &input.device_type_ids {
            let inserted = sqlx::query(
                r#"
                INSERT INTO package_type_device_types (package_type_id, device_type_id)
                SELECT $1, id FROM device_types WHERE id = $2
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(id)
            .bind(device_type_id)
            .execute(&mut *tx)
            .await?;

            if inserted.rows_affected() == 0 {
                let exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM device_types WHERE id = $1)",
                )
                .bind(device_type_id)
                .fetch_one(&mut *tx)
                .await?;
                if !exists {
                    return Err(AppError::NotFound(format!("Device type {}", device_type_id)));
                }
            }
        }

        tx.commit().await?;

        let mut device_type_ids = input.device_type_ids;
        device_type_ids.sort_unstable();
        device_type_ids.dedup();
        Ok(PackageType {
            id,
            name: input.name,
            device_type_ids,
        })
    }

    /// List package types with their device types
    pub async fn list_package_types(&self) -> AppResult<Vec<PackageType>> {
        let rows = sqlx::query_as::<_, (i64, String, Vec<i64>)>(
            r#"
            SELECT p.id, p.name,
                   COALESCE(ARRAY_AGG(d.device_type_id ORDER BY d.device_type_id)
                            FILTER (WHERE d.device_type_id IS NOT NULL), '{}') AS device_type_ids
            FROM package_types p
            LEFT JOIN package_type_device_types d ON d.package_type_id = p.id
            GROUP BY p.id, p.name
            ORDER BY p.name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, device_type_ids)| PackageType {
                id,
                name,
                device_type_ids,
            })
            .collect())
    }
}
