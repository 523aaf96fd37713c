//! Package service: delivery bundles, device assignment and approval

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    accounting_approve_device, accounting_reject_device, approve_assignments, check_assignable,
    check_delivery_open, next_package_indices, AccountingOutcome, Package, PackageAssignment,
};
use crate::services::device::{lock_device_by_triage, lock_devices_by_ids, save_lifecycle};
use crate::services::technician::ensure_can_handle;

/// Package service for delivery bundles
#[derive(Clone)]
pub struct PackageService {
    db: PgPool,
}

/// Database row for package
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PackageRow {
    id: i64,
    delivery_id: i64,
    package_index: i32,
    package_type_id: Option<i64>,
    approved: bool,
    approved_kardex: bool,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl From<PackageRow> for Package {
    fn from(row: PackageRow) -> Self {
        Package {
            id: row.id,
            delivery_id: row.delivery_id,
            index: row.package_index,
            package_type_id: row.package_type_id,
            approved: row.approved,
            approved_kardex: row.approved_kardex,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

pub(crate) const PACKAGE_COLUMNS: &str = "id, delivery_id, package_index, package_type_id, \
     approved, approved_kardex, created_by, created_at";

/// Database row for package assignment
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AssignmentRow {
    id: i64,
    package_id: i64,
    device_id: Uuid,
    assigned_by: Uuid,
    assigned_at: DateTime<Utc>,
    approved: bool,
    approved_at: Option<DateTime<Utc>>,
    approved_by: Option<Uuid>,
}

impl From<AssignmentRow> for PackageAssignment {
    fn from(row: AssignmentRow) -> Self {
        PackageAssignment {
            id: row.id,
            package_id: row.package_id,
            device_id: row.device_id,
            assigned_by: row.assigned_by,
            assigned_at: row.assigned_at,
            approved: row.approved,
            approved_at: row.approved_at,
            approved_by: row.approved_by,
        }
    }
}

pub(crate) const ASSIGNMENT_COLUMNS: &str = "id, package_id, device_id, assigned_by, assigned_at, \
     approved, approved_at, approved_by";

/// Persist the approval fields of an assignment
pub(crate) async fn save_assignment(
    conn: &mut PgConnection,
    assignment: &PackageAssignment,
) -> AppResult<()> {
    sqlx::query(
        "UPDATE package_assignments SET approved = $1, approved_at = $2, approved_by = $3 WHERE id = $4",
    )
    .bind(assignment.approved)
    .bind(assignment.approved_at)
    .bind(assignment.approved_by)
    .bind(assignment.id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn save_package_flags(conn: &mut PgConnection, package: &Package) -> AppResult<()> {
    sqlx::query("UPDATE packages SET approved = $1, approved_kardex = $2 WHERE id = $3")
        .bind(package.approved)
        .bind(package.approved_kardex)
        .bind(package.id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Input for creating packages
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePackagesInput {
    #[validate(range(min = 1))]
    pub count: i32,
    pub package_type_id: Option<i64>,
}

/// Input for assigning a device to a package
#[derive(Debug, Deserialize, Validate)]
pub struct AssignDeviceInput {
    #[validate(length(min = 1, max = 30))]
    pub triage: String,
}

/// Accounting decision target
#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AccountingInput {
    /// Whole package, reviewed against the kardex
    Kardex { package_id: i64 },
    /// Single device within a delivery
    Device { delivery_id: i64, triage: String },
}

impl PackageService {
    /// Create a new PackageService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Append packages to a delivery. Indices continue after the highest index
    /// ever issued for that delivery.
    pub async fn create_packages(
        &self,
        user_id: Uuid,
        delivery_id: i64,
        input: CreatePackagesInput,
        max_batch_size: u32,
    ) -> AppResult<Vec<Package>> {
        input.validate()?;
        if input.count as i64 > max_batch_size as i64 {
            return Err(AppError::Validation {
                field: "count".to_string(),
                message: format!("At most {} packages can be created at once", max_batch_size),
                message_es: format!("Se pueden crear como máximo {} paquetes a la vez", max_batch_size),
            });
        }

        let mut tx = self.db.begin().await?;

        let (highest, in_creation) = sqlx::query_as::<_, (i32, bool)>(
            "SELECT last_package_index, in_creation FROM deliveries WHERE id = $1 FOR UPDATE",
        )
        .bind(delivery_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Delivery {}", delivery_id)))?;

        check_delivery_open(delivery_id, in_creation)?;

        let indices = next_package_indices(highest, input.count)?;
        let mut packages = Vec::with_capacity(indices.len());
        for index in &indices {
            let row = sqlx::query_as::<_, PackageRow>(&format!(
                r#"
                INSERT INTO packages (delivery_id, package_index, package_type_id, created_by)
                VALUES ($1, $2, $3, $4)
                RETURNING {}
                "#,
                PACKAGE_COLUMNS
            ))
            .bind(delivery_id)
            .bind(index)
            .bind(input.package_type_id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
            packages.push(Package::from(row));
        }

        if let Some(last) = indices.last() {
            sqlx::query("UPDATE deliveries SET last_package_index = $1 WHERE id = $2")
                .bind(last)
                .bind(delivery_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(delivery_id, created = packages.len(), "Packages created");
        Ok(packages)
    }

    /// List the packages of a delivery by index
    pub async fn list_packages(&self, delivery_id: i64) -> AppResult<Vec<Package>> {
        let rows = sqlx::query_as::<_, PackageRow>(&format!(
            "SELECT {} FROM packages WHERE delivery_id = $1 ORDER BY package_index",
            PACKAGE_COLUMNS
        ))
        .bind(delivery_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Remove an empty package. Its index is not reused.
    pub async fn remove_package(&self, package_id: i64) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        self.lock_package(&mut tx, package_id).await?;

        let assigned = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM package_assignments WHERE package_id = $1",
        )
        .bind(package_id)
        .fetch_one(&mut *tx)
        .await?;
        if assigned > 0 {
            return Err(AppError::Conflict {
                resource: "package".to_string(),
                message: format!("Package {} still holds {} devices", package_id, assigned),
                message_es: format!("El paquete {} aún contiene {} dispositivos", package_id, assigned),
            });
        }

        sqlx::query("DELETE FROM packages WHERE id = $1")
            .bind(package_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(package_id, "Package removed");
        Ok(())
    }

    /// Assign a device to a package; the assignment starts unapproved
    pub async fn assign_device(
        &self,
        user_id: Uuid,
        package_id: i64,
        input: AssignDeviceInput,
    ) -> AppResult<PackageAssignment> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        self.lock_package(&mut tx, package_id).await?;
        let device = lock_device_by_triage(&mut tx, &input.triage).await?;
        ensure_can_handle(&mut tx, user_id, device.device_type_id).await?;

        let already_assigned = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM package_assignments WHERE device_id = $1)",
        )
        .bind(device.id)
        .fetch_one(&mut *tx)
        .await?;
        check_assignable(&device, already_assigned)?;

        let row = sqlx::query_as::<_, AssignmentRow>(&format!(
            r#"
            INSERT INTO package_assignments (package_id, device_id, assigned_by)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            ASSIGNMENT_COLUMNS
        ))
        .bind(package_id)
        .bind(device.id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(package_id, triage = %device.triage, "Device assigned to package");
        Ok(row.into())
    }

    /// Take a device back out of a package while its delivery is still in creation
    pub async fn unassign_device(&self, package_id: i64, triage: &str) -> AppResult<()> {
        let delivery_id = sqlx::query_scalar::<_, i64>("SELECT delivery_id FROM packages WHERE id = $1")
            .bind(package_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Package {}", package_id)))?;

        let mut tx = self.db.begin().await?;

        // Delivery before package, the order finalize takes them in
        let in_creation = sqlx::query_scalar::<_, bool>(
            "SELECT in_creation FROM deliveries WHERE id = $1 FOR UPDATE",
        )
        .bind(delivery_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Delivery {}", delivery_id)))?;
        check_delivery_open(delivery_id, in_creation)?;
        self.lock_package(&mut tx, package_id).await?;

        let removed = sqlx::query(
            r#"
            DELETE FROM package_assignments a
            USING devices d
            WHERE a.device_id = d.id AND a.package_id = $1 AND d.triage = $2
            "#,
        )
        .bind(package_id)
        .bind(triage)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if removed == 0 {
            return Err(AppError::NotFound(format!(
                "Assignment of {} in package {}",
                triage, package_id
            )));
        }

        tx.commit().await?;

        tracing::info!(package_id, triage = %triage, "Device removed from package");
        Ok(())
    }

    /// Assignments of a package
    pub async fn list_assignments(&self, package_id: i64) -> AppResult<Vec<PackageAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {} FROM package_assignments WHERE package_id = $1 ORDER BY id",
            ASSIGNMENT_COLUMNS
        ))
        .bind(package_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Approve every assignment of a package at once
    pub async fn approve_package_batch(
        &self,
        user_id: Uuid,
        package_id: i64,
    ) -> AppResult<Vec<PackageAssignment>> {
        let mut tx = self.db.begin().await?;
        self.lock_package(&mut tx, package_id).await?;

        let mut assignments: Vec<PackageAssignment> = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {} FROM package_assignments WHERE package_id = $1 ORDER BY id FOR UPDATE",
            ASSIGNMENT_COLUMNS
        ))
        .bind(package_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        let approved = approve_assignments(&mut assignments, user_id, Utc::now());
        for assignment in &assignments {
            save_assignment(&mut tx, assignment).await?;
        }

        tx.commit().await?;

        tracing::info!(package_id, approved, "Package assignments approved");
        Ok(assignments)
    }

    /// Accounting approval of a package (kardex) or of one device
    pub async fn accounting_approve(&self, input: AccountingInput) -> AppResult<AccountingOutcome> {
        let mut tx = self.db.begin().await?;

        let outcome = match input {
            AccountingInput::Kardex { package_id } => {
                let mut package = self.lock_package(&mut tx, package_id).await?;
                package.approve_kardex();
                save_package_flags(&mut tx, &package).await?;
                tracing::info!(package_id, "Package approved by accounting");
                AccountingOutcome::package_approved()
            }
            AccountingInput::Device { delivery_id, triage } => {
                let assignment = self.assignment_in_delivery(&mut tx, delivery_id, &triage).await?;
                match assignment {
                    None => {
                        tracing::info!(delivery_id, triage = %triage, "Device not in delivery");
                        AccountingOutcome::not_in_delivery()
                    }
                    Some(assignment) => {
                        let mut devices = lock_devices_by_ids(&mut tx, &[assignment.device_id]).await?;
                        let device = devices
                            .first_mut()
                            .ok_or_else(|| AppError::NotFound(format!("Device {}", triage)))?;
                        accounting_approve_device(device)?;
                        save_lifecycle(&mut tx, device).await?;
                        tracing::info!(delivery_id, triage = %triage, "Device approved by accounting");
                        AccountingOutcome::approved()
                    }
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Accounting rejection of a package (kardex) or of one device.
    /// A rejected device goes back to Pending and loses its assignment approval.
    pub async fn accounting_reject(&self, input: AccountingInput) -> AppResult<AccountingOutcome> {
        let mut tx = self.db.begin().await?;

        let outcome = match input {
            AccountingInput::Kardex { package_id } => {
                let mut package = self.lock_package(&mut tx, package_id).await?;
                package.reject_kardex();
                save_package_flags(&mut tx, &package).await?;
                tracing::info!(package_id, "Package rejected by accounting");
                AccountingOutcome::package_rejected()
            }
            AccountingInput::Device { delivery_id, triage } => {
                let mut device = lock_device_by_triage(&mut tx, &triage).await?;
                let mut assignment = self
                    .assignment_in_delivery(&mut tx, delivery_id, &triage)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("Assignment of {} in delivery {}", triage, delivery_id))
                    })?;

                accounting_reject_device(&mut device, &mut assignment);
                save_lifecycle(&mut tx, &device).await?;
                save_assignment(&mut tx, &assignment).await?;
                tracing::info!(delivery_id, triage = %triage, stage = device.stage.as_str(), "Device rejected by accounting");
                AccountingOutcome::rejected()
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn lock_package(&self, conn: &mut PgConnection, package_id: i64) -> AppResult<Package> {
        let row = sqlx::query_as::<_, PackageRow>(&format!(
            "SELECT {} FROM packages WHERE id = $1 FOR UPDATE",
            PACKAGE_COLUMNS
        ))
        .bind(package_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Package {}", package_id)))?;

        Ok(row.into())
    }

    async fn assignment_in_delivery(
        &self,
        conn: &mut PgConnection,
        delivery_id: i64,
        triage: &str,
    ) -> AppResult<Option<PackageAssignment>> {
        let row = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT a.id, a.package_id, a.device_id, a.assigned_by, a.assigned_at,
                   a.approved, a.approved_at, a.approved_by
            FROM package_assignments a
            JOIN packages p ON p.id = a.package_id
            JOIN devices d ON d.id = a.device_id
            WHERE d.triage = $1 AND p.delivery_id = $2
            FOR UPDATE OF a
            "#,
        )
        .bind(triage)
        .bind(delivery_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(Into::into))
    }
}
