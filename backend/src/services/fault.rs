//! Fault service: repair log per device

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::DeviceFault;
use crate::services::device::lock_device_by_triage;

#[derive(Clone)]
pub struct FaultService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct FaultRow {
    id: i64,
    device_id: Uuid,
    fault_description: String,
    solution_description: Option<String>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    completed: bool,
    reported_by: Uuid,
    repaired_by: Option<Uuid>,
}

impl From<FaultRow> for DeviceFault {
    fn from(row: FaultRow) -> Self {
        DeviceFault {
            id: row.id,
            device_id: row.device_id,
            fault_description: row.fault_description,
            solution_description: row.solution_description,
            started_at: row.started_at,
            ended_at: row.ended_at,
            completed: row.completed,
            reported_by: row.reported_by,
            repaired_by: row.repaired_by,
        }
    }
}

const FAULT_COLUMNS: &str = "id, device_id, fault_description, solution_description, \
     started_at, ended_at, completed, reported_by, repaired_by";

#[derive(Debug, Deserialize, Validate)]
pub struct ReportFaultInput {
    #[validate(length(min = 1, max = 500))]
    pub fault_description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResolveFaultInput {
    #[validate(length(min = 1, max = 500))]
    pub solution_description: String,
}

impl FaultService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Open a fault against a device
    pub async fn report_fault(
        &self,
        user_id: Uuid,
        triage: &str,
        input: ReportFaultInput,
    ) -> AppResult<DeviceFault> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let device = lock_device_by_triage(&mut tx, triage).await?;

        let row = sqlx::query_as::<_, FaultRow>(&format!(
            r#"
            INSERT INTO device_faults (device_id, fault_description, reported_by)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            FAULT_COLUMNS
        ))
        .bind(device.id)
        .bind(input.fault_description.trim())
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(fault_id = row.id, triage = %device.triage, "Fault reported");
        Ok(row.into())
    }

    /// Close a fault with its solution; a fault is resolved once
    pub async fn resolve_fault(
        &self,
        user_id: Uuid,
        fault_id: i64,
        input: ResolveFaultInput,
    ) -> AppResult<DeviceFault> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let mut fault: DeviceFault = sqlx::query_as::<_, FaultRow>(&format!(
            "SELECT {} FROM device_faults WHERE id = $1 FOR UPDATE",
            FAULT_COLUMNS
        ))
        .bind(fault_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Fault {}", fault_id)))?
        .into();

        if fault.completed {
            return Err(AppError::Conflict {
                resource: "fault".to_string(),
                message: format!("Fault {} is already resolved", fault_id),
                message_es: format!("La falla {} ya fue resuelta", fault_id),
            });
        }
        fault.resolve(input.solution_description, user_id, Utc::now())?;

        sqlx::query(
            r#"
            UPDATE device_faults
            SET solution_description = $1, ended_at = $2, completed = TRUE, repaired_by = $3
            WHERE id = $4
            "#,
        )
        .bind(&fault.solution_description)
        .bind(fault.ended_at)
        .bind(fault.repaired_by)
        .bind(fault.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(fault_id, "Fault resolved");
        Ok(fault)
    }

    /// Faults of a device, open ones first
    pub async fn list_faults(&self, triage: &str) -> AppResult<Vec<DeviceFault>> {
        let rows = sqlx::query_as::<_, FaultRow>(&format!(
            r#"
            SELECT {}
            FROM device_faults
            WHERE device_id = (SELECT id FROM devices WHERE triage = $1)
            ORDER BY completed, started_at DESC
            "#,
            FAULT_COLUMNS
        ))
        .bind(triage)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
