//! Technician service: which device types each technician may handle

use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{check_technician, TechnicianAssignment};

/// Technician service for device-type assignments
#[derive(Clone)]
pub struct TechnicianService {
    db: PgPool,
}

/// Input for replacing a technician's device types
#[derive(Debug, Deserialize)]
pub struct SetAssignmentInput {
    pub device_type_ids: Vec<i64>,
}

/// Assignment of a user, if one is on record
pub(crate) async fn load_assignment(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> AppResult<Option<TechnicianAssignment>> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM technician_assignments WHERE user_id = $1)",
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;
    if !exists {
        return Ok(None);
    }

    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT device_type_id FROM technician_device_types WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(TechnicianAssignment::new(user_id, ids)))
}

/// Fail when the user has an assignment that leaves this device type out
pub(crate) async fn ensure_can_handle(
    conn: &mut PgConnection,
    user_id: Uuid,
    device_type_id: i64,
) -> AppResult<()> {
    let assignment = load_assignment(conn, user_id).await?;
    check_technician(assignment.as_ref(), device_type_id)?;
    Ok(())
}

impl TechnicianService {
    /// Create a new TechnicianService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get_assignment(&self, user_id: Uuid) -> AppResult<TechnicianAssignment> {
        let mut conn = self.db.acquire().await?;
        load_assignment(&mut conn, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Technician assignment for {}", user_id)))
    }

    /// Replace the device types of a technician
    pub async fn set_assignment(
        &self,
        user_id: Uuid,
        input: SetAssignmentInput,
    ) -> AppResult<TechnicianAssignment> {
        let assignment = TechnicianAssignment::new(user_id, input.device_type_ids);

        let mut tx = self.db.begin().await?;

        let known = sqlx::query_scalar::<_, i64>("SELECT id FROM device_types WHERE id = ANY($1)")
            .bind(&assignment.device_type_ids)
            .fetch_all(&mut *tx)
            .await?;
        if let Some(missing) = assignment
            .device_type_ids
            .iter()
            .find(|id| !known.contains(id))
        {
            return Err(AppError::NotFound(format!("Device type {}", missing)));
        }

        sqlx::query(
            r#"
            INSERT INTO technician_assignments (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM technician_device_types WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO technician_device_types (user_id, device_type_id)
            SELECT $1, id FROM UNNEST($2::BIGINT[]) AS id
            "#,
        )
        .bind(user_id)
        .bind(&assignment.device_type_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(%user_id, device_types = assignment.device_type_ids.len(), "Technician assignment set");
        Ok(assignment)
    }

    /// Drop an assignment; the user becomes unrestricted again
    pub async fn remove_assignment(&self, user_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM technician_assignments WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Technician assignment for {}", user_id)));
        }

        tracing::info!(%user_id, "Technician assignment removed");
        Ok(())
    }
}
