//! Movement service: stage-change requests and their audit trail

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{validate_new_request, DeviceKind, DeviceStage, MovementRequest, StageChange};
use crate::services::catalog::CatalogService;
use crate::services::device::{lock_devices_by_ids, save_lifecycle};
use crate::services::technician::ensure_can_handle;

/// Movement service applying bulk stage changes
#[derive(Clone)]
pub struct MovementService {
    db: PgPool,
}

/// Database row for movement request
#[derive(Debug, sqlx::FromRow)]
struct RequestRow {
    id: i64,
    source_stage: String,
    target_stage: String,
    device_type_id: i64,
    kind: String,
    quantity: i32,
    requested_by: Uuid,
    authorized_by: Option<Uuid>,
    applied_by: Option<Uuid>,
    completed: bool,
    rejected: bool,
    created_on: NaiveDate,
}

const REQUEST_COLUMNS: &str = "id, source_stage, target_stage, device_type_id, kind, quantity, \
     requested_by, authorized_by, applied_by, completed, rejected, created_on";

fn parse_stage(value: &str) -> AppResult<DeviceStage> {
    DeviceStage::from_str(value)
        .ok_or_else(|| AppError::Internal(format!("Unknown stage '{}' in storage", value)))
}

impl TryFrom<RequestRow> for MovementRequest {
    type Error = AppError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(MovementRequest {
            id: row.id,
            source_stage: parse_stage(&row.source_stage)?,
            target_stage: parse_stage(&row.target_stage)?,
            device_type_id: row.device_type_id,
            kind: DeviceKind::from_str(&row.kind)
                .ok_or_else(|| AppError::Internal(format!("Unknown kind '{}' in storage", row.kind)))?,
            quantity: row.quantity,
            requested_by: row.requested_by,
            authorized_by: row.authorized_by,
            applied_by: row.applied_by,
            completed: row.completed,
            rejected: row.rejected,
            created_on: row.created_on,
        })
    }
}

/// Database row for stage change
#[derive(Debug, sqlx::FromRow)]
struct StageChangeRow {
    request_id: i64,
    device_id: Uuid,
    stage_before: String,
    stage_after: String,
    changed_at: DateTime<Utc>,
    changed_by: Uuid,
}

impl TryFrom<StageChangeRow> for StageChange {
    type Error = AppError;

    fn try_from(row: StageChangeRow) -> Result<Self, Self::Error> {
        Ok(StageChange {
            request_id: row.request_id,
            device_id: row.device_id,
            stage_before: parse_stage(&row.stage_before)?,
            stage_after: parse_stage(&row.stage_after)?,
            changed_at: row.changed_at,
            changed_by: row.changed_by,
        })
    }
}

/// Input for creating a movement request
#[derive(Debug, Deserialize)]
pub struct CreateMovementInput {
    pub source_stage: DeviceStage,
    pub target_stage: DeviceStage,
    pub device_type_id: i64,
    pub quantity: i32,
}

/// Input for applying a movement request
#[derive(Debug, Deserialize, Validate)]
pub struct ApplyMovementInput {
    /// Candidate triage codes; devices of other kinds are skipped
    #[validate(length(min = 1))]
    pub triages: Vec<String>,
}

/// Result of applying a movement request
#[derive(Debug, Serialize)]
pub struct ApplyMovementResult {
    pub request: MovementRequest,
    pub moved: usize,
    pub audited: usize,
    pub skipped: usize,
}

impl MovementService {
    /// Create a new MovementService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Open a movement request for a triaged device type
    pub async fn create_request(
        &self,
        user_id: Uuid,
        input: CreateMovementInput,
    ) -> AppResult<MovementRequest> {
        validate_new_request(input.quantity)?;
        {
            let mut conn = self.db.acquire().await?;
            ensure_can_handle(&mut conn, user_id, input.device_type_id).await?;
        }

        let (_, kind) = CatalogService::new(self.db.clone())
            .triaged_kind(input.device_type_id)
            .await?;

        let row = sqlx::query_as::<_, RequestRow>(&format!(
            r#"
            INSERT INTO movement_requests (source_stage, target_stage, device_type_id, kind, quantity, requested_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(input.source_stage.as_str())
        .bind(input.target_stage.as_str())
        .bind(input.device_type_id)
        .bind(kind.as_str())
        .bind(input.quantity)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            request_id = row.id,
            kind = kind.as_str(),
            from = input.source_stage.as_str(),
            to = input.target_stage.as_str(),
            "Movement request created"
        );
        row.try_into()
    }

    /// Get a movement request by ID
    pub async fn get_request(&self, request_id: i64) -> AppResult<MovementRequest> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {} FROM movement_requests WHERE id = $1",
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Movement request {}", request_id)))?;

        row.try_into()
    }

    /// List open movement requests, oldest first
    pub async fn list_open_requests(&self) -> AppResult<Vec<MovementRequest>> {
        let rows = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {} FROM movement_requests WHERE NOT completed ORDER BY id",
            REQUEST_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(MovementRequest::try_from).collect()
    }

    /// Apply a request to the candidate devices in one transaction.
    ///
    /// The request and candidate rows are locked, so overlapping requests are
    /// applied one after the other.
    pub async fn apply_movement(
        &self,
        user_id: Uuid,
        request_id: i64,
        input: ApplyMovementInput,
    ) -> AppResult<ApplyMovementResult> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let mut request: MovementRequest = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {} FROM movement_requests WHERE id = $1 FOR UPDATE",
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Movement request {}", request_id)))?
        .try_into()?;

        if request.completed {
            return Err(AppError::RequestAlreadyCompleted(request.id));
        }
        ensure_can_handle(&mut tx, user_id, request.device_type_id).await?;

        let ids = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, triage FROM devices WHERE triage = ANY($1)",
        )
        .bind(&input.triages)
        .fetch_all(&mut *tx)
        .await?;
        if let Some(missing) = input
            .triages
            .iter()
            .find(|t| !ids.iter().any(|(_, triage)| triage == *t))
        {
            return Err(AppError::NotFound(format!("Device {}", missing)));
        }

        let ids: Vec<Uuid> = ids.into_iter().map(|(id, _)| id).collect();
        let mut devices = lock_devices_by_ids(&mut tx, &ids).await?;

        let now = Utc::now();
        let outcome = request.apply(&mut devices, user_id, now)?;

        for device in devices.iter().filter(|d| outcome.moved.contains(&d.id)) {
            save_lifecycle(&mut tx, device).await?;
        }

        for change in &outcome.changes {
            sqlx::query(
                r#"
                INSERT INTO stage_changes (request_id, device_id, stage_before, stage_after, changed_at, changed_by)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(change.request_id)
            .bind(change.device_id)
            .bind(change.stage_before.as_str())
            .bind(change.stage_after.as_str())
            .bind(change.changed_at)
            .bind(change.changed_by)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE movement_requests SET completed = TRUE, applied_by = $1 WHERE id = $2")
            .bind(request.applied_by)
            .bind(request.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = request.id,
            moved = outcome.moved.len(),
            audited = outcome.changes.len(),
            skipped = outcome.skipped,
            "Movement request applied"
        );

        Ok(ApplyMovementResult {
            request,
            moved: outcome.moved.len(),
            audited: outcome.changes.len(),
            skipped: outcome.skipped,
        })
    }

    /// Turn a request down without moving anything
    pub async fn reject_request(&self, user_id: Uuid, request_id: i64) -> AppResult<MovementRequest> {
        let mut tx = self.db.begin().await?;

        let mut request: MovementRequest = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {} FROM movement_requests WHERE id = $1 FOR UPDATE",
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Movement request {}", request_id)))?
        .try_into()?;

        request.reject(user_id)?;

        sqlx::query(
            "UPDATE movement_requests SET completed = TRUE, rejected = TRUE, authorized_by = $1 WHERE id = $2",
        )
        .bind(user_id)
        .bind(request.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(request_id = request.id, "Movement request rejected");
        Ok(request)
    }

    /// Stage changes recorded for a request
    pub async fn changes_for_request(&self, request_id: i64) -> AppResult<Vec<StageChange>> {
        let rows = sqlx::query_as::<_, StageChangeRow>(
            r#"
            SELECT request_id, device_id, stage_before, stage_after, changed_at, changed_by
            FROM stage_changes WHERE request_id = $1 ORDER BY id
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(StageChange::try_from).collect()
    }

    /// Stage history of a device, oldest first
    pub async fn changes_for_device(&self, triage: &str) -> AppResult<Vec<StageChange>> {
        let device_id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM devices WHERE triage = $1")
            .bind(triage)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Device {}", triage)))?;

        let rows = sqlx::query_as::<_, StageChangeRow>(
            r#"
            SELECT request_id, device_id, stage_before, stage_after, changed_at, changed_by
            FROM stage_changes WHERE device_id = $1 ORDER BY changed_at, id
            "#,
        )
        .bind(device_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(StageChange::try_from).collect()
    }
}
