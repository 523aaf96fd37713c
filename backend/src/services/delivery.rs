//! Delivery service: outbound batches, reviews and finalization

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{check_delivery_open, check_finalizable, Delivery, DeliveryReview, Package, PackageAssignment};
use crate::services::device::{lock_devices_by_ids, save_lifecycle};
use crate::services::package::{AssignmentRow, PackageRow, ASSIGNMENT_COLUMNS, PACKAGE_COLUMNS};

/// Delivery service for outbound batches
#[derive(Clone)]
pub struct DeliveryService {
    db: PgPool,
}

/// Database row for delivery
#[derive(Debug, sqlx::FromRow)]
struct DeliveryRow {
    id: i64,
    delivery_type_id: i64,
    date: NaiveDate,
    school_code: Option<String>,
    is_delivery: bool,
    in_creation: bool,
    needs_review: bool,
    notes: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl From<DeliveryRow> for Delivery {
    fn from(row: DeliveryRow) -> Self {
        Delivery {
            id: row.id,
            delivery_type_id: row.delivery_type_id,
            date: row.date,
            school_code: row.school_code,
            is_delivery: row.is_delivery,
            in_creation: row.in_creation,
            needs_review: row.needs_review,
            notes: row.notes,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

const DELIVERY_COLUMNS: &str = "id, delivery_type_id, date, school_code, is_delivery, \
     in_creation, needs_review, notes, created_by, created_at";

/// Database row for delivery review
#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: i64,
    delivery_id: i64,
    reviewed_by: Uuid,
    reviewed_at: DateTime<Utc>,
    notes: Option<String>,
    approved: bool,
}

impl From<ReviewRow> for DeliveryReview {
    fn from(row: ReviewRow) -> Self {
        DeliveryReview {
            id: row.id,
            delivery_id: row.delivery_id,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at,
            notes: row.notes,
            approved: row.approved,
        }
    }
}

/// Input for creating a delivery
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDeliveryInput {
    pub delivery_type_id: i64,
    pub date: NaiveDate,
    #[validate(length(max = 30))]
    pub school_code: Option<String>,
    #[serde(default = "default_true")]
    pub is_delivery: bool,
    pub notes: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Input for reviewing a delivery
#[derive(Debug, Deserialize, Validate)]
pub struct ReviewDeliveryInput {
    pub approved: bool,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Result of closing a delivery
#[derive(Debug, Serialize)]
pub struct FinalizeDeliveryResult {
    pub delivery: Delivery,
    pub packages: usize,
    pub delivered: usize,
}

impl DeliveryService {
    /// Create a new DeliveryService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Open a delivery; it starts in creation and awaiting review
    pub async fn create_delivery(&self, user_id: Uuid, input: CreateDeliveryInput) -> AppResult<Delivery> {
        input.validate()?;

        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            r#"
            INSERT INTO deliveries (delivery_type_id, date, school_code, is_delivery, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            DELIVERY_COLUMNS
        ))
        .bind(input.delivery_type_id)
        .bind(input.date)
        .bind(&input.school_code)
        .bind(input.is_delivery)
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(delivery_id = row.id, school = ?row.school_code, "Delivery created");
        Ok(row.into())
    }

    /// Get a delivery by ID
    pub async fn get_delivery(&self, delivery_id: i64) -> AppResult<Delivery> {
        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            "SELECT {} FROM deliveries WHERE id = $1",
            DELIVERY_COLUMNS
        ))
        .bind(delivery_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Delivery {}", delivery_id)))?;

        Ok(row.into())
    }

    /// List deliveries, newest first
    pub async fn list_deliveries(&self, in_creation: Option<bool>) -> AppResult<Vec<Delivery>> {
        let rows = sqlx::query_as::<_, DeliveryRow>(&format!(
            "SELECT {} FROM deliveries WHERE ($1::boolean IS NULL OR in_creation = $1) ORDER BY date DESC, id DESC",
            DELIVERY_COLUMNS
        ))
        .bind(in_creation)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Record a review. An approving review clears the review flag.
    pub async fn review_delivery(
        &self,
        user_id: Uuid,
        delivery_id: i64,
        input: ReviewDeliveryInput,
    ) -> AppResult<DeliveryReview> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let in_creation = sqlx::query_scalar::<_, bool>(
            "SELECT in_creation FROM deliveries WHERE id = $1 FOR UPDATE",
        )
        .bind(delivery_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Delivery {}", delivery_id)))?;
        check_delivery_open(delivery_id, in_creation)?;

        let row = sqlx::query_as::<_, ReviewRow>(
            r#"
            INSERT INTO delivery_reviews (delivery_id, reviewed_by, notes, approved)
            VALUES ($1, $2, $3, $4)
            RETURNING id, delivery_id, reviewed_by, reviewed_at, notes, approved
            "#,
        )
        .bind(delivery_id)
        .bind(user_id)
        .bind(&input.notes)
        .bind(input.approved)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE deliveries SET needs_review = $1 WHERE id = $2")
            .bind(!input.approved)
            .bind(delivery_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(delivery_id, approved = input.approved, "Delivery reviewed");
        Ok(row.into())
    }

    /// Reviews of a delivery, oldest first
    pub async fn list_reviews(&self, delivery_id: i64) -> AppResult<Vec<DeliveryReview>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT id, delivery_id, reviewed_by, reviewed_at, notes, approved
            FROM delivery_reviews WHERE delivery_id = $1 ORDER BY reviewed_at, id
            "#,
        )
        .bind(delivery_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Close a delivery and hand its devices over, all in one transaction
    pub async fn finalize_delivery(&self, user_id: Uuid, delivery_id: i64) -> AppResult<FinalizeDeliveryResult> {
        let mut tx = self.db.begin().await?;

        let mut delivery: Delivery = sqlx::query_as::<_, DeliveryRow>(&format!(
            "SELECT {} FROM deliveries WHERE id = $1 FOR UPDATE",
            DELIVERY_COLUMNS
        ))
        .bind(delivery_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Delivery {}", delivery_id)))?
        .into();

        let packages: Vec<Package> = sqlx::query_as::<_, PackageRow>(&format!(
            "SELECT {} FROM packages WHERE delivery_id = $1 ORDER BY package_index FOR UPDATE",
            PACKAGE_COLUMNS
        ))
        .bind(delivery_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        let package_ids: Vec<i64> = packages.iter().map(|p| p.id).collect();
        let assignments: Vec<PackageAssignment> = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {} FROM package_assignments WHERE package_id = ANY($1) ORDER BY id FOR UPDATE",
            ASSIGNMENT_COLUMNS
        ))
        .bind(&package_ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        let device_ids: Vec<Uuid> = assignments.iter().map(|a| a.device_id).collect();
        let mut devices = lock_devices_by_ids(&mut tx, &device_ids).await?;

        check_finalizable(&delivery, &packages, &assignments, &devices)?;

        for device in devices.iter_mut() {
            device.deliver()?;
            save_lifecycle(&mut tx, device).await?;
        }

        sqlx::query("UPDATE deliveries SET in_creation = FALSE WHERE id = $1")
            .bind(delivery_id)
            .execute(&mut *tx)
            .await?;
        delivery.in_creation = false;

        tx.commit().await?;

        tracing::info!(
            delivery_id,
            packages = packages.len(),
            delivered = devices.len(),
            finalized_by = %user_id,
            "Delivery finalized"
        );

        Ok(FinalizeDeliveryResult {
            delivery,
            packages: packages.len(),
            delivered: devices.len(),
        })
    }
}
