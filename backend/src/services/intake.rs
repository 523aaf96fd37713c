//! Intake service: incoming batches, pricing and device materialization

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    intake_totals, price_details, resolve_specialization, DeviceSpecs, Intake,
    IntakeDetail, IntakeDiscount, IntakeTotals, MaterializeReport, NewIntakeDetail, SparePart,
    SpareState,
};
use shared::validate_amount;

/// Intake service for the intake ledger
#[derive(Clone)]
pub struct IntakeService {
    db: PgPool,
}

/// Database row for intake
#[derive(Debug, sqlx::FromRow)]
struct IntakeRow {
    id: i64,
    intake_type_id: i64,
    date: NaiveDate,
    in_creation: bool,
    donor_name: String,
    created_by: Uuid,
    received_by: Uuid,
    created_at: DateTime<Utc>,
}

impl From<IntakeRow> for Intake {
    fn from(row: IntakeRow) -> Self {
        Intake {
            id: row.id,
            intake_type_id: row.intake_type_id,
            date: row.date,
            in_creation: row.in_creation,
            donor_name: row.donor_name,
            created_by: row.created_by,
            received_by: row.received_by,
            created_at: row.created_at,
        }
    }
}

/// Database row for intake detail
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DetailRow {
    id: i64,
    intake_id: i64,
    device_type_id: i64,
    usable: i32,
    for_parts: i32,
    scrap: i32,
    total: i32,
    unit_price: Option<Decimal>,
    subtotal: Option<Decimal>,
    discounted_unit_price: Option<Decimal>,
    total_price: Option<Decimal>,
    created_by: Uuid,
}

impl From<DetailRow> for IntakeDetail {
    fn from(row: DetailRow) -> Self {
        IntakeDetail {
            id: row.id,
            intake_id: row.intake_id,
            device_type_id: row.device_type_id,
            usable: row.usable,
            for_parts: row.for_parts,
            scrap: row.scrap,
            total: row.total,
            unit_price: row.unit_price,
            subtotal: row.subtotal,
            discounted_unit_price: row.discounted_unit_price,
            total_price: row.total_price,
            created_by: row.created_by,
        }
    }
}

pub(crate) const DETAIL_COLUMNS: &str = "id, intake_id, device_type_id, usable, for_parts, scrap, total, \
     unit_price, subtotal, discounted_unit_price, total_price, created_by";

/// Database row for spare part
#[derive(Debug, sqlx::FromRow)]
struct SpareRow {
    id: i64,
    intake_id: i64,
    device_type_id: i64,
    state: String,
    description: Option<String>,
    available: bool,
    pallet_id: Option<i64>,
    valid: bool,
    price: Option<Decimal>,
}

impl TryFrom<SpareRow> for SparePart {
    type Error = AppError;

    fn try_from(row: SpareRow) -> Result<Self, Self::Error> {
        let state = SpareState::from_str(&row.state)
            .ok_or_else(|| AppError::Internal(format!("Spare part {} has unknown state", row.id)))?;
        Ok(SparePart {
            id: row.id,
            intake_id: row.intake_id,
            device_type_id: row.device_type_id,
            state,
            description: row.description,
            available: row.available,
            pallet_id: row.pallet_id,
            valid: row.valid,
            price: row.price,
        })
    }
}

/// Input for creating an intake
#[derive(Debug, Deserialize, Validate)]
pub struct CreateIntakeInput {
    pub intake_type_id: i64,
    pub date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 100))]
    pub donor_name: String,
    pub received_by: Option<Uuid>,
}

/// Input for recording an intake detail
#[derive(Debug, Deserialize, Validate)]
pub struct RecordDetailInput {
    pub device_type_id: i64,
    #[validate(range(min = 0, max = 100_000))]
    pub usable: i32,
    #[validate(range(min = 0, max = 100_000))]
    pub for_parts: i32,
    #[validate(range(min = 0, max = 100_000))]
    pub scrap: i32,
    pub subtotal: Option<Decimal>,
}

/// Input for adding an intake discount
#[derive(Debug, Deserialize, Validate)]
pub struct AddDiscountInput {
    pub amount: Decimal,
    #[validate(length(max = 200))]
    pub description: Option<String>,
}

/// Input for materializing devices or spare parts from a detail
#[derive(Debug, Default, Deserialize, Validate)]
pub struct MaterializeInput {
    /// Units to create; defaults to the detail's usable (devices) or for_parts (spares)
    #[validate(range(min = 1))]
    pub count: Option<u32>,
}

/// Intake with its details, discounts and totals
#[derive(Debug, Serialize)]
pub struct IntakeSummary {
    #[serde(flatten)]
    pub intake: Intake,
    pub details: Vec<IntakeDetail>,
    pub discounts: Vec<IntakeDiscount>,
    pub totals: IntakeTotals,
}

impl IntakeService {
    /// Create a new IntakeService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Open a new intake
    pub async fn create_intake(&self, user_id: Uuid, input: CreateIntakeInput) -> AppResult<Intake> {
        input.validate()?;

        let type_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM intake_types WHERE id = $1)")
                .bind(input.intake_type_id)
                .fetch_one(&self.db)
                .await?;
        if !type_exists {
            return Err(AppError::NotFound(format!("Intake type {}", input.intake_type_id)));
        }

        let row = sqlx::query_as::<_, IntakeRow>(
            r#"
            INSERT INTO intakes (intake_type_id, date, donor_name, created_by, received_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, intake_type_id, date, in_creation, donor_name, created_by, received_by, created_at
            "#,
        )
        .bind(input.intake_type_id)
        .bind(input.date.unwrap_or_else(|| Utc::now().date_naive()))
        .bind(&input.donor_name)
        .bind(user_id)
        .bind(input.received_by.unwrap_or(user_id))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(intake_id = row.id, "Intake created");
        Ok(row.into())
    }

    /// List intakes, newest first
    pub async fn list_intakes(&self) -> AppResult<Vec<Intake>> {
        let rows = sqlx::query_as::<_, IntakeRow>(
            r#"
            SELECT id, intake_type_id, date, in_creation, donor_name, created_by, received_by, created_at
            FROM intakes
            ORDER BY date DESC, id DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get an intake with details, discounts and totals
    pub async fn get_intake(&self, intake_id: i64) -> AppResult<IntakeSummary> {
        let intake: Intake = sqlx::query_as::<_, IntakeRow>(
            r#"
            SELECT id, intake_type_id, date, in_creation, donor_name, created_by, received_by, created_at
            FROM intakes WHERE id = $1
            "#,
        )
        .bind(intake_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Intake {}", intake_id)))?
        .into();

        let details = sqlx::query_as::<_, DetailRow>(&format!(
            "SELECT {} FROM intake_details WHERE intake_id = $1 ORDER BY id",
            DETAIL_COLUMNS
        ))
        .bind(intake_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(IntakeDetail::from)
        .collect::<Vec<_>>();

        let discounts = sqlx::query_as::<_, (i64, i64, Decimal, Option<String>)>(
            "SELECT id, intake_id, amount, description FROM intake_discounts WHERE intake_id = $1 ORDER BY id",
        )
        .bind(intake_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|(id, intake_id, amount, description)| IntakeDiscount {
            id,
            intake_id,
            amount,
            description,
        })
        .collect::<Vec<_>>();

        let totals = intake_totals(&details, &discounts);
        Ok(IntakeSummary {
            intake,
            details,
            discounts,
            totals,
        })
    }

    /// Record the quantity of one device type received in an intake.
    /// Priced intake types require a subtotal.
    pub async fn record_intake(
        &self,
        user_id: Uuid,
        intake_id: i64,
        input: RecordDetailInput,
    ) -> AppResult<IntakeDetail> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let priced = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT t.priced
            FROM intakes i
            JOIN intake_types t ON t.id = i.intake_type_id
            WHERE i.id = $1
            FOR UPDATE OF i
            "#,
        )
        .bind(intake_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Intake {}", intake_id)))?;

        let new_detail = NewIntakeDetail {
            device_type_id: input.device_type_id,
            usable: input.usable,
            for_parts: input.for_parts,
            scrap: input.scrap,
            subtotal: input.subtotal,
        };
        new_detail.validate(priced)?;
        let total = new_detail.total()?;

        let type_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM device_types WHERE id = $1)")
                .bind(input.device_type_id)
                .fetch_one(&mut *tx)
                .await?;
        if !type_exists {
            return Err(AppError::NotFound(format!("Device type {}", input.device_type_id)));
        }

        let detail_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO intake_details (intake_id, device_type_id, usable, for_parts, scrap, total, subtotal, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(intake_id)
        .bind(new_detail.device_type_id)
        .bind(new_detail.usable)
        .bind(new_detail.for_parts)
        .bind(new_detail.scrap)
        .bind(total)
        .bind(new_detail.subtotal)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let details = reprice(&mut tx, intake_id).await?;
        tx.commit().await?;

        tracing::info!(intake_id, detail_id, total, "Intake detail recorded");
        details
            .into_iter()
            .find(|d| d.id == detail_id)
            .ok_or_else(|| AppError::Internal(format!("Intake detail {} vanished", detail_id)))
    }

    /// Attach a discount to an intake and reprice its details
    pub async fn add_discount(
        &self,
        intake_id: i64,
        input: AddDiscountInput,
    ) -> AppResult<IntakeDiscount> {
        input.validate()?;
        validate_amount("amount", input.amount, 10)?;

        let mut tx = self.db.begin().await?;

        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM intakes WHERE id = $1 FOR UPDATE")
            .bind(intake_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!("Intake {}", intake_id)));
        }

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO intake_discounts (intake_id, amount, description) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(intake_id)
        .bind(input.amount)
        .bind(&input.description)
        .fetch_one(&mut *tx)
        .await?;

        reprice(&mut tx, intake_id).await?;
        tx.commit().await?;

        tracing::info!(intake_id, discount_id = id, amount = %input.amount, "Intake discount added");
        Ok(IntakeDiscount {
            id,
            intake_id,
            amount: input.amount,
            description: input.description,
        })
    }

    /// Create one device per unit of a detail.
    ///
    /// Each unit is its own insert that takes the next indice of its kind; a
    /// failed unit is counted and the rest continue.
    pub async fn materialize_devices(
        &self,
        user_id: Uuid,
        detail_id: i64,
        input: MaterializeInput,
        max_batch_size: u32,
    ) -> AppResult<MaterializeReport> {
        input.validate()?;
        let (detail, slug) = self.detail_with_slug(detail_id).await?;
        let kind = resolve_specialization(&slug)?;
        let count = self.batch_count(input.count, detail.usable, max_batch_size)?;
        let specs = Json(DeviceSpecs::empty(kind));

        let mut report = MaterializeReport::default();
        for _ in 0..count {
            let result = sqlx::query(
                r#"
                INSERT INTO devices (id, triage, kind, indice, device_type_id, intake_id, state, stage, specs)
                SELECT $1, $2 || '-' || next.indice, $3, next.indice, $4, $5, 'pending', 'stored', $6
                FROM (SELECT COALESCE(MAX(indice), 0) + 1 AS indice FROM devices WHERE kind = $3) AS next
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(kind.slug())
            .bind(kind.as_str())
            .bind(detail.device_type_id)
            .bind(detail.intake_id)
            .bind(&specs)
            .execute(&self.db)
            .await;

            if let Err(e) = &result {
                tracing::warn!(detail_id, kind = kind.as_str(), error = %e, "Device creation failed");
            }
            report.record(result.is_ok());
        }

        tracing::info!(
            detail_id,
            user_id = %user_id,
            created = report.created,
            failed = report.failed,
            "Devices materialized"
        );
        Ok(report)
    }

    /// Create one spare part per unit of a detail
    pub async fn materialize_spares(
        &self,
        user_id: Uuid,
        detail_id: i64,
        input: MaterializeInput,
        max_batch_size: u32,
    ) -> AppResult<MaterializeReport> {
        input.validate()?;
        let (detail, _) = self.detail_with_slug(detail_id).await?;
        let count = self.batch_count(input.count, detail.for_parts, max_batch_size)?;
        let price = detail.discounted_unit_price.or(detail.unit_price);

        let mut report = MaterializeReport::default();
        for _ in 0..count {
            let result = sqlx::query(
                r#"
                INSERT INTO spare_parts (intake_id, device_type_id, state, price)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(detail.intake_id)
            .bind(detail.device_type_id)
            .bind(SpareState::Stored.as_str())
            .bind(price)
            .execute(&self.db)
            .await;

            if let Err(e) = &result {
                tracing::warn!(detail_id, error = %e, "Spare part creation failed");
            }
            report.record(result.is_ok());
        }

        tracing::info!(
            detail_id,
            user_id = %user_id,
            created = report.created,
            failed = report.failed,
            "Spare parts materialized"
        );
        Ok(report)
    }

    /// List the spare parts of an intake
    pub async fn list_spares(&self, intake_id: i64) -> AppResult<Vec<SparePart>> {
        let rows = sqlx::query_as::<_, SpareRow>(
            r#"
            SELECT id, intake_id, device_type_id, state, description, available, pallet_id, valid, price
            FROM spare_parts WHERE intake_id = $1 ORDER BY id
            "#,
        )
        .bind(intake_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(SparePart::try_from).collect()
    }

    async fn detail_with_slug(&self, detail_id: i64) -> AppResult<(IntakeDetail, String)> {
        let row = sqlx::query_as::<_, DetailRow>(&format!(
            "SELECT {} FROM intake_details WHERE id = $1",
            DETAIL_COLUMNS
        ))
        .bind(detail_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Intake detail {}", detail_id)))?;

        let slug = sqlx::query_scalar::<_, String>("SELECT slug FROM device_types WHERE id = $1")
            .bind(row.device_type_id)
            .fetch_one(&self.db)
            .await?;

        Ok((row.into(), slug))
    }

    fn batch_count(&self, requested: Option<u32>, default: i32, max_batch_size: u32) -> AppResult<u32> {
        let count = requested.unwrap_or(default.max(0) as u32);
        if count > max_batch_size {
            return Err(AppError::Validation {
                field: "count".to_string(),
                message: format!("At most {} units can be created at once", max_batch_size),
                message_es: format!("Se pueden crear como máximo {} unidades a la vez", max_batch_size),
            });
        }
        Ok(count)
    }
}

/// Recompute prices of every detail of an intake inside the caller's transaction
async fn reprice(conn: &mut PgConnection, intake_id: i64) -> AppResult<Vec<IntakeDetail>> {
    let mut details = sqlx::query_as::<_, DetailRow>(&format!(
        "SELECT {} FROM intake_details WHERE intake_id = $1 ORDER BY id FOR UPDATE",
        DETAIL_COLUMNS
    ))
    .bind(intake_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(IntakeDetail::from)
    .collect::<Vec<_>>();

    let discounts = sqlx::query_as::<_, (i64, i64, Decimal, Option<String>)>(
        "SELECT id, intake_id, amount, description FROM intake_discounts WHERE intake_id = $1",
    )
    .bind(intake_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|(id, intake_id, amount, description)| IntakeDiscount {
        id,
        intake_id,
        amount,
        description,
    })
    .collect::<Vec<_>>();

    price_details(&mut details, &discounts);

    for detail in &details {
        sqlx::query(
            r#"
            UPDATE intake_details
            SET unit_price = $1, discounted_unit_price = $2, total_price = $3
            WHERE id = $4
            "#,
        )
        .bind(detail.unit_price)
        .bind(detail.discounted_unit_price)
        .bind(detail.total_price)
        .bind(detail.id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures;

    // Run with DATABASE_URL pointing at a scratch PostgreSQL server and `--ignored`
    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a PostgreSQL DATABASE_URL"]
    async fn test_materialized_devices_take_consecutive_indices(pool: PgPool) {
        let user = Uuid::new_v4();
        let keyboard = fixtures::device_type(&pool, "Teclado", "T").await;
        let detail = fixtures::intake_detail(&pool, user, keyboard, 5).await;
        let service = IntakeService::new(pool.clone());

        let report = service
            .materialize_devices(user, detail.id, MaterializeInput::default(), 100)
            .await
            .unwrap();
        assert_eq!((report.created, report.failed), (5, 0));

        let rows = sqlx::query_as::<_, (String, i32, String, String)>(
            "SELECT triage, indice, state, stage FROM devices WHERE kind = 'keyboard' ORDER BY indice",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let triages: Vec<&str> = rows.iter().map(|r| r.0.as_str()).collect();
        assert_eq!(triages, vec!["T-1", "T-2", "T-3", "T-4", "T-5"]);
        assert_eq!(rows.iter().map(|r| r.1).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert!(rows.iter().all(|r| r.2 == "pending" && r.3 == "stored"));

        service
            .materialize_devices(user, detail.id, MaterializeInput { count: Some(2) }, 100)
            .await
            .unwrap();
        let latest = sqlx::query_scalar::<_, String>(
            "SELECT triage FROM devices WHERE kind = 'keyboard' AND indice > 5 ORDER BY indice",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(latest, vec!["T-6", "T-7"]);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a PostgreSQL DATABASE_URL"]
    async fn test_batch_over_limit_creates_nothing(pool: PgPool) {
        let user = Uuid::new_v4();
        let mouse = fixtures::device_type(&pool, "Mouse", "S").await;
        let detail = fixtures::intake_detail(&pool, user, mouse, 20).await;

        let err = IntakeService::new(pool.clone())
            .materialize_devices(user, detail.id, MaterializeInput::default(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM devices")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
