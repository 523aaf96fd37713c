//! Scrap service: recycling companies, disposals and the devices they take away

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    check_scrap_detail, check_scrappable, validate_disposal_amounts, IntakeDetail, ScrapCompany,
    ScrapDetail, ScrapDisposal, ScrappedDevice,
};
use crate::services::device::lock_device_by_triage;
use crate::services::intake::{DetailRow, DETAIL_COLUMNS};

/// Scrap service for disposals
#[derive(Clone)]
pub struct ScrapService {
    db: PgPool,
}

/// Database row for scrap disposal
#[derive(Debug, sqlx::FromRow)]
struct DisposalRow {
    id: i64,
    date: NaiveDate,
    company_id: i64,
    total_price: Decimal,
    weight: Decimal,
    notes: Option<String>,
    created_by: Uuid,
    in_creation: bool,
}

impl From<DisposalRow> for ScrapDisposal {
    fn from(row: DisposalRow) -> Self {
        ScrapDisposal {
            id: row.id,
            date: row.date,
            company_id: row.company_id,
            total_price: row.total_price,
            weight: row.weight,
            notes: row.notes,
            created_by: row.created_by,
            in_creation: row.in_creation,
        }
    }
}

const DISPOSAL_COLUMNS: &str =
    "id, date, company_id, total_price, weight, notes, created_by, in_creation";

/// Database row for scrap detail
#[derive(Debug, sqlx::FromRow)]
struct ScrapDetailRow {
    id: i64,
    disposal_id: i64,
    intake_detail_id: Option<i64>,
    device_type_id: i64,
    quantity: Decimal,
}

impl From<ScrapDetailRow> for ScrapDetail {
    fn from(row: ScrapDetailRow) -> Self {
        ScrapDetail {
            id: row.id,
            disposal_id: row.disposal_id,
            intake_detail_id: row.intake_detail_id,
            device_type_id: row.device_type_id,
            quantity: row.quantity,
        }
    }
}

const SCRAP_DETAIL_COLUMNS: &str = "id, disposal_id, intake_detail_id, device_type_id, quantity";

/// Database row for a scrapped device
#[derive(Debug, sqlx::FromRow)]
struct ScrappedRow {
    disposal_id: i64,
    device_id: Uuid,
    triage: String,
    added_by: Uuid,
    added_at: DateTime<Utc>,
}

impl From<ScrappedRow> for ScrappedDevice {
    fn from(row: ScrappedRow) -> Self {
        ScrappedDevice {
            disposal_id: row.disposal_id,
            device_id: row.device_id,
            triage: row.triage,
            added_by: row.added_by,
            added_at: row.added_at,
        }
    }
}

/// Input for creating a scrap company
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCompanyInput {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
}

/// Input for opening a disposal
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDisposalInput {
    pub company_id: i64,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub total_price: Decimal,
    #[serde(default)]
    pub weight: Decimal,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Input for adding a detail line to a disposal
#[derive(Debug, Deserialize)]
pub struct AddScrapDetailInput {
    pub device_type_id: i64,
    pub intake_detail_id: Option<i64>,
    pub quantity: Decimal,
}

/// Input for adding a discarded device to a disposal
#[derive(Debug, Deserialize, Validate)]
pub struct AddScrappedDeviceInput {
    #[validate(length(min = 1, max = 30))]
    pub triage: String,
}

/// Disposal with its details and devices
#[derive(Debug, Serialize)]
pub struct DisposalSummary {
    #[serde(flatten)]
    pub disposal: ScrapDisposal,
    pub details: Vec<ScrapDetail>,
    pub devices: Vec<ScrappedDevice>,
}

impl ScrapService {
    /// Create a new ScrapService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_company(&self, input: CreateCompanyInput) -> AppResult<ScrapCompany> {
        input.validate()?;

        let (id, name) = sqlx::query_as::<_, (i64, String)>(
            "INSERT INTO scrap_companies (name) VALUES ($1) RETURNING id, name",
        )
        .bind(input.name.trim())
        .fetch_one(&self.db)
        .await?;

        tracing::info!(company_id = id, "Scrap company created");
        Ok(ScrapCompany { id, name })
    }

    pub async fn list_companies(&self) -> AppResult<Vec<ScrapCompany>> {
        let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM scrap_companies ORDER BY name")
            .fetch_all(&self.db)
            .await?;

        Ok(rows.into_iter().map(|(id, name)| ScrapCompany { id, name }).collect())
    }

    /// Open a disposal for a company
    pub async fn create_disposal(
        &self,
        user_id: Uuid,
        input: CreateDisposalInput,
    ) -> AppResult<ScrapDisposal> {
        input.validate()?;
        validate_disposal_amounts(input.total_price, input.weight)?;

        let company_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM scrap_companies WHERE id = $1)")
                .bind(input.company_id)
                .fetch_one(&self.db)
                .await?;
        if !company_exists {
            return Err(AppError::NotFound(format!("Scrap company {}", input.company_id)));
        }

        let row = sqlx::query_as::<_, DisposalRow>(&format!(
            r#"
            INSERT INTO scrap_disposals (date, company_id, total_price, weight, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            DISPOSAL_COLUMNS
        ))
        .bind(input.date.unwrap_or_else(|| Utc::now().date_naive()))
        .bind(input.company_id)
        .bind(input.total_price)
        .bind(input.weight)
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(disposal_id = row.id, company_id = input.company_id, "Scrap disposal opened");
        Ok(row.into())
    }

    /// List disposals, newest first
    pub async fn list_disposals(&self) -> AppResult<Vec<ScrapDisposal>> {
        let rows = sqlx::query_as::<_, DisposalRow>(&format!(
            "SELECT {} FROM scrap_disposals ORDER BY date DESC, id DESC",
            DISPOSAL_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get_disposal(&self, disposal_id: i64) -> AppResult<DisposalSummary> {
        let disposal: ScrapDisposal = sqlx::query_as::<_, DisposalRow>(&format!(
            "SELECT {} FROM scrap_disposals WHERE id = $1",
            DISPOSAL_COLUMNS
        ))
        .bind(disposal_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Scrap disposal {}", disposal_id)))?
        .into();

        let details = sqlx::query_as::<_, ScrapDetailRow>(&format!(
            "SELECT {} FROM scrap_details WHERE disposal_id = $1 ORDER BY id",
            SCRAP_DETAIL_COLUMNS
        ))
        .bind(disposal_id)
        .fetch_all(&self.db)
        .await?;

        let devices = sqlx::query_as::<_, ScrappedRow>(
            r#"
            SELECT s.disposal_id, s.device_id, d.triage, s.added_by, s.added_at
            FROM scrapped_devices s
            JOIN devices d ON d.id = s.device_id
            WHERE s.disposal_id = $1
            ORDER BY s.added_at, d.triage
            "#,
        )
        .bind(disposal_id)
        .fetch_all(&self.db)
        .await?;

        Ok(DisposalSummary {
            disposal,
            details: details.into_iter().map(Into::into).collect(),
            devices: devices.into_iter().map(Into::into).collect(),
        })
    }

    /// Add a quantity of one device type to an open disposal
    pub async fn add_detail(
        &self,
        disposal_id: i64,
        input: AddScrapDetailInput,
    ) -> AppResult<ScrapDetail> {
        let mut tx = self.db.begin().await?;
        lock_disposal(&mut tx, disposal_id).await?.ensure_open()?;

        let intake_detail: Option<IntakeDetail> = match input.intake_detail_id {
            Some(id) => Some(
                sqlx::query_as::<_, DetailRow>(&format!(
                    "SELECT {} FROM intake_details WHERE id = $1",
                    DETAIL_COLUMNS
                ))
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Intake detail {}", id)))?
                .into(),
            ),
            None => None,
        };
        check_scrap_detail(input.device_type_id, input.quantity, intake_detail.as_ref())?;

        let row = sqlx::query_as::<_, ScrapDetailRow>(&format!(
            r#"
            INSERT INTO scrap_details (disposal_id, intake_detail_id, device_type_id, quantity)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            SCRAP_DETAIL_COLUMNS
        ))
        .bind(disposal_id)
        .bind(input.intake_detail_id)
        .bind(input.device_type_id)
        .bind(input.quantity)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(disposal_id, device_type_id = input.device_type_id, "Scrap detail added");
        Ok(row.into())
    }

    /// Attach a discarded device to an open disposal
    pub async fn add_device(
        &self,
        user_id: Uuid,
        disposal_id: i64,
        input: AddScrappedDeviceInput,
    ) -> AppResult<ScrappedDevice> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        lock_disposal(&mut tx, disposal_id).await?.ensure_open()?;
        let device = lock_device_by_triage(&mut tx, &input.triage).await?;
        check_scrappable(&device)?;

        let already_scrapped = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM scrapped_devices WHERE device_id = $1)",
        )
        .bind(device.id)
        .fetch_one(&mut *tx)
        .await?;
        if already_scrapped {
            return Err(AppError::Conflict {
                resource: "scrapped_device".to_string(),
                message: format!("Device {} already left as scrap", device.triage),
                message_es: format!("El dispositivo {} ya salió como desecho", device.triage),
            });
        }

        let (added_by, added_at) = sqlx::query_as::<_, (Uuid, DateTime<Utc>)>(
            r#"
            INSERT INTO scrapped_devices (disposal_id, device_id, added_by)
            VALUES ($1, $2, $3)
            RETURNING added_by, added_at
            "#,
        )
        .bind(disposal_id)
        .bind(device.id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(disposal_id, triage = %device.triage, "Device added to scrap disposal");
        Ok(ScrappedDevice {
            disposal_id,
            device_id: device.id,
            triage: device.triage,
            added_by,
            added_at,
        })
    }

    /// Close a disposal; no details or devices can be added afterwards
    pub async fn close_disposal(&self, disposal_id: i64) -> AppResult<ScrapDisposal> {
        let mut tx = self.db.begin().await?;
        let mut disposal = lock_disposal(&mut tx, disposal_id).await?;

        let (details, devices) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT (SELECT COUNT(*) FROM scrap_details WHERE disposal_id = $1),
                   (SELECT COUNT(*) FROM scrapped_devices WHERE disposal_id = $1)
            "#,
        )
        .bind(disposal_id)
        .fetch_one(&mut *tx)
        .await?;
        disposal.close(details as usize, devices as usize)?;

        sqlx::query("UPDATE scrap_disposals SET in_creation = FALSE WHERE id = $1")
            .bind(disposal_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(disposal_id, details, devices, "Scrap disposal closed");
        Ok(disposal)
    }
}

async fn lock_disposal(conn: &mut PgConnection, disposal_id: i64) -> AppResult<ScrapDisposal> {
    let row = sqlx::query_as::<_, DisposalRow>(&format!(
        "SELECT {} FROM scrap_disposals WHERE id = $1 FOR UPDATE",
        DISPOSAL_COLUMNS
    ))
    .bind(disposal_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Scrap disposal {}", disposal_id)))?;

    Ok(row.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a PostgreSQL DATABASE_URL"]
    async fn test_disposal_takes_discarded_devices_once(pool: PgPool) {
        let user = Uuid::new_v4();
        let hdd = fixtures::device_type(&pool, "Disco duro", "HDD").await;
        let triages = fixtures::devices(&pool, user, hdd, 2).await;
        fixtures::set_lifecycle(&pool, &triages[0], "discarded", "discarded").await;

        let service = ScrapService::new(pool.clone());
        let company = service
            .create_company(CreateCompanyInput { name: "Recicla S.A.".to_string() })
            .await
            .unwrap();
        let disposal = service
            .create_disposal(
                user,
                CreateDisposalInput {
                    company_id: company.id,
                    date: None,
                    total_price: Decimal::new(1500, 2),
                    weight: Decimal::new(42, 0),
                    notes: None,
                },
            )
            .await
            .unwrap();

        assert!(service.close_disposal(disposal.id).await.is_err());

        let add = |triage: &str| AddScrappedDeviceInput { triage: triage.to_string() };
        service.add_device(user, disposal.id, add(triages[0].as_str())).await.unwrap();
        assert!(matches!(
            service.add_device(user, disposal.id, add(triages[0].as_str())).await,
            Err(AppError::Conflict { .. })
        ));
        assert!(matches!(
            service.add_device(user, disposal.id, add(triages[1].as_str())).await,
            Err(AppError::InvalidStateTransition(_))
        ));

        let closed = service.close_disposal(disposal.id).await.unwrap();
        assert!(!closed.in_creation);
        let summary = service.get_disposal(disposal.id).await.unwrap();
        assert_eq!(summary.devices.len(), 1);
        assert_eq!(summary.devices[0].triage, triages[0]);

        let late = service
            .add_detail(
                disposal.id,
                AddScrapDetailInput {
                    device_type_id: hdd,
                    intake_detail_id: None,
                    quantity: Decimal::ONE,
                },
            )
            .await;
        assert!(matches!(late, Err(AppError::InvalidStateTransition(_))));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a PostgreSQL DATABASE_URL"]
    async fn test_detail_must_match_intake_device_type(pool: PgPool) {
        let user = Uuid::new_v4();
        let monitor = fixtures::device_type(&pool, "Monitor", "M").await;
        let mouse = fixtures::device_type(&pool, "Mouse", "S").await;
        let detail = fixtures::intake_detail(&pool, user, monitor, 3).await;

        let service = ScrapService::new(pool.clone());
        let company = service
            .create_company(CreateCompanyInput { name: "Metales".to_string() })
            .await
            .unwrap();
        let disposal = service
            .create_disposal(
                user,
                CreateDisposalInput {
                    company_id: company.id,
                    date: None,
                    total_price: Decimal::ZERO,
                    weight: Decimal::ZERO,
                    notes: None,
                },
            )
            .await
            .unwrap();

        let wrong = service
            .add_detail(
                disposal.id,
                AddScrapDetailInput {
                    device_type_id: mouse,
                    intake_detail_id: Some(detail.id),
                    quantity: Decimal::new(3, 0),
                },
            )
            .await;
        assert!(matches!(wrong, Err(AppError::Validation { .. })));

        let line = service
            .add_detail(
                disposal.id,
                AddScrapDetailInput {
                    device_type_id: monitor,
                    intake_detail_id: Some(detail.id),
                    quantity: Decimal::new(3, 0),
                },
            )
            .await
            .unwrap();
        assert_eq!(line.intake_detail_id, Some(detail.id));
    }
}
