//! Database fixtures for service tests

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::IntakeDetail;
use crate::services::intake::{CreateIntakeInput, IntakeService, MaterializeInput, RecordDetailInput};

/// Insert a triaged device type
pub(crate) async fn device_type(pool: &PgPool, name: &str, slug: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO device_types (name, slug, uses_triage) VALUES ($1, $2, TRUE) RETURNING id",
    )
    .bind(name)
    .bind(slug)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Open an unpriced intake with one detail of `usable` units
pub(crate) async fn intake_detail(
    pool: &PgPool,
    user_id: Uuid,
    device_type_id: i64,
    usable: i32,
) -> IntakeDetail {
    let intake_type_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO intake_types (name, priced) VALUES ($1, FALSE) RETURNING id",
    )
    .bind(format!("Donation {}", device_type_id))
    .fetch_one(pool)
    .await
    .unwrap();

    let service = IntakeService::new(pool.clone());
    let intake = service
        .create_intake(
            user_id,
            CreateIntakeInput {
                intake_type_id,
                date: None,
                donor_name: "Escuela Central".to_string(),
                received_by: None,
            },
        )
        .await
        .unwrap();

    service
        .record_intake(
            user_id,
            intake.id,
            RecordDetailInput {
                device_type_id,
                usable,
                for_parts: 0,
                scrap: 0,
                subtotal: None,
            },
        )
        .await
        .unwrap()
}

/// Materialize `count` devices of a new type and return their triage codes by indice
pub(crate) async fn devices(
    pool: &PgPool,
    user_id: Uuid,
    device_type_id: i64,
    count: i32,
) -> Vec<String> {
    let detail = intake_detail(pool, user_id, device_type_id, count).await;
    IntakeService::new(pool.clone())
        .materialize_devices(user_id, detail.id, MaterializeInput::default(), 100)
        .await
        .unwrap();

    sqlx::query_scalar::<_, String>(
        "SELECT triage FROM devices WHERE intake_id = $1 ORDER BY indice",
    )
    .bind(detail.intake_id)
    .fetch_all(pool)
    .await
    .unwrap()
}

/// Set the lifecycle columns of a device directly
pub(crate) async fn set_lifecycle(pool: &PgPool, triage: &str, stage: &str, state: &str) {
    sqlx::query("UPDATE devices SET stage = $1, state = $2 WHERE triage = $3")
        .bind(stage)
        .bind(state)
        .bind(triage)
        .execute(pool)
        .await
        .unwrap();
}

/// Open a delivery of a fresh delivery type
pub(crate) async fn delivery(pool: &PgPool, user_id: Uuid) -> i64 {
    let delivery_type_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO delivery_types (name) VALUES ($1) RETURNING id",
    )
    .bind(format!("Delivery {}", &user_id.simple().to_string()[..8]))
    .fetch_one(pool)
    .await
    .unwrap();

    sqlx::query_scalar::<_, i64>(
        "INSERT INTO deliveries (delivery_type_id, date, created_by) VALUES ($1, CURRENT_DATE, $2) RETURNING id",
    )
    .bind(delivery_type_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .unwrap()
}
