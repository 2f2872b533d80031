use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Agency, AgencyStatus, AgencySummary, TransactionType, VehicleType};

/// Editable agency fields; moderation fields are set separately.
#[derive(Debug, Clone)]
pub struct AgencyFields {
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub logo: Option<String>,
    pub vehicle_types: Vec<VehicleType>,
    pub transaction_types: Vec<TransactionType>,
}

impl From<&Agency> for AgencyFields {
    fn from(agency: &Agency) -> Self {
        Self {
            name: agency.name.clone(),
            description: agency.description.clone(),
            address: agency.address.clone(),
            city: agency.city.clone(),
            phone: agency.phone.clone(),
            email: agency.email.clone(),
            logo: agency.logo.clone(),
            vehicle_types: agency.vehicle_types.clone(),
            transaction_types: agency.transaction_types.clone(),
        }
    }
}

pub async fn create(
    pool: &PgPool,
    owner_id: Uuid,
    fields: &AgencyFields,
) -> Result<Agency, sqlx::Error> {
    sqlx::query_as::<_, Agency>(
        "INSERT INTO agencies
            (owner_id, name, description, address, city, phone, email, logo,
             vehicle_types, transaction_types)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
    )
    .bind(owner_id)
    .bind(&fields.name)
    .bind(&fields.description)
    .bind(&fields.address)
    .bind(&fields.city)
    .bind(&fields.phone)
    .bind(&fields.email)
    .bind(&fields.logo)
    .bind(&fields.vehicle_types)
    .bind(&fields.transaction_types)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Agency>, sqlx::Error> {
    sqlx::query_as::<_, Agency>("SELECT * FROM agencies WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_owner(pool: &PgPool, owner_id: Uuid) -> Result<Option<Agency>, sqlx::Error> {
    sqlx::query_as::<_, Agency>("SELECT * FROM agencies WHERE owner_id = $1")
        .bind(owner_id)
        .fetch_optional(pool)
        .await
}

pub async fn list(
    pool: &PgPool,
    status: Option<AgencyStatus>,
) -> Result<Vec<Agency>, sqlx::Error> {
    match status {
        Some(status) => {
            sqlx::query_as::<_, Agency>(
                "SELECT * FROM agencies WHERE status = $1 ORDER BY created_at DESC",
            )
            .bind(status)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, Agency>("SELECT * FROM agencies ORDER BY created_at DESC")
                .fetch_all(pool)
                .await
        }
    }
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    fields: &AgencyFields,
) -> Result<Agency, sqlx::Error> {
    sqlx::query_as::<_, Agency>(
        "UPDATE agencies SET
            name = $2, description = $3, address = $4, city = $5, phone = $6,
            email = $7, logo = $8, vehicle_types = $9, transaction_types = $10,
            updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&fields.name)
    .bind(&fields.description)
    .bind(&fields.address)
    .bind(&fields.city)
    .bind(&fields.phone)
    .bind(&fields.email)
    .bind(&fields.logo)
    .bind(&fields.vehicle_types)
    .bind(&fields.transaction_types)
    .fetch_one(pool)
    .await
}

pub async fn set_status(
    pool: &PgPool,
    id: Uuid,
    status: AgencyStatus,
    rejection_reason: Option<&str>,
) -> Result<Agency, sqlx::Error> {
    sqlx::query_as::<_, Agency>(
        "UPDATE agencies SET status = $2, rejection_reason = $3, updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .bind(rejection_reason)
    .fetch_one(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM agencies WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Batch lookup used to populate listing responses.
pub async fn summaries_by_ids(
    pool: &PgPool,
    ids: &[Uuid],
) -> Result<Vec<AgencySummary>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, AgencySummary>(
        "SELECT id, name, city, phone, email, logo FROM agencies WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(pool)
    .await
}

pub async fn count_by_status(pool: &PgPool, status: AgencyStatus) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM agencies WHERE status = $1")
        .bind(status)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}
