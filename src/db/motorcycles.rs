use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::listings::ListingCore;
use crate::models::Motorcycle;

pub const TABLE: &str = "motorcycles";

#[derive(Debug, Clone)]
pub struct MotorcycleFields {
    pub core: ListingCore,
    pub displacement: Option<i32>,
}

impl From<Motorcycle> for MotorcycleFields {
    fn from(moto: Motorcycle) -> Self {
        Self {
            core: ListingCore {
                brand: moto.brand,
                model: moto.model,
                year: moto.year,
                condition: moto.condition,
                transaction_type: moto.transaction_type,
                price: moto.price,
                mileage: moto.mileage,
                color: moto.color,
                category: moto.category,
                power: moto.power,
                registration_plate: moto.registration_plate,
                description: moto.description,
                features: moto.features,
                status: moto.status,
                images: moto.images.0,
            },
            displacement: moto.displacement,
        }
    }
}

pub async fn create(
    pool: &PgPool,
    agency_id: Uuid,
    fields: &MotorcycleFields,
) -> Result<Motorcycle, sqlx::Error> {
    let core = &fields.core;
    sqlx::query_as::<_, Motorcycle>(
        "INSERT INTO motorcycles
            (agency_id, brand, model, year, condition, transaction_type, price, mileage,
             color, category, power, registration_plate, description, features, status,
             images, displacement)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
         RETURNING *",
    )
    .bind(agency_id)
    .bind(&core.brand)
    .bind(&core.model)
    .bind(core.year)
    .bind(core.condition)
    .bind(core.transaction_type)
    .bind(core.price)
    .bind(core.mileage)
    .bind(&core.color)
    .bind(&core.category)
    .bind(core.power)
    .bind(&core.registration_plate)
    .bind(&core.description)
    .bind(&core.features)
    .bind(core.status)
    .bind(Json(&core.images))
    .bind(fields.displacement)
    .fetch_one(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    fields: &MotorcycleFields,
) -> Result<Motorcycle, sqlx::Error> {
    let core = &fields.core;
    sqlx::query_as::<_, Motorcycle>(
        "UPDATE motorcycles SET
            brand = $2, model = $3, year = $4, condition = $5, transaction_type = $6,
            price = $7, mileage = $8, color = $9, category = $10, power = $11,
            registration_plate = $12, description = $13, features = $14, status = $15,
            images = $16, displacement = $17, updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&core.brand)
    .bind(&core.model)
    .bind(core.year)
    .bind(core.condition)
    .bind(core.transaction_type)
    .bind(core.price)
    .bind(core.mileage)
    .bind(&core.color)
    .bind(&core.category)
    .bind(core.power)
    .bind(&core.registration_plate)
    .bind(&core.description)
    .bind(&core.features)
    .bind(core.status)
    .bind(Json(&core.images))
    .bind(fields.displacement)
    .fetch_one(pool)
    .await
}
