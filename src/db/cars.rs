use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::listings::ListingCore;
use crate::models::Car;

pub const TABLE: &str = "cars";

#[derive(Debug, Clone)]
pub struct CarFields {
    pub core: ListingCore,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub seats: Option<i32>,
    pub doors: Option<i32>,
}

impl From<Car> for CarFields {
    fn from(car: Car) -> Self {
        Self {
            core: ListingCore {
                brand: car.brand,
                model: car.model,
                year: car.year,
                condition: car.condition,
                transaction_type: car.transaction_type,
                price: car.price,
                mileage: car.mileage,
                color: car.color,
                category: car.category,
                power: car.power,
                registration_plate: car.registration_plate,
                description: car.description,
                features: car.features,
                status: car.status,
                images: car.images.0,
            },
            fuel_type: car.fuel_type,
            transmission: car.transmission,
            seats: car.seats,
            doors: car.doors,
        }
    }
}

pub async fn create(pool: &PgPool, agency_id: Uuid, fields: &CarFields) -> Result<Car, sqlx::Error> {
    let core = &fields.core;
    sqlx::query_as::<_, Car>(
        "INSERT INTO cars
            (agency_id, brand, model, year, condition, transaction_type, price, mileage,
             color, category, power, registration_plate, description, features, status,
             images, fuel_type, transmission, seats, doors)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                 $16, $17, $18, $19, $20)
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
    .bind(&fields.fuel_type)
    .bind(&fields.transmission)
    .bind(fields.seats)
    .bind(fields.doors)
    .fetch_one(pool)
    .await
}

pub async fn update(pool: &PgPool, id: Uuid, fields: &CarFields) -> Result<Car, sqlx::Error> {
    let core = &fields.core;
    sqlx::query_as::<_, Car>(
        "UPDATE cars SET
            brand = $2, model = $3, year = $4, condition = $5, transaction_type = $6,
            price = $7, mileage = $8, color = $9, category = $10, power = $11,
            registration_plate = $12, description = $13, features = $14, status = $15,
            images = $16, fuel_type = $17, transmission = $18, seats = $19, doors = $20,
            updated_at = now()
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
    .bind(&fields.fuel_type)
    .bind(&fields.transmission)
    .bind(fields.seats)
    .bind(fields.doors)
    .fetch_one(pool)
    .await
}
