use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use super::{ListingCondition, ListingImage, ListingStatus, TransactionType};

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Car {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub condition: ListingCondition,
    pub transaction_type: TransactionType,
    pub price: f64,
    pub mileage: Option<i32>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub color: Option<String>,
    pub category: Option<String>,
    pub seats: Option<i32>,
    pub doors: Option<i32>,
    pub power: Option<i32>,
    pub registration_plate: Option<String>,
    pub description: Option<String>,
    pub features: Vec<String>,
    pub status: ListingStatus,
    pub images: Json<Vec<ListingImage>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
