use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "agency_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AgencyStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "vehicle_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Car,
    Motorcycle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Sale,
    Rental,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Agency {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub logo: Option<String>,
    pub status: AgencyStatus,
    pub rejection_reason: Option<String>,
    pub vehicle_types: Vec<VehicleType>,
    pub transaction_types: Vec<TransactionType>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agency {
    pub fn is_approved(&self) -> bool {
        self.status == AgencyStatus::Approved
    }

    pub fn handles(&self, vehicle: VehicleType, transaction: TransactionType) -> bool {
        self.vehicle_types.contains(&vehicle) && self.transaction_types.contains(&transaction)
    }
}

/// The agency fields embedded in listing responses.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct AgencySummary {
    pub id: Uuid,
    pub name: String,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub logo: Option<String>,
}
