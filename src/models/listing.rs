use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "listing_condition", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ListingCondition {
    New,
    Used,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "listing_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Available,
    Reserved,
    Sold,
    Rented,
}

/// A stored listing photo. `url` is relative to the server root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingImage {
    pub url: String,
    pub filename: String,
}

/// Accessors shared by car and motorcycle rows.
pub trait Listing {
    fn agency_id(&self) -> uuid::Uuid;
    fn images(&self) -> &[ListingImage];
}

impl Listing for super::Car {
    fn agency_id(&self) -> uuid::Uuid {
        self.agency_id
    }

    fn images(&self) -> &[ListingImage] {
        &self.images.0
    }
}

impl Listing for super::Motorcycle {
    fn agency_id(&self) -> uuid::Uuid {
        self.agency_id
    }

    fn images(&self) -> &[ListingImage] {
        &self.images.0
    }
}
