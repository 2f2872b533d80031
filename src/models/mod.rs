mod agency;
mod car;
mod listing;
mod motorcycle;
mod user;

pub use agency::{Agency, AgencyStatus, AgencySummary, TransactionType, VehicleType};
pub use car::Car;
pub use listing::{Listing, ListingCondition, ListingImage, ListingStatus};
pub use motorcycle::Motorcycle;
pub use user::{Role, User};
