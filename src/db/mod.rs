pub mod agencies;
pub mod cars;
pub mod listings;
pub mod motorcycles;
pub mod users;
