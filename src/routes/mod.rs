pub mod admin;
pub mod agencies;
pub mod auth;
pub mod cars;
pub mod listings;
pub mod motorcycles;
pub mod search;
pub mod suggestions;

use axum::Router;
use axum::routing::{delete, get, post, put};

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Auth
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/logout", post(auth::logout))
        .route("/api/v1/auth/me", get(auth::me))
        .route("/api/v1/auth/password", put(auth::change_password))
        // Agencies
        .route(
            "/api/v1/agencies",
            get(agencies::list).post(agencies::create),
        )
        .route("/api/v1/agencies/mine", get(agencies::mine))
        .route(
            "/api/v1/agencies/{id}",
            get(agencies::get)
                .put(agencies::update)
                .delete(agencies::delete),
        )
        // Admin
        .route(
            "/api/v1/admin/agencies/{id}/status",
            put(admin::set_agency_status),
        )
        .route("/api/v1/admin/users", get(admin::list_users))
        .route("/api/v1/admin/users/{id}", delete(admin::delete_user))
        .route("/api/v1/admin/stats", get(admin::stats))
        // Cars
        .route("/api/v1/cars", get(cars::list).post(cars::create))
        .route("/api/v1/cars/mine", get(cars::mine))
        .route(
            "/api/v1/cars/{id}",
            get(cars::get).put(cars::update).delete(cars::delete),
        )
        // Motorcycles
        .route(
            "/api/v1/motorcycles",
            get(motorcycles::list).post(motorcycles::create),
        )
        .route("/api/v1/motorcycles/mine", get(motorcycles::mine))
        .route(
            "/api/v1/motorcycles/{id}",
            get(motorcycles::get)
                .put(motorcycles::update)
                .delete(motorcycles::delete),
        )
        // Search
        .route("/api/v1/search", get(search::search))
        // Suggestions
        .route("/api/v1/suggestions/vehicle", post(suggestions::vehicle))
}
