pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod models;
pub mod rate_limit;
pub mod response;
pub mod routes;
pub mod state;
pub mod suggestion;
pub mod upload;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::models::Role;
use crate::rate_limit::LoginRateLimiter;
use crate::state::{AppState, SharedState};
use crate::suggestion::gemini::GeminiVision;
use crate::suggestion::{Suggester, UnconfiguredVision, VisionModel};
use crate::upload::ImageStore;
use crate::upload::storage::URL_PREFIX;

pub fn build_app(pool: PgPool, config: Config) -> Router {
    let timeout = Duration::from_secs(config.suggestion_timeout_secs);

    // The HTTP client gets more slack than the caller's wait so a slow reply
    // can still land after the caller has fallen back.
    let vision: Arc<dyn VisionModel> = match config.gemini.as_ref() {
        Some(gemini) => match GeminiVision::new(gemini, timeout * 2) {
            Ok(model) => {
                tracing::info!(model = %gemini.model, "Vision model configured");
                Arc::new(model)
            }
            Err(e) => {
                tracing::warn!("Vision model not available: {e}");
                Arc::new(UnconfiguredVision)
            }
        },
        None => {
            tracing::warn!("GEMINI_API_KEY not set; image suggestions will return unknown");
            Arc::new(UnconfiguredVision)
        }
    };

    build_app_with_vision(pool, config, vision)
}

/// Same as [`build_app`] with an explicit vision model.
pub fn build_app_with_vision(
    pool: PgPool,
    config: Config,
    vision: Arc<dyn VisionModel>,
) -> Router {
    let timeout = Duration::from_secs(config.suggestion_timeout_secs);
    let max_body_size = config.max_body_size;
    let cors = cors_layer(&config.cors_origins);
    let images = ImageStore::new(config.upload_dir.clone(), config.temp_dir.clone());
    let uploads = ServeDir::new(images.root());

    let state: SharedState = Arc::new(AppState {
        pool,
        config,
        images,
        suggester: Suggester::new(vision, timeout),
        login_limiter: LoginRateLimiter::new(),
    });
    spawn_limiter_cleanup(&state);

    Router::new()
        .merge(routes::api_routes())
        .nest_service(URL_PREFIX, uploads)
        .route("/health", axum::routing::get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodically prune the login limiter. Stops once the app state is dropped.
fn spawn_limiter_cleanup(state: &SharedState) {
    let weak = Arc::downgrade(state);
    let period = state.login_limiter.window();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(state) = weak.upgrade() else {
                break;
            };
            state.login_limiter.cleanup();
        }
    });
}

/// An empty origin list allows any origin (without credentials).
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60))
}

/// Create the configured administrator account if it does not exist yet.
pub async fn bootstrap_admin(pool: &PgPool, config: &Config) -> Result<(), String> {
    let Some(seed) = config.admin_seed.as_ref() else {
        return Ok(());
    };

    let email = seed.email.trim().to_lowercase();
    let existing = db::users::find_by_email(pool, &email)
        .await
        .map_err(|e| format!("Failed to look up admin account: {e}"))?;

    match existing {
        Some(user) if user.role == Role::Admin => Ok(()),
        Some(_) => {
            tracing::warn!("Admin seed email {email} belongs to a non-admin account; skipping");
            Ok(())
        }
        None => {
            auth::password::check_length(&seed.password)
                .map_err(|e| format!("MOTORMART_ADMIN_PASSWORD: {e}"))?;
            let pw_hash = auth::password::hash(&seed.password)?;
            let user = db::users::create(pool, &seed.name, &email, &pw_hash, Role::Admin, None)
                .await
                .map_err(|e| format!("Failed to create admin account: {e}"))?;
            tracing::info!(user_id = %user.id, "Admin account created");
            Ok(())
        }
    }
}

async fn health() -> &'static str {
    "ok"
}
