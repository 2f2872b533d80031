use std::sync::LazyLock;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::extractor::{ACCESS_COOKIE, AuthUser};
use crate::auth::jwt::{Claims, encode_token};
use crate::auth::password;
use crate::db;
use crate::error::AppError;
use crate::extract::JsonBody;
use crate::models::{Agency, Role, User};
use crate::response::{self, Envelope};
use crate::state::SharedState;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: User,
    pub agency: Option<Agency>,
}

fn auth_cookie(token: &str, ttl_hours: i64) -> CookieJar {
    let access = Cookie::build((ACCESS_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(ttl_hours))
        .build();
    CookieJar::new().add(access)
}

fn clear_auth_cookie() -> CookieJar {
    let access = Cookie::build((ACCESS_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();
    CookieJar::new().add(access)
}

fn issue_token(state: &SharedState, user: &User) -> Result<String, AppError> {
    let claims = Claims::new(user.id, user.role, state.config.jwt_expiry_hours);
    encode_token(&claims, &state.config.jwt_secret).map_err(AppError::Internal)
}

fn check_password_length(password: &str) -> Result<(), AppError> {
    password::check_length(password).map_err(AppError::BadRequest)
}

pub async fn register(
    State(state): State<SharedState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<Envelope<AuthResponse>>), AppError> {
    let name = req.name.trim();
    let email = req.email.trim().to_lowercase();
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "Name, email and password are required".to_string(),
        ));
    }
    if !EMAIL_RE.is_match(&email) {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }
    check_password_length(&req.password)?;

    let role = req.role.unwrap_or(Role::User);
    if role == Role::Admin {
        return Err(AppError::BadRequest(
            "Role must be user or agent".to_string(),
        ));
    }

    if db::users::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::BadRequest("Email is already registered".to_string()));
    }

    let pw_hash = password::hash(&req.password).map_err(AppError::Internal)?;
    let phone = req
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let user = db::users::create(&state.pool, name, &email, &pw_hash, role, phone)
        .await
        .map_err(|e| AppError::unique_violation(e, "Email is already registered"))?;

    tracing::info!(user_id = %user.id, role = ?user.role, "User registered");

    let token = issue_token(&state, &user)?;
    let jar = auth_cookie(&token, state.config.jwt_expiry_hours);
    Ok((
        StatusCode::CREATED,
        jar,
        response::ok(AuthResponse { token, user }),
    ))
}

pub async fn login(
    State(state): State<SharedState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<(CookieJar, Json<Envelope<AuthResponse>>), AppError> {
    let email = req.email.trim().to_lowercase();

    if let Err(retry_after) = state.login_limiter.check(&email) {
        return Err(AppError::RateLimited(format!(
            "Too many login attempts. Try again in {retry_after} seconds."
        )));
    }

    let Some(user) = db::users::find_by_email(&state.pool, &email).await? else {
        state.login_limiter.record_failure(&email);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    };

    let valid = password::verify(&req.password, &user.password_hash).map_err(AppError::Internal)?;
    if !valid {
        state.login_limiter.record_failure(&email);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }
    state.login_limiter.reset(&email);

    let token = issue_token(&state, &user)?;
    let jar = auth_cookie(&token, state.config.jwt_expiry_hours);
    Ok((jar, response::ok(AuthResponse { token, user })))
}

pub async fn logout() -> (CookieJar, Json<Value>) {
    (clear_auth_cookie(), response::message("Logged out successfully"))
}

pub async fn me(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Envelope<MeResponse>>, AppError> {
    let user = db::users::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;
    let agency = db::agencies::find_by_owner(&state.pool, user.id).await?;
    Ok(response::ok(MeResponse { user, agency }))
}

pub async fn change_password(
    auth: AuthUser,
    State(state): State<SharedState>,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    check_password_length(&req.new_password)?;

    let user = db::users::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;

    let valid = password::verify(&req.current_password, &user.password_hash)
        .map_err(AppError::Internal)?;
    if !valid {
        return Err(AppError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    let pw_hash = password::hash(&req.new_password).map_err(AppError::Internal)?;
    db::users::update_password(&state.pool, user.id, &pw_hash).await?;

    Ok(response::message("Password updated"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(EMAIL_RE.is_match("agent@dune-motors.tn"));
        assert!(!EMAIL_RE.is_match("agent@localhost"));
        assert!(!EMAIL_RE.is_match("no spaces@x.io"));
        assert!(!EMAIL_RE.is_match("missing-at.io"));
    }

    #[test]
    fn short_passwords_rejected() {
        assert!(check_password_length("1234567").is_err());
        assert!(check_password_length("12345678").is_ok());
    }
}
