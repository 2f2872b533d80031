use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::error::AppError;
use crate::extract::{JsonBody, Path};
use crate::models::{Agency, AgencyStatus, Role, User};
use crate::response::{self, Envelope};
use crate::routes::agencies::{agency_files, remove_files};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: AgencyStatus,
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct UserCounts {
    pub total: i64,
    pub users: i64,
    pub agents: i64,
    pub admins: i64,
}

#[derive(Serialize)]
pub struct AgencyCounts {
    pub total: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
}

#[derive(Serialize)]
pub struct Stats {
    pub users: UserCounts,
    pub agencies: AgencyCounts,
    pub cars: i64,
    pub motorcycles: i64,
}

pub async fn set_agency_status(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    JsonBody(req): JsonBody<StatusRequest>,
) -> Result<Json<Envelope<Agency>>, AppError> {
    auth.require_admin()?;

    db::agencies::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Agency not found".to_string()))?;

    let reason = match req.status {
        AgencyStatus::Rejected => req
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty()),
        AgencyStatus::Approved | AgencyStatus::Pending => None,
    };

    let agency = db::agencies::set_status(&state.pool, id, req.status, reason).await?;
    tracing::info!(agency_id = %id, status = ?agency.status, admin_id = %auth.user_id, "Agency status changed");
    Ok(response::ok(agency))
}

pub async fn list_users(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Envelope<Vec<User>>>, AppError> {
    auth.require_admin()?;
    let users = db::users::list_all(&state.pool).await?;
    Ok(response::ok(users))
}

pub async fn delete_user(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    auth.require_admin()?;

    if id == auth.user_id {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    // Owned agency and its listings go with the user; collect their files first.
    let files = match db::agencies::find_by_owner(&state.pool, id).await? {
        Some(agency) => agency_files(&state, &agency).await?,
        None => Vec::new(),
    };

    if !db::users::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    remove_files(&state, &files).await;

    tracing::info!(user_id = %id, admin_id = %auth.user_id, "User deleted");
    Ok(response::message("User deleted"))
}

pub async fn stats(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Envelope<Stats>>, AppError> {
    auth.require_admin()?;
    let pool = &state.pool;

    let users = db::users::count_by_role(pool, Role::User).await?;
    let agents = db::users::count_by_role(pool, Role::Agent).await?;
    let admins = db::users::count_by_role(pool, Role::Admin).await?;

    let pending = db::agencies::count_by_status(pool, AgencyStatus::Pending).await?;
    let approved = db::agencies::count_by_status(pool, AgencyStatus::Approved).await?;
    let rejected = db::agencies::count_by_status(pool, AgencyStatus::Rejected).await?;

    let cars = db::listings::count_all(pool, db::cars::TABLE).await?;
    let motorcycles = db::listings::count_all(pool, db::motorcycles::TABLE).await?;

    Ok(response::ok(Stats {
        users: UserCounts {
            total: users + agents + admins,
            users,
            agents,
            admins,
        },
        agencies: AgencyCounts {
            total: pending + approved + rejected,
            pending,
            approved,
            rejected,
        },
        cars,
        motorcycles,
    }))
}
