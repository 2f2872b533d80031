use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::auth::guard;
use crate::db;
use crate::db::agencies::AgencyFields;
use crate::error::AppError;
use crate::extract::{Path, Query};
use crate::models::{Agency, AgencyStatus, ListingImage, TransactionType, VehicleType};
use crate::response::{self, Envelope};
use crate::state::SharedState;
use crate::upload::FormPayload;

const LOGO_FIELD: &str = "logo";

#[derive(Debug, Deserialize)]
pub struct AgencyListQuery {
    pub status: Option<AgencyStatus>,
}

pub async fn list(
    auth: Option<AuthUser>,
    State(state): State<SharedState>,
    Query(query): Query<AgencyListQuery>,
) -> Result<Json<Envelope<Vec<Agency>>>, AppError> {
    let status = match auth {
        Some(ref a) if a.is_admin() => query.status,
        _ => Some(AgencyStatus::Approved),
    };
    let agencies = db::agencies::list(&state.pool, status).await?;
    Ok(response::ok(agencies))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Envelope<Agency>>), AppError> {
    auth.require_agent()?;

    if db::agencies::find_by_owner(&state.pool, auth.user_id)
        .await?
        .is_some()
    {
        return Err(AppError::BadRequest("You already have an agency".to_string()));
    }

    let form = FormPayload::from_request(&headers, body, state.config.max_image_size).await?;
    let mut fields = AgencyFields {
        name: form.required_text("name")?,
        description: None,
        address: None,
        city: None,
        phone: None,
        email: None,
        logo: None,
        vehicle_types: required_kinds::<VehicleType>(&form, "vehicle_types")?,
        transaction_types: required_kinds::<TransactionType>(&form, "transaction_types")?,
    };
    apply_contact_fields(&mut fields, &form);

    let logo = store_logo(&state, &form).await?;
    fields.logo = logo.as_ref().map(|l| l.url.clone());

    let agency = match db::agencies::create(&state.pool, auth.user_id, &fields).await {
        Ok(agency) => agency,
        Err(e) => {
            if let Some(logo) = &logo {
                state.images.remove(logo).await;
            }
            return Err(AppError::unique_violation(e, "You already have an agency"));
        }
    };

    tracing::info!(agency_id = %agency.id, owner_id = %auth.user_id, "Agency created, pending approval");
    Ok((StatusCode::CREATED, response::ok(agency)))
}

pub async fn mine(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Envelope<Agency>>, AppError> {
    auth.require_agent()?;
    let agency = db::agencies::find_by_owner(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("You have no agency yet".to_string()))?;
    Ok(response::ok(agency))
}

pub async fn get(
    auth: Option<AuthUser>,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<Agency>>, AppError> {
    let agency = db::agencies::find_by_id(&state.pool, id)
        .await?
        .filter(|a| guard::can_view_agency(auth.as_ref(), a))
        .ok_or_else(|| AppError::NotFound("Agency not found".to_string()))?;
    Ok(response::ok(agency))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Envelope<Agency>>, AppError> {
    let agency = db::agencies::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Agency not found".to_string()))?;
    guard::check_agency_owner(&auth, &agency)?;

    let form = FormPayload::from_request(&headers, body, state.config.max_image_size).await?;
    let mut fields = AgencyFields::from(&agency);
    form.update_text(&mut fields.name, "name")?;
    apply_contact_fields(&mut fields, &form);
    if let Some(kinds) = form.choices::<VehicleType>("vehicle_types")? {
        fields.vehicle_types = non_empty(kinds, "vehicle_types")?;
    }
    if let Some(kinds) = form.choices::<TransactionType>("transaction_types")? {
        fields.transaction_types = non_empty(kinds, "transaction_types")?;
    }

    let new_logo = store_logo(&state, &form).await?;
    if let Some(logo) = &new_logo {
        fields.logo = Some(logo.url.clone());
    }

    let mut updated = match db::agencies::update(&state.pool, id, &fields).await {
        Ok(updated) => updated,
        Err(e) => {
            if let Some(logo) = &new_logo {
                state.images.remove(logo).await;
            }
            return Err(AppError::Database(e));
        }
    };

    if new_logo.is_some() {
        if let Some(old) = &agency.logo {
            state.images.remove_url(old).await;
        }
    }

    // An owner editing a rejected agency resubmits it for review.
    if !auth.is_admin() && updated.status == AgencyStatus::Rejected {
        updated = db::agencies::set_status(&state.pool, id, AgencyStatus::Pending, None).await?;
        tracing::info!(agency_id = %id, "Rejected agency resubmitted for review");
    }

    Ok(response::ok(updated))
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    auth.require_admin()?;

    let agency = db::agencies::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Agency not found".to_string()))?;

    let files = agency_files(&state, &agency).await?;
    db::agencies::delete(&state.pool, id).await?;
    remove_files(&state, &files).await;

    tracing::info!(agency_id = %id, files = files.len(), "Agency deleted");
    Ok(response::message("Agency deleted"))
}

/// Every upload owned by an agency: its listings' images and its logo.
pub(crate) async fn agency_files(
    state: &SharedState,
    agency: &Agency,
) -> Result<Vec<String>, AppError> {
    let mut urls: Vec<String> = Vec::new();
    for table in [db::cars::TABLE, db::motorcycles::TABLE] {
        let images = db::listings::images_for_agency(&state.pool, table, agency.id).await?;
        urls.extend(images.into_iter().map(|img| img.url));
    }
    urls.extend(agency.logo.clone());
    Ok(urls)
}

pub(crate) async fn remove_files(state: &SharedState, urls: &[String]) {
    for url in urls {
        state.images.remove_url(url).await;
    }
}

fn apply_contact_fields(fields: &mut AgencyFields, form: &FormPayload) {
    form.update_opt_text(&mut fields.description, "description");
    form.update_opt_text(&mut fields.address, "address");
    form.update_opt_text(&mut fields.city, "city");
    form.update_opt_text(&mut fields.phone, "phone");
    form.update_opt_text(&mut fields.email, "email");
}

fn required_kinds<T>(form: &FormPayload, name: &str) -> Result<Vec<T>, AppError>
where
    T: serde::de::DeserializeOwned + PartialEq,
{
    let kinds = form
        .choices::<T>(name)?
        .ok_or_else(|| AppError::BadRequest(format!("{name} is required")))?;
    non_empty(kinds, name)
}

fn non_empty<T>(kinds: Vec<T>, name: &str) -> Result<Vec<T>, AppError> {
    if kinds.is_empty() {
        Err(AppError::BadRequest(format!("{name} cannot be empty")))
    } else {
        Ok(kinds)
    }
}

async fn store_logo(
    state: &SharedState,
    form: &FormPayload,
) -> Result<Option<ListingImage>, AppError> {
    match form.files(LOGO_FIELD).as_slice() {
        [] => Ok(None),
        [part] => state.images.save(part).await.map(Some),
        _ => Err(AppError::BadRequest("Only one logo may be uploaded".to_string())),
    }
}
