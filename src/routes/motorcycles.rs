use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::auth::guard;
use crate::db;
use crate::db::motorcycles::{MotorcycleFields, TABLE};
use crate::error::AppError;
use crate::extract::{Path, Query};
use crate::models::{Listing, Motorcycle, VehicleType};
use crate::response::{self, Envelope, Page};
use crate::routes::listings::{self, FeedQuery, ListingView};
use crate::state::SharedState;
use crate::upload::FormPayload;

pub async fn list(
    State(state): State<SharedState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Envelope<Page<ListingView<Motorcycle>>>>, AppError> {
    let filter = query.public_filter();
    let (page, per_page, offset) = response::paginate(query.page, query.per_page);

    let motorcycles: Vec<Motorcycle> =
        db::listings::list(&state.pool, TABLE, &filter, per_page, offset).await?;
    let total = db::listings::count(&state.pool, TABLE, &filter).await?;
    let items = listings::populate(&state, motorcycles).await?;

    Ok(response::ok(Page::new(items, total, page, per_page)))
}

pub async fn mine(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Envelope<Page<ListingView<Motorcycle>>>>, AppError> {
    auth.require_agent()?;
    let agency = db::agencies::find_by_owner(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("You have no agency yet".to_string()))?;

    let filter = query.owner_filter(agency.id);
    let (page, per_page, offset) = response::paginate(query.page, query.per_page);

    let motorcycles: Vec<Motorcycle> =
        db::listings::list(&state.pool, TABLE, &filter, per_page, offset).await?;
    let total = db::listings::count(&state.pool, TABLE, &filter).await?;
    let items = listings::populate(&state, motorcycles).await?;

    Ok(response::ok(Page::new(items, total, page, per_page)))
}

pub async fn get(
    auth: Option<AuthUser>,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<ListingView<Motorcycle>>>, AppError> {
    let moto = find(&state, id).await?;
    listings::check_visible(&state, auth.as_ref(), &moto).await?;
    Ok(response::ok(listings::populate_one(&state, moto).await?))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Envelope<ListingView<Motorcycle>>>), AppError> {
    let form = FormPayload::from_request(&headers, body, state.config.max_image_size).await?;
    let agency = listings::agency_for_create(&state, &auth, &form).await?;

    let mut fields = MotorcycleFields {
        core: listings::core_from_form(&form)?,
        displacement: None,
    };
    apply_motorcycle_form(&mut fields, &form)?;
    guard::check_agency_handles(
        &agency,
        VehicleType::Motorcycle,
        fields.core.transaction_type,
    )?;

    fields.core.images = listings::store_new_images(&state, &form).await?;

    let moto = match db::motorcycles::create(&state.pool, agency.id, &fields).await {
        Ok(moto) => moto,
        Err(e) => return Err(listings::discard_on_error(&state, &fields.core.images, e).await),
    };

    tracing::info!(motorcycle_id = %moto.id, agency_id = %agency.id, images = moto.images().len(), "Motorcycle listed");
    Ok((
        StatusCode::CREATED,
        response::ok(listings::populate_one(&state, moto).await?),
    ))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Envelope<ListingView<Motorcycle>>>, AppError> {
    let moto = find(&state, id).await?;
    let agency = listings::agency_for_mutation(&state, &auth, &moto).await?;

    let form = FormPayload::from_request(&headers, body, state.config.max_image_size).await?;
    let current_images = moto.images().to_vec();
    let mut fields = MotorcycleFields::from(moto);
    listings::apply_core_form(&mut fields.core, &form)?;
    apply_motorcycle_form(&mut fields, &form)?;
    guard::check_agency_handles(
        &agency,
        VehicleType::Motorcycle,
        fields.core.transaction_type,
    )?;

    let changes = listings::apply_image_changes(&state, &form, &current_images).await?;
    fields.core.images = changes.images;

    let updated = match db::motorcycles::update(&state.pool, id, &fields).await {
        Ok(moto) => moto,
        Err(e) => return Err(listings::discard_on_error(&state, &changes.added, e).await),
    };
    state.images.remove_all(&changes.removed).await;

    Ok(response::ok(listings::populate_one(&state, updated).await?))
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let moto = find(&state, id).await?;
    listings::agency_for_mutation(&state, &auth, &moto).await?;

    db::listings::delete(&state.pool, TABLE, id).await?;
    state.images.remove_all(moto.images()).await;

    tracing::info!(motorcycle_id = %id, "Motorcycle deleted");
    Ok(response::message("Motorcycle deleted"))
}

async fn find(state: &SharedState, id: Uuid) -> Result<Motorcycle, AppError> {
    db::listings::find_by_id(&state.pool, TABLE, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))
}

fn apply_motorcycle_form(fields: &mut MotorcycleFields, form: &FormPayload) -> Result<(), AppError> {
    form.update_opt_number(&mut fields.displacement, "displacement")?;
    listings::positive(fields.displacement, "displacement")
}
