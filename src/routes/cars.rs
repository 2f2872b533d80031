use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::auth::guard;
use crate::db;
use crate::db::cars::{CarFields, TABLE};
use crate::error::AppError;
use crate::extract::{Path, Query};
use crate::models::{Car, Listing, VehicleType};
use crate::response::{self, Envelope, Page};
use crate::routes::listings::{self, FeedQuery, ListingView};
use crate::state::SharedState;
use crate::upload::FormPayload;

pub async fn list(
    State(state): State<SharedState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Envelope<Page<ListingView<Car>>>>, AppError> {
    let filter = query.public_filter();
    let (page, per_page, offset) = response::paginate(query.page, query.per_page);

    let cars: Vec<Car> = db::listings::list(&state.pool, TABLE, &filter, per_page, offset).await?;
    let total = db::listings::count(&state.pool, TABLE, &filter).await?;
    let items = listings::populate(&state, cars).await?;

    Ok(response::ok(Page::new(items, total, page, per_page)))
}

pub async fn mine(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Envelope<Page<ListingView<Car>>>>, AppError> {
    auth.require_agent()?;
    let agency = db::agencies::find_by_owner(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("You have no agency yet".to_string()))?;

    let filter = query.owner_filter(agency.id);
    let (page, per_page, offset) = response::paginate(query.page, query.per_page);

    let cars: Vec<Car> = db::listings::list(&state.pool, TABLE, &filter, per_page, offset).await?;
    let total = db::listings::count(&state.pool, TABLE, &filter).await?;
    let items = listings::populate(&state, cars).await?;

    Ok(response::ok(Page::new(items, total, page, per_page)))
}

pub async fn get(
    auth: Option<AuthUser>,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<ListingView<Car>>>, AppError> {
    let car = find(&state, id).await?;
    listings::check_visible(&state, auth.as_ref(), &car).await?;
    Ok(response::ok(listings::populate_one(&state, car).await?))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Envelope<ListingView<Car>>>), AppError> {
    let form = FormPayload::from_request(&headers, body, state.config.max_image_size).await?;
    let agency = listings::agency_for_create(&state, &auth, &form).await?;

    let mut fields = CarFields {
        core: listings::core_from_form(&form)?,
        fuel_type: None,
        transmission: None,
        seats: None,
        doors: None,
    };
    apply_car_form(&mut fields, &form)?;
    guard::check_agency_handles(&agency, VehicleType::Car, fields.core.transaction_type)?;

    fields.core.images = listings::store_new_images(&state, &form).await?;

    let car = match db::cars::create(&state.pool, agency.id, &fields).await {
        Ok(car) => car,
        Err(e) => return Err(listings::discard_on_error(&state, &fields.core.images, e).await),
    };

    tracing::info!(car_id = %car.id, agency_id = %agency.id, images = car.images().len(), "Car listed");
    Ok((
        StatusCode::CREATED,
        response::ok(listings::populate_one(&state, car).await?),
    ))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Envelope<ListingView<Car>>>, AppError> {
    let car = find(&state, id).await?;
    let agency = listings::agency_for_mutation(&state, &auth, &car).await?;

    let form = FormPayload::from_request(&headers, body, state.config.max_image_size).await?;
    let current_images = car.images().to_vec();
    let mut fields = CarFields::from(car);
    listings::apply_core_form(&mut fields.core, &form)?;
    apply_car_form(&mut fields, &form)?;
    guard::check_agency_handles(&agency, VehicleType::Car, fields.core.transaction_type)?;

    let changes = listings::apply_image_changes(&state, &form, &current_images).await?;
    fields.core.images = changes.images;

    let updated = match db::cars::update(&state.pool, id, &fields).await {
        Ok(car) => car,
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
    let car = find(&state, id).await?;
    listings::agency_for_mutation(&state, &auth, &car).await?;

    db::listings::delete(&state.pool, TABLE, id).await?;
    state.images.remove_all(car.images()).await;

    tracing::info!(car_id = %id, "Car deleted");
    Ok(response::message("Car deleted"))
}

async fn find(state: &SharedState, id: Uuid) -> Result<Car, AppError> {
    db::listings::find_by_id(&state.pool, TABLE, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))
}

fn apply_car_form(fields: &mut CarFields, form: &FormPayload) -> Result<(), AppError> {
    form.update_opt_text(&mut fields.fuel_type, "fuel_type");
    form.update_opt_text(&mut fields.transmission, "transmission");
    form.update_opt_number(&mut fields.seats, "seats")?;
    form.update_opt_number(&mut fields.doors, "doors")?;
    listings::positive(fields.seats, "seats")?;
    listings::positive(fields.doors, "doors")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn car_specific_fields_are_validated() {
        let form = FormPayload::from_json(&json!({
            "brand": "Peugeot",
            "model": "208",
            "year": 2021,
            "condition": "new",
            "transaction_type": "rental",
            "price": 45,
            "fuel_type": "diesel",
            "seats": "5",
            "doors": 0,
        }))
        .unwrap();

        let mut fields = CarFields {
            core: listings::core_from_form(&form).unwrap(),
            fuel_type: None,
            transmission: None,
            seats: None,
            doors: None,
        };
        assert!(matches!(
            apply_car_form(&mut fields, &form),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(fields.fuel_type.as_deref(), Some("diesel"));
        assert_eq!(fields.seats, Some(5));
    }
}
