//! Plumbing shared by the car and motorcycle handlers: feed queries, agency
//! resolution for writes, form merging, image bookkeeping, and populating the
//! owning agency into responses.

use std::collections::HashMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::auth::guard;
use crate::db;
use crate::db::listings::{ListingCore, ListingFilter};
use crate::error::AppError;
use crate::models::{
    Agency, AgencySummary, Listing, ListingCondition, ListingImage, ListingStatus,
    TransactionType,
};
use crate::state::SharedState;
use crate::upload::FormPayload;

pub const MAX_IMAGES: usize = 10;
pub const IMAGE_FIELD: &str = "images";
const MIN_YEAR: i32 = 1886;

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub status: Option<ListingStatus>,
    pub transaction_type: Option<TransactionType>,
    pub condition: Option<ListingCondition>,
    pub brand: Option<String>,
    pub agency_id: Option<Uuid>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl FeedQuery {
    /// Public feeds only show available listings of approved agencies unless
    /// another status is asked for.
    pub fn public_filter(&self) -> ListingFilter {
        ListingFilter {
            status: Some(self.status.unwrap_or(ListingStatus::Available)),
            approved_only: true,
            ..self.filter()
        }
    }

    /// An agency's own view: every status, no approval restriction.
    pub fn owner_filter(&self, agency_id: Uuid) -> ListingFilter {
        ListingFilter {
            agency_id: Some(agency_id),
            approved_only: false,
            ..self.filter()
        }
    }

    fn filter(&self) -> ListingFilter {
        ListingFilter {
            status: self.status,
            transaction_type: self.transaction_type,
            condition: self.condition,
            brand: self.brand.clone(),
            agency_id: self.agency_id,
            min_price: self.min_price,
            max_price: self.max_price,
            min_year: self.min_year,
            max_year: self.max_year,
            approved_only: false,
        }
    }
}

/// A listing with its agency embedded for display.
#[derive(Debug, Serialize)]
pub struct ListingView<T> {
    #[serde(flatten)]
    pub listing: T,
    pub agency: Option<AgencySummary>,
}

pub async fn populate<T: Listing>(
    state: &SharedState,
    listings: Vec<T>,
) -> Result<Vec<ListingView<T>>, AppError> {
    let mut ids: Vec<Uuid> = listings.iter().map(Listing::agency_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let agencies: HashMap<Uuid, AgencySummary> = db::agencies::summaries_by_ids(&state.pool, &ids)
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    Ok(listings
        .into_iter()
        .map(|listing| {
            let agency = agencies.get(&listing.agency_id()).cloned();
            ListingView { listing, agency }
        })
        .collect())
}

pub async fn populate_one<T: Listing>(
    state: &SharedState,
    listing: T,
) -> Result<ListingView<T>, AppError> {
    let mut views = populate(state, vec![listing]).await?;
    views
        .pop()
        .ok_or_else(|| AppError::Internal("populate returned no rows".to_string()))
}

/// Agency a new listing will belong to. Agents always write into their own
/// agency; admins must name one with `agency_id`.
pub async fn agency_for_create(
    state: &SharedState,
    auth: &AuthUser,
    form: &FormPayload,
) -> Result<Agency, AppError> {
    auth.require_agent_or_admin()?;

    let agency = if auth.is_admin() {
        let agency_id: Uuid = form
            .text("agency_id")
            .flatten()
            .ok_or_else(|| AppError::BadRequest("agency_id is required".to_string()))?
            .parse()
            .map_err(|_| AppError::BadRequest("agency_id must be a UUID".to_string()))?;
        db::agencies::find_by_id(&state.pool, agency_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Agency not found".to_string()))?
    } else {
        db::agencies::find_by_owner(&state.pool, auth.user_id)
            .await?
            .ok_or_else(|| {
                AppError::Forbidden("Create an agency before adding listings".to_string())
            })?
    };

    guard::check_listing_mutation(auth, &agency)?;
    Ok(agency)
}

/// Agency owning an existing listing, checked for the acting user.
pub async fn agency_for_mutation<T: Listing>(
    state: &SharedState,
    auth: &AuthUser,
    listing: &T,
) -> Result<Agency, AppError> {
    let agency = db::agencies::find_by_id(&state.pool, listing.agency_id())
        .await?
        .ok_or_else(|| AppError::NotFound("Agency not found".to_string()))?;
    guard::check_listing_mutation(auth, &agency)?;
    Ok(agency)
}

/// Public reads hide listings whose agency is not approved, except from the
/// owner and admins.
pub async fn check_visible<T: Listing>(
    state: &SharedState,
    viewer: Option<&AuthUser>,
    listing: &T,
) -> Result<(), AppError> {
    let agency = db::agencies::find_by_id(&state.pool, listing.agency_id())
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;
    if guard::can_view_agency(viewer, &agency) {
        Ok(())
    } else {
        Err(AppError::NotFound("Listing not found".to_string()))
    }
}

/// Required core fields for a new listing, then any optional ones.
pub fn core_from_form(form: &FormPayload) -> Result<ListingCore, AppError> {
    let mut core = ListingCore {
        brand: form.required_text("brand")?,
        model: form.required_text("model")?,
        year: form.required_number("year")?,
        condition: form.required_choice("condition")?,
        transaction_type: form.required_choice("transaction_type")?,
        price: form.required_number("price")?,
        mileage: None,
        color: None,
        category: None,
        power: None,
        registration_plate: None,
        description: None,
        features: Vec::new(),
        status: ListingStatus::Available,
        images: Vec::new(),
    };
    apply_core_form(&mut core, form)?;
    Ok(core)
}

pub fn apply_core_form(core: &mut ListingCore, form: &FormPayload) -> Result<(), AppError> {
    form.update_text(&mut core.brand, "brand")?;
    form.update_text(&mut core.model, "model")?;
    form.update_number(&mut core.year, "year")?;
    form.update_choice(&mut core.condition, "condition")?;
    form.update_choice(&mut core.transaction_type, "transaction_type")?;
    form.update_number(&mut core.price, "price")?;
    form.update_opt_number(&mut core.mileage, "mileage")?;
    form.update_opt_text(&mut core.color, "color");
    form.update_opt_text(&mut core.category, "category");
    form.update_opt_number(&mut core.power, "power")?;
    form.update_opt_text(&mut core.registration_plate, "registration_plate");
    form.update_opt_text(&mut core.description, "description");
    form.update_list(&mut core.features, "features");
    form.update_choice(&mut core.status, "status")?;

    core.registration_plate = core
        .registration_plate
        .take()
        .map(|plate| normalize_plate(&plate));
    validate_core(core)
}

pub fn normalize_plate(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

pub fn validate_core(core: &ListingCore) -> Result<(), AppError> {
    let latest = chrono::Utc::now().year() + 1;
    if core.year < MIN_YEAR || core.year > latest {
        return Err(AppError::BadRequest(format!(
            "year must be between {MIN_YEAR} and {latest}"
        )));
    }
    if !core.price.is_finite() || core.price < 0.0 {
        return Err(AppError::BadRequest("price must be zero or more".to_string()));
    }
    non_negative(core.mileage, "mileage")?;
    non_negative(core.power, "power")?;
    Ok(())
}

pub fn non_negative(value: Option<i32>, name: &str) -> Result<(), AppError> {
    match value {
        Some(v) if v < 0 => Err(AppError::BadRequest(format!("{name} cannot be negative"))),
        _ => Ok(()),
    }
}

pub fn positive(value: Option<i32>, name: &str) -> Result<(), AppError> {
    match value {
        Some(v) if v <= 0 => Err(AppError::BadRequest(format!("{name} must be positive"))),
        _ => Ok(()),
    }
}

/// Outcome of applying an update's image changes. Files in `added` are
/// already on disk; `removed` are deleted only once the row is saved.
pub struct ImageChanges {
    pub images: Vec<ListingImage>,
    pub added: Vec<ListingImage>,
    pub removed: Vec<ListingImage>,
}

/// Store uploads for a new listing.
pub async fn store_new_images(
    state: &SharedState,
    form: &FormPayload,
) -> Result<Vec<ListingImage>, AppError> {
    let parts = form.files(IMAGE_FIELD);
    if parts.len() > MAX_IMAGES {
        return Err(AppError::BadRequest(format!(
            "A listing can have at most {MAX_IMAGES} images"
        )));
    }
    state.images.save_all(&parts).await
}

/// Drop images listed in `remove_images` (by URL) and append new uploads.
pub async fn apply_image_changes(
    state: &SharedState,
    form: &FormPayload,
    current: &[ListingImage],
) -> Result<ImageChanges, AppError> {
    let to_remove = form.list("remove_images").unwrap_or_default();
    let (removed, kept): (Vec<ListingImage>, Vec<ListingImage>) = current
        .iter()
        .cloned()
        .partition(|img| to_remove.contains(&img.url));

    let parts = form.files(IMAGE_FIELD);
    if kept.len() + parts.len() > MAX_IMAGES {
        return Err(AppError::BadRequest(format!(
            "A listing can have at most {MAX_IMAGES} images"
        )));
    }

    let added = state.images.save_all(&parts).await?;
    let mut images = kept;
    images.extend(added.iter().cloned());

    Ok(ImageChanges {
        images,
        added,
        removed,
    })
}

/// Map a failed insert/update, removing files stored for it.
pub async fn discard_on_error(
    state: &SharedState,
    added: &[ListingImage],
    err: sqlx::Error,
) -> AppError {
    state.images.remove_all(added).await;
    AppError::unique_violation(err, "Registration plate is already in use")
}
