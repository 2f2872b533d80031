use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::response::{self, Envelope};
use crate::state::SharedState;
use crate::suggestion::VehicleSuggestion;
use crate::upload::{FormPayload, ImageKind};

const IMAGE_FIELD: &str = "image";

/// Suggest listing fields from one photo. Input problems are a 400; anything
/// that goes wrong after the upload is accepted still answers with a
/// (possibly unknown) suggestion.
pub async fn vehicle(
    auth: AuthUser,
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Envelope<VehicleSuggestion>>, AppError> {
    auth.require_agent_or_admin()?;

    let form = FormPayload::from_request(&headers, body, state.config.max_image_size).await?;
    if form.file_count() == 0 {
        return Err(AppError::BadRequest("An image file is required".to_string()));
    }
    let part = match form.files(IMAGE_FIELD).as_slice() {
        [part] if form.file_count() == 1 => (*part).clone(),
        [] => {
            return Err(AppError::BadRequest(format!(
                "Upload the image in the '{IMAGE_FIELD}' field"
            )));
        }
        _ => return Err(AppError::BadRequest("Upload exactly one image".to_string())),
    };
    let kind = ImageKind::sniff(&part.data).ok_or_else(|| {
        AppError::BadRequest(format!("{} is not a supported image", part.filename))
    })?;

    let suggestion = match state.images.write_temp(&part, kind).await {
        Ok(path) => state.suggester.suggest_file(&path, kind).await,
        Err(e) => {
            tracing::warn!("Suggestion fell back to unknown: {e}");
            VehicleSuggestion::unknown()
        }
    };

    Ok(response::ok(suggestion))
}
