use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db;
use crate::error::AppError;
use crate::extract::Query;
use crate::models::{Car, Motorcycle};
use crate::response::{self, Envelope};
use crate::routes::listings::{self, ListingView};
use crate::state::SharedState;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    Car,
    Motorcycle,
    #[default]
    All,
}

impl SearchScope {
    fn cars(self) -> bool {
        matches!(self, SearchScope::Car | SearchScope::All)
    }

    fn motorcycles(self) -> bool {
        matches!(self, SearchScope::Motorcycle | SearchScope::All)
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    #[serde(rename = "type", default)]
    pub scope: SearchScope,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct SearchResults {
    pub query: String,
    pub cars: Vec<ListingView<Car>>,
    pub motorcycles: Vec<ListingView<Motorcycle>>,
    pub total: usize,
}

pub async fn search(
    State(state): State<SharedState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Envelope<SearchResults>>, AppError> {
    let term = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::BadRequest("Search query q is required".to_string()))?
        .to_string();
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let cars: Vec<Car> = if query.scope.cars() {
        db::listings::search(&state.pool, db::cars::TABLE, &term, limit).await?
    } else {
        Vec::new()
    };
    let motorcycles: Vec<Motorcycle> = if query.scope.motorcycles() {
        db::listings::search(&state.pool, db::motorcycles::TABLE, &term, limit).await?
    } else {
        Vec::new()
    };

    let cars = listings::populate(&state, cars).await?;
    let motorcycles = listings::populate(&state, motorcycles).await?;
    let total = cars.len() + motorcycles.len();

    Ok(response::ok(SearchResults {
        query: term,
        cars,
        motorcycles,
        total,
    }))
}
