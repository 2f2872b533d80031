use axum::Json;
use serde::Serialize;
use serde_json::{Value, json};

/// `{ "success": true, "data": ... }`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
    })
}

/// `{ "success": true, "message": ... }` for mutations with nothing to return.
pub fn message(msg: &str) -> Json<Value> {
    Json(json!({ "success": true, "message": msg }))
}

/// One page of a listing feed.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };
        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

const MAX_PER_PAGE: i64 = 100;

/// Clamp client-supplied pagination to `(page, per_page, offset)`.
pub fn paginate(page: Option<i64>, per_page: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).clamp(1, i64::MAX / MAX_PER_PAGE);
    let per_page = per_page.unwrap_or(20).clamp(1, MAX_PER_PAGE);
    (page, per_page, (page - 1) * per_page)
}
