//! SQL shared by the `cars` and `motorcycles` tables. Both carry the same core
//! columns, so feed, search and delete queries are written once and take the
//! table name from the per-kind module's `TABLE` constant.

use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{ListingCondition, ListingImage, ListingStatus, TransactionType};

/// Writable columns common to every listing table.
#[derive(Debug, Clone)]
pub struct ListingCore {
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub condition: ListingCondition,
    pub transaction_type: TransactionType,
    pub price: f64,
    pub mileage: Option<i32>,
    pub color: Option<String>,
    pub category: Option<String>,
    pub power: Option<i32>,
    pub registration_plate: Option<String>,
    pub description: Option<String>,
    pub features: Vec<String>,
    pub status: ListingStatus,
    pub images: Vec<ListingImage>,
}

#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub status: Option<ListingStatus>,
    pub transaction_type: Option<TransactionType>,
    pub condition: Option<ListingCondition>,
    pub brand: Option<String>,
    pub agency_id: Option<Uuid>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    /// Restrict to listings whose agency is approved (public feeds).
    pub approved_only: bool,
}

/// Build an ILIKE pattern matching `term` as a literal substring.
pub fn contains_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ListingFilter) {
    if filter.approved_only {
        qb.push(" AND a.status = 'approved'");
    }
    if let Some(status) = filter.status {
        qb.push(" AND l.status = ").push_bind(status);
    }
    if let Some(transaction_type) = filter.transaction_type {
        qb.push(" AND l.transaction_type = ").push_bind(transaction_type);
    }
    if let Some(condition) = filter.condition {
        qb.push(" AND l.condition = ").push_bind(condition);
    }
    if let Some(brand) = filter.brand.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        qb.push(" AND l.brand ILIKE ").push_bind(contains_pattern(brand));
    }
    if let Some(agency_id) = filter.agency_id {
        qb.push(" AND l.agency_id = ").push_bind(agency_id);
    }
    if let Some(min_price) = filter.min_price {
        qb.push(" AND l.price >= ").push_bind(min_price);
    }
    if let Some(max_price) = filter.max_price {
        qb.push(" AND l.price <= ").push_bind(max_price);
    }
    if let Some(min_year) = filter.min_year {
        qb.push(" AND l.year >= ").push_bind(min_year);
    }
    if let Some(max_year) = filter.max_year {
        qb.push(" AND l.year <= ").push_bind(max_year);
    }
}

fn base_query<'a>(select: &str, table: &'static str) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(select);
    qb.push(" FROM ")
        .push(table)
        .push(" l JOIN agencies a ON a.id = l.agency_id WHERE TRUE");
    qb
}

pub async fn list<T>(
    pool: &PgPool,
    table: &'static str,
    filter: &ListingFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<T>, sqlx::Error>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut qb = base_query("SELECT l.*", table);
    push_filters(&mut qb, filter);
    qb.push(" ORDER BY l.created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    qb.build_query_as::<T>().fetch_all(pool).await
}

pub async fn count(
    pool: &PgPool,
    table: &'static str,
    filter: &ListingFilter,
) -> Result<i64, sqlx::Error> {
    let mut qb = base_query("SELECT COUNT(*)", table);
    push_filters(&mut qb, filter);
    let row: (i64,) = qb.build_query_as::<(i64,)>().fetch_one(pool).await?;
    Ok(row.0)
}

/// Case-insensitive substring search over brand, model, plate and category,
/// limited to approved agencies.
pub async fn search<T>(
    pool: &PgPool,
    table: &'static str,
    term: &str,
    limit: i64,
) -> Result<Vec<T>, sqlx::Error>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let pattern = contains_pattern(term);
    let mut qb = base_query("SELECT l.*", table);
    qb.push(" AND a.status = 'approved' AND (l.brand ILIKE ")
        .push_bind(pattern.clone())
        .push(" OR l.model ILIKE ")
        .push_bind(pattern.clone())
        .push(" OR l.registration_plate ILIKE ")
        .push_bind(pattern.clone())
        .push(" OR l.category ILIKE ")
        .push_bind(pattern)
        .push(") ORDER BY l.created_at DESC LIMIT ")
        .push_bind(limit);
    qb.build_query_as::<T>().fetch_all(pool).await
}

pub async fn find_by_id<T>(pool: &PgPool, table: &'static str, id: Uuid) -> Result<Option<T>, sqlx::Error>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    sqlx::query_as::<_, T>(&format!("SELECT * FROM {table} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn delete(pool: &PgPool, table: &'static str, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Every image stored by an agency's listings in `table`.
pub async fn images_for_agency(
    pool: &PgPool,
    table: &'static str,
    agency_id: Uuid,
) -> Result<Vec<ListingImage>, sqlx::Error> {
    let rows: Vec<(Json<Vec<ListingImage>>,)> =
        sqlx::query_as(&format!("SELECT images FROM {table} WHERE agency_id = $1"))
            .bind(agency_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().flat_map(|(images,)| images.0).collect())
}

pub async fn count_all(pool: &PgPool, table: &'static str) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_wraps_term() {
        assert_eq!(contains_pattern("golf"), "%golf%");
    }

    #[test]
    fn pattern_escapes_like_wildcards() {
        assert_eq!(contains_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }
}
