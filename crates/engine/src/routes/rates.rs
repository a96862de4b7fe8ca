//! Shipping rate and relay-point lookups.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use crate::boxtal::RelayPoint;
use crate::boxtal::rates::RateQuote;
use crate::error::AppError;
use crate::state::AppState;

/// Create rate lookup routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/rates", get(quote_rates))
        .route("/api/relay-points", get(search_relay_points))
}

#[derive(Debug, Deserialize)]
struct RatesQuery {
    country: String,
    /// Total parcel weight in grams.
    weight: i32,
}

#[derive(Debug, Deserialize)]
struct RelayQuery {
    country: String,
    zip: String,
    /// Total parcel weight in grams.
    weight: i32,
}

/// Quote available delivery methods for a destination and weight.
#[instrument(skip(state))]
async fn quote_rates(
    State(state): State<AppState>,
    Query(query): Query<RatesQuery>,
) -> Result<Json<Vec<RateQuote>>, AppError> {
    if query.weight <= 0 {
        return Err(AppError::BadRequest("weight must be positive".to_string()));
    }
    let quotes = state.rates().quotes(&query.country, query.weight).await?;
    Ok(Json(quotes))
}

/// Search relay points around a postal code.
///
/// Results are cached for a day; clients are expected to debounce input
/// before calling.
#[instrument(skip(state))]
async fn search_relay_points(
    State(state): State<AppState>,
    Query(query): Query<RelayQuery>,
) -> Result<Json<Vec<RelayPoint>>, AppError> {
    let points = state
        .boxtal()
        .search_relay_points(state.cache(), &query.country, &query.zip, query.weight)
        .await?;
    Ok(Json(points))
}
