//! Operator-editable settings.
//!
//! Editing the billing calendar is the trigger for schedule
//! synchronization; editing a rate table invalidates every cached quote.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use chrono::NaiveDate;
use serde::Deserialize;
use terroir_core::ShippingMethod;
use tracing::{info, instrument};

use crate::boxtal::rates::{RateTier, Zone};
use crate::db::settings;
use crate::error::AppError;
use crate::services::SyncReport;
use crate::state::AppState;

/// Create settings routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/settings/billing-dates",
            get(get_billing_dates).put(put_billing_dates),
        )
        .route("/api/settings/shipping-rates", put(put_shipping_rates))
        .route("/api/settings/display", get(get_display).put(put_display))
}

/// Read the global billing calendar.
#[instrument(skip(state))]
async fn get_billing_dates(
    State(state): State<AppState>,
) -> Result<Json<Vec<NaiveDate>>, AppError> {
    Ok(Json(settings::billing_dates(state.pool()).await?))
}

/// Replace the global billing calendar and synchronize every customer's
/// schedule against it. Returns the per-customer batch report.
#[instrument(skip(state, dates))]
async fn put_billing_dates(
    State(state): State<AppState>,
    Json(mut dates): Json<Vec<NaiveDate>>,
) -> Result<Json<SyncReport>, AppError> {
    if dates.is_empty() {
        return Err(AppError::BadRequest(
            "billing calendar cannot be empty".to_string(),
        ));
    }
    dates.sort_unstable();
    dates.dedup();

    settings::set_billing_dates(state.pool(), &dates).await?;
    info!(dates = dates.len(), "billing calendar updated");

    let today = chrono::Utc::now().date_naive();
    let report = state.schedule_sync().sync_all(&dates, today).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
struct RateTableUpdate {
    method: ShippingMethod,
    zone: Zone,
    tiers: Vec<RateTier>,
}

/// Replace one operator-edited rate table.
#[instrument(skip(state, update))]
async fn put_shipping_rates(
    State(state): State<AppState>,
    Json(update): Json<RateTableUpdate>,
) -> Result<StatusCode, AppError> {
    if update.tiers.is_empty() {
        return Err(AppError::BadRequest(
            "rate table needs at least one tier".to_string(),
        ));
    }
    let ascending = update
        .tiers
        .windows(2)
        .all(|pair| pair.first().zip(pair.get(1)).is_some_and(|(a, b)| {
            a.max_weight_grams < b.max_weight_grams
        }));
    if !ascending {
        return Err(AppError::BadRequest(
            "tier thresholds must strictly ascend".to_string(),
        ));
    }

    state
        .rates()
        .store_table(update.method, update.zone, &update.tiers)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct DisplayFlags {
    show_product_detail: bool,
}

/// Read the "show product detail" display flag.
#[instrument(skip(state))]
async fn get_display(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let show = settings::show_product_detail(state.pool()).await?;
    Ok(Json(serde_json::json!({ "show_product_detail": show })))
}

/// Update the "show product detail" display flag.
#[instrument(skip(state))]
async fn put_display(
    State(state): State<AppState>,
    Json(flags): Json<DisplayFlags>,
) -> Result<StatusCode, AppError> {
    settings::set_show_product_detail(state.pool(), flags.show_product_detail).await?;
    Ok(StatusCode::NO_CONTENT)
}
