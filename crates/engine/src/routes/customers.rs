//! Customer schedule actions.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Create customer schedule routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/customers/{id}/schedule/skip", post(skip_date))
        .route("/api/customers/{id}/schedule/unskip", post(unskip_date))
}

#[derive(Debug, Deserialize)]
struct SkipBody {
    date: NaiveDate,
}

/// Exclude one billing date from billing effect. The phase slot stays.
#[instrument(skip(state))]
async fn skip_date(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SkipBody>,
) -> Result<StatusCode, AppError> {
    state
        .schedule_sync()
        .set_date_skipped(id, body.date, true)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Restore a previously skipped billing date.
#[instrument(skip(state))]
async fn unskip_date(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SkipBody>,
) -> Result<StatusCode, AppError> {
    state
        .schedule_sync()
        .set_date_skipped(id, body.date, false)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
