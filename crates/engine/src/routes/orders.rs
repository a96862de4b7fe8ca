//! Operator order actions.
//!
//! These endpoints are the manual triggers behind the admin panel's "ship"
//! and "refund" buttons; both invoke exactly the same state-machine
//! operations the webhooks do, so a manual ship racing an automatic one is
//! resolved by the claim protocol.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use tracing::instrument;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Create order action routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders/{id}/ship", post(ship_order))
        .route("/api/orders/{id}/refund", post(refund_order))
}

/// Manually trigger shipment creation for an order.
///
/// `shipment_id` is `null` while another worker's claim is still forming.
#[instrument(skip(state))]
async fn ship_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let shipment_id = state.fulfillment().create_shipment(id).await?;
    Ok(Json(serde_json::json!({ "shipment_id": shipment_id })))
}

/// Refund an order's payment and best-effort cancel its shipment.
#[instrument(skip(state))]
async fn refund_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.fulfillment().refund(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
