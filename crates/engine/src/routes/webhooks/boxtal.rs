//! Boxtal webhook channel.
//!
//! Tracking events drive the shipped/delivered transitions; document
//! events persist label URLs.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use serde::Deserialize;
use tracing::{debug, error, instrument, warn};

use crate::services::{DocumentCreated, ShipmentDocument, TrackingUpdate};
use crate::state::AppState;

use super::{ack, verify_hex_hmac};

/// Create Boxtal webhook routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/boxtal", post(handle_event))
}

#[derive(Debug, Deserialize)]
struct BoxtalEvent {
    event: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TrackingWire {
    shipment_id: String,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    tracking_number: Option<String>,
    #[serde(default)]
    tracking_url: Option<String>,
    status: String,
    #[serde(default)]
    delivered: bool,
}

#[derive(Debug, Deserialize)]
struct DocumentWire {
    shipment_id: String,
    documents: Vec<DocumentEntry>,
}

#[derive(Debug, Deserialize)]
struct DocumentEntry {
    #[serde(rename = "type")]
    kind: String,
    url: String,
}

/// Handle a Boxtal webhook delivery.
///
/// Same contract as the payment channel: timing-safe HMAC verification
/// over the raw body, fixed acknowledgment regardless of processing
/// outcome, idempotent processing under redelivery.
#[instrument(skip(state, headers, body))]
async fn handle_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<serde_json::Value> {
    let Some(signature) = headers
        .get("X-Boxtal-Signature")
        .and_then(|v| v.to_str().ok())
    else {
        warn!("boxtal webhook without signature header");
        return ack();
    };

    if !verify_hex_hmac(&state.config().boxtal.webhook_secret, &body, signature) {
        warn!("boxtal webhook signature verification failed");
        return ack();
    }

    let event: BoxtalEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "unparseable boxtal event");
            return ack();
        }
    };

    match event.event.as_str() {
        "tracking.updated" => handle_tracking(&state, event.data).await,
        "document.created" => handle_document(&state, event.data).await,
        other => debug!(kind = %other, "ignoring boxtal event"),
    }

    ack()
}

async fn handle_tracking(state: &AppState, data: serde_json::Value) {
    let wire: TrackingWire = match serde_json::from_value(data) {
        Ok(wire) => wire,
        Err(e) => {
            warn!(error = %e, "unparseable tracking payload");
            return;
        }
    };

    let event = TrackingUpdate {
        shipment_id: wire.shipment_id,
        order_reference: wire.reference,
        tracking_number: wire.tracking_number,
        tracking_url: wire.tracking_url,
        status_code: wire.status,
        delivered: wire.delivered,
    };

    if let Err(e) = state.fulfillment().apply_tracking(&event).await {
        error!(
            shipment_id = %event.shipment_id,
            error = %e,
            "tracking event processing failed"
        );
    }
}

async fn handle_document(state: &AppState, data: serde_json::Value) {
    let wire: DocumentWire = match serde_json::from_value(data) {
        Ok(wire) => wire,
        Err(e) => {
            warn!(error = %e, "unparseable document payload");
            return;
        }
    };

    let event = DocumentCreated {
        shipment_id: wire.shipment_id,
        documents: wire
            .documents
            .into_iter()
            .map(|doc| ShipmentDocument {
                kind: doc.kind,
                url: doc.url,
            })
            .collect(),
    };

    if let Err(e) = state.fulfillment().apply_document(&event).await {
        error!(
            shipment_id = %event.shipment_id,
            error = %e,
            "document event processing failed"
        );
    }
}
