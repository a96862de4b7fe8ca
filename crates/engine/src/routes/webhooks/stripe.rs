//! Stripe webhook channel.
//!
//! Handles the recurring-billing events: a paid subscription invoice
//! creates and auto-ships an order; a canceled schedule strips the
//! customer's subscription fields.

use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use serde::Deserialize;
use tracing::{debug, error, instrument, warn};

use crate::services::InvoicePaid;
use crate::state::AppState;

use super::{ack, verify_stripe_signature};

/// Create Stripe webhook routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/stripe", post(handle_event))
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    kind: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct InvoiceObject {
    id: String,
    customer: String,
    /// Present only on subscription invoices - the recurring filter.
    #[serde(default)]
    subscription: Option<String>,
    #[serde(default)]
    payment_intent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScheduleObject {
    id: String,
    customer: String,
}

/// Handle a Stripe webhook delivery.
///
/// Always acknowledges with the fixed success body once past (or having
/// logged) signature verification - processing failures are absorbed here
/// and must never surface as error statuses.
#[instrument(skip(state, headers, body))]
async fn handle_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Json<serde_json::Value> {
    let Some(signature) = headers.get("Stripe-Signature").and_then(|v| v.to_str().ok()) else {
        warn!("stripe webhook without signature header");
        return ack();
    };

    let now = chrono::Utc::now().timestamp();
    if !verify_stripe_signature(&state.config().stripe.webhook_secret, signature, &body, now) {
        warn!("stripe webhook signature verification failed");
        return ack();
    }

    let event: StripeEvent = match serde_json::from_str(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "unparseable stripe event");
            return ack();
        }
    };

    match event.kind.as_str() {
        "invoice.paid" => handle_invoice_paid(&state, event.data.object).await,
        "subscription_schedule.canceled" => {
            handle_schedule_canceled(&state, event.data.object).await;
        }
        other => debug!(kind = %other, "ignoring stripe event"),
    }

    ack()
}

async fn handle_invoice_paid(state: &AppState, object: serde_json::Value) {
    let invoice: InvoiceObject = match serde_json::from_value(object) {
        Ok(invoice) => invoice,
        Err(e) => {
            warn!(error = %e, "unparseable invoice object");
            return;
        }
    };

    // One-off invoices are handled at checkout; only recurring ones here
    if invoice.subscription.is_none() {
        debug!(invoice_id = %invoice.id, "skipping non-subscription invoice");
        return;
    }

    let event = InvoicePaid {
        invoice_id: invoice.id,
        customer: invoice.customer,
        payment_intent: invoice.payment_intent,
    };

    if let Err(e) = state.recurring().handle_invoice_paid(&event).await {
        error!(
            invoice_id = %event.invoice_id,
            error = %e,
            "recurring invoice processing failed"
        );
    }
}

async fn handle_schedule_canceled(state: &AppState, object: serde_json::Value) {
    let schedule: ScheduleObject = match serde_json::from_value(object) {
        Ok(schedule) => schedule,
        Err(e) => {
            warn!(error = %e, "unparseable schedule object");
            return;
        }
    };

    if let Err(e) = state
        .recurring()
        .handle_schedule_canceled(&schedule.customer, &schedule.id)
        .await
    {
        error!(
            schedule_id = %schedule.id,
            error = %e,
            "schedule cancellation processing failed"
        );
    }
}
