//! Order fulfillment state machine.
//!
//! Owns shipment creation (with the atomic claim protocol), refunds, and
//! the application of carrier tracking/document events. Workers handling
//! webhooks and operator actions are stateless; the database's conditional
//! updates are the only mutual exclusion. The deliberate asymmetry: a
//! failed shipment claim rolls back fulfillment state only - a captured
//! payment is never rolled back, so a crash leaves an order "paid but not
//! yet shipped, flagged" rather than risking a lost payment.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::boxtal::{CarrierGateway, build_shipment_request, order_reference};
use crate::db::{OrderRepository, TrackingPatch};
use crate::error::AppError;
use crate::stripe::PaymentGateway;
use terroir_core::{FulfillmentStatus, OrderStatus, PaymentStatus};

use super::notify::{Notification, Notifier};

/// Carrier statuses that mean the parcel is moving but not yet delivered.
const IN_TRANSIT_STATUSES: &[&str] = &[
    "picked_up",
    "in_transit",
    "arrived_at_hub",
    "out_for_delivery",
];

/// A carrier tracking event, normalized by the webhook layer.
#[derive(Debug, Clone)]
pub struct TrackingUpdate {
    pub shipment_id: String,
    /// Externally-visible order reference, the fallback when the shipment
    /// id does not resolve.
    pub order_reference: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub status_code: String,
    /// Terminal delivery signal.
    pub delivered: bool,
}

/// A carrier document event, normalized by the webhook layer.
#[derive(Debug, Clone)]
pub struct DocumentCreated {
    pub shipment_id: String,
    pub documents: Vec<ShipmentDocument>,
}

#[derive(Debug, Clone)]
pub struct ShipmentDocument {
    pub kind: String,
    pub url: String,
}

/// Fulfillment orchestration over the order repository and the two
/// provider gateways.
#[derive(Clone)]
pub struct FulfillmentService {
    orders: Arc<dyn OrderRepository>,
    carrier: Arc<dyn CarrierGateway>,
    payments: Arc<dyn PaymentGateway>,
    notifier: Notifier,
}

impl FulfillmentService {
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        carrier: Arc<dyn CarrierGateway>,
        payments: Arc<dyn PaymentGateway>,
        notifier: Notifier,
    ) -> Self {
        Self {
            orders,
            carrier,
            payments,
            notifier,
        }
    }

    /// Create the carrier shipment for an order. Idempotent and race-safe:
    /// at most one caller performs the external call; every caller
    /// observes the shipment id once it is persisted.
    ///
    /// Returns `None` only when another caller holds the claim and has not
    /// yet recorded the shipment id - in progress, not a failure.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown order and
    /// `AppError::Carrier` when shipment creation fails (after rolling the
    /// claim back and flagging the order for retry).
    #[instrument(skip(self))]
    pub async fn create_shipment(&self, order_id: Uuid) -> Result<Option<String>, AppError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;

        // Already shipped: return the persisted id without touching the carrier
        if let Some(shipment_id) = order.metadata.carrier_shipment_id.clone() {
            return Ok(Some(shipment_id));
        }

        if !self.orders.claim_fulfillment(order_id).await? {
            // Another worker holds the claim; surface whatever it has
            // persisted so far rather than erroring.
            let current = self
                .orders
                .get(order_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;
            return Ok(current.metadata.carrier_shipment_id);
        }

        let request = match build_shipment_request(&order) {
            Ok(request) => request,
            Err(e) => {
                self.orders.release_claim(order_id, &e.to_string()).await?;
                return Err(e.into());
            }
        };

        match self.carrier.create_shipment(request).await {
            Ok(shipment) => {
                let prior = self
                    .orders
                    .record_shipment(
                        order_id,
                        &shipment.id,
                        shipment.tracking_number.as_deref(),
                        shipment.label_url.as_deref(),
                        &order_reference(order_id),
                    )
                    .await?;

                // Notify only on a genuine transition into shipped
                if prior.can_advance_to(FulfillmentStatus::Shipped) {
                    self.notifier.enqueue(Notification::OrderShipped {
                        email: order.email,
                        order_id,
                        tracking_url: None,
                    });
                }

                info!(shipment_id = %shipment.id, "carrier shipment created");
                Ok(Some(shipment.id))
            }
            Err(e) => {
                // Roll back so the order is retry-eligible and the failure
                // operator-visible, then re-throw.
                if let Err(release_err) =
                    self.orders.release_claim(order_id, &e.to_string()).await
                {
                    warn!(error = %release_err, "failed to release shipment claim");
                }
                Err(e.into())
            }
        }
    }

    /// Refund the order's payment and best-effort cancel its shipment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Stripe` when the refund is rejected. Carrier
    /// cancellation failure is non-fatal - the parcel may already have
    /// left the warehouse.
    #[instrument(skip(self))]
    pub async fn refund(&self, order_id: Uuid) -> Result<(), AppError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;

        let payment_intent = order
            .metadata
            .payment_intent_id
            .clone()
            .ok_or_else(|| AppError::BadRequest("order has no payment intent".to_string()))?;

        self.payments.create_refund(&payment_intent).await?;
        self.orders
            .set_payment_status(order_id, PaymentStatus::Refunded)
            .await?;

        if let Some(shipment_id) = &order.metadata.carrier_shipment_id
            && let Err(e) = self.carrier.cancel_shipment(shipment_id).await
        {
            warn!(
                shipment_id = %shipment_id,
                error = %e,
                "carrier refused shipment cancellation; parcel likely already moving"
            );
        }

        info!("order refunded");
        Ok(())
    }

    /// Apply a carrier tracking event. Idempotent under redelivery: the
    /// status-guarded transition fires once, replays merge the same
    /// metadata and change nothing else.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` on repository failures. An event that
    /// resolves to no order is logged and absorbed.
    #[instrument(skip(self, event), fields(shipment_id = %event.shipment_id, status = %event.status_code))]
    pub async fn apply_tracking(&self, event: &TrackingUpdate) -> Result<(), AppError> {
        let order = match self.resolve(&event.shipment_id, event.order_reference.as_deref()).await?
        {
            Some(order) => order,
            None => {
                warn!("tracking event matches no order");
                return Ok(());
            }
        };

        self.orders
            .merge_tracking(
                order.id,
                &TrackingPatch {
                    tracking_number: event.tracking_number.clone(),
                    tracking_url: event.tracking_url.clone(),
                    carrier_status: Some(event.status_code.clone()),
                },
            )
            .await?;

        if event.delivered {
            if self
                .orders
                .advance_fulfillment(order.id, FulfillmentStatus::Delivered)
                .await?
            {
                self.orders
                    .set_order_status(order.id, OrderStatus::Completed)
                    .await?;
                info!(order_id = %order.id, "order delivered");
            }
        } else if IN_TRANSIT_STATUSES.contains(&event.status_code.as_str())
            && self
                .orders
                .advance_fulfillment(order.id, FulfillmentStatus::Shipped)
                .await?
        {
            // First in-transit signal for this order: notify exactly once
            self.notifier.enqueue(Notification::OrderShipped {
                email: order.email.clone(),
                order_id: order.id,
                tracking_url: event.tracking_url.clone(),
            });
            info!(order_id = %order.id, "order marked shipped from tracking");
        }

        Ok(())
    }

    /// Persist the label URL from a carrier document event. Prefers the
    /// label-type document, falls back to the first one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` on repository failures.
    #[instrument(skip(self, event), fields(shipment_id = %event.shipment_id))]
    pub async fn apply_document(&self, event: &DocumentCreated) -> Result<(), AppError> {
        let order = match self.resolve(&event.shipment_id, None).await? {
            Some(order) => order,
            None => {
                warn!("document event matches no order");
                return Ok(());
            }
        };

        let document = event
            .documents
            .iter()
            .find(|doc| doc.kind == "label")
            .or_else(|| event.documents.first());

        if let Some(document) = document {
            self.orders.set_label_url(order.id, &document.url).await?;
        }

        Ok(())
    }

    /// Resolve an order by carrier shipment id, falling back to the
    /// external order reference embedded at shipment creation.
    async fn resolve(
        &self,
        shipment_id: &str,
        reference: Option<&str>,
    ) -> Result<Option<terroir_core::Order>, AppError> {
        if let Some(order) = self.orders.find_by_shipment_id(shipment_id).await? {
            return Ok(Some(order));
        }
        if let Some(reference) = reference {
            return Ok(self.orders.find_by_reference(reference).await?);
        }
        Ok(None)
    }
}
