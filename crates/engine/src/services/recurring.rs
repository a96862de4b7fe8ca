//! Recurring-billing order creation.
//!
//! Driven by the payment processor's "recurring invoice paid" webhook: a
//! paid invoice becomes an order snapshot of the subscription product and
//! the customer's saved shipping preference, then auto-ships. The local
//! order commit deliberately happens before the remote shipping call - a
//! crash in between leaves a paid, flagged, retryable order rather than a
//! shipped-but-unpaid one.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::db::{CatalogRepository, CustomerRepository, OrderRepository};
use crate::error::AppError;
use terroir_core::{
    Customer, Destination, FulfillmentStatus, LineItem, Order, OrderMetadata, OrderStatus,
    PaymentStatus, ShippingMethod, ShippingPreference,
};

use super::fulfillment::FulfillmentService;
use super::notify::{Notification, Notifier};

/// A paid recurring invoice, normalized by the webhook layer.
#[derive(Debug, Clone)]
pub struct InvoicePaid {
    /// Invoice id - the idempotency key under webhook redelivery.
    pub invoice_id: String,
    /// Payment-processor customer reference.
    pub customer: String,
    /// Payment intent that captured the invoice, when present.
    pub payment_intent: Option<String>,
}

/// Orchestrates order creation for recurring invoices.
#[derive(Clone)]
pub struct RecurringBillingService {
    customers: Arc<dyn CustomerRepository>,
    catalog: Arc<dyn CatalogRepository>,
    orders: Arc<dyn OrderRepository>,
    fulfillment: FulfillmentService,
    notifier: Notifier,
}

impl RecurringBillingService {
    #[must_use]
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        catalog: Arc<dyn CatalogRepository>,
        orders: Arc<dyn OrderRepository>,
        fulfillment: FulfillmentService,
        notifier: Notifier,
    ) -> Self {
        Self {
            customers,
            catalog,
            orders,
            fulfillment,
            notifier,
        }
    }

    /// Create and auto-ship the order for a paid recurring invoice.
    ///
    /// Idempotent: a redelivered invoice that already has an order is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown customer reference,
    /// `AppError::BadRequest` for an unusable shipping preference, and
    /// propagates shipment-creation failures (the order itself stays
    /// committed and flagged for retry).
    #[instrument(skip(self, event), fields(invoice_id = %event.invoice_id))]
    pub async fn handle_invoice_paid(&self, event: &InvoicePaid) -> Result<(), AppError> {
        if self.orders.find_by_invoice(&event.invoice_id).await?.is_some() {
            debug!("invoice already processed, skipping");
            return Ok(());
        }

        let customer = self
            .customers
            .find_by_stripe_reference(&event.customer)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("customer for reference {}", event.customer))
            })?;

        let shipping = customer.shipping.clone().ok_or_else(|| {
            AppError::BadRequest(format!(
                "customer {} has no shipping preference",
                customer.id
            ))
        })?;

        let product = self
            .catalog
            .subscription_product()
            .await?
            .ok_or_else(|| AppError::Internal("no subscription product configured".to_string()))?;

        let order = Self::build_order(&customer, &shipping, &product, event)?;
        let order_id = order.id;
        self.orders.insert(&order).await?;
        info!(order_id = %order_id, "recurring order created");

        // Oversold stock is logged, never fatal: the invoice is paid
        if !self.catalog.decrement_stock(product.id).await? {
            warn!(product_id = %product.id, "subscription product out of stock");
        }

        self.notifier.enqueue(Notification::OrderConfirmation {
            email: customer.email.clone(),
            order_id,
        });

        // Local commit done; the remote shipping call may fail and flag
        // the order without ever rolling the payment back.
        self.fulfillment.create_shipment(order_id).await?;
        Ok(())
    }

    /// Strip subscription fields from the customer a canceled schedule
    /// belonged to.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` on repository failures. An unknown
    /// customer reference is logged and absorbed - there is nothing to
    /// clean up.
    #[instrument(skip(self))]
    pub async fn handle_schedule_canceled(
        &self,
        customer_reference: &str,
        schedule_id: &str,
    ) -> Result<(), AppError> {
        let Some(customer) = self
            .customers
            .find_by_stripe_reference(customer_reference)
            .await?
        else {
            warn!("canceled schedule matches no customer");
            return Ok(());
        };

        if let Some(subscription) = &customer.subscription
            && subscription.schedule_id != schedule_id
        {
            warn!(
                held = %subscription.schedule_id,
                canceled = %schedule_id,
                "canceled schedule differs from the customer's current one"
            );
        }

        self.customers.set_subscription(customer.id, None).await?;
        info!(customer_id = %customer.id, "subscription stripped after schedule cancellation");
        Ok(())
    }

    fn build_order(
        customer: &Customer,
        shipping: &ShippingPreference,
        product: &crate::db::Product,
        event: &InvoicePaid,
    ) -> Result<Order, AppError> {
        let destination = match shipping.method {
            ShippingMethod::RelayPoint => shipping
                .relay
                .clone()
                .map(|relay| Destination::Relay { relay })
                .ok_or_else(|| {
                    AppError::BadRequest("relay preference without a relay point".to_string())
                })?,
            ShippingMethod::HomeDelivery => shipping
                .address
                .clone()
                .map(|address| Destination::Home { address })
                .ok_or_else(|| {
                    AppError::BadRequest("home delivery preference without an address".to_string())
                })?,
        };

        let relay_code = match &destination {
            Destination::Relay { relay } => Some(relay.code.clone()),
            Destination::Home { .. } => None,
        };

        Ok(Order {
            id: Uuid::new_v4(),
            email: customer.email.clone(),
            customer_id: Some(customer.id),
            total: product.price,
            currency: product.currency.clone(),
            destination,
            line_items: vec![LineItem {
                product_id: product.id,
                title: product.title.clone(),
                quantity: 1,
                unit_price: product.price,
                weight_grams: product.weight_grams,
            }],
            status: OrderStatus::Pending,
            fulfillment_status: FulfillmentStatus::NotFulfilled,
            payment_status: PaymentStatus::Captured,
            metadata: OrderMetadata {
                stripe_invoice_id: Some(event.invoice_id.clone()),
                payment_intent_id: event.payment_intent.clone(),
                relay_code,
                ..OrderMetadata::default()
            },
        })
    }
}
