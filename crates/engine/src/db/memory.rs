//! In-memory repository fakes for tests.
//!
//! Each fake reproduces the Postgres implementation's atomicity: every
//! operation runs under one mutex acquisition, so conditional updates
//! (shipment claim, discount redemption, guarded status advance) behave
//! exactly like their single-statement SQL counterparts under concurrency.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use terroir_core::{Customer, Discount, FulfillmentStatus, Order, OrderStatus, PaymentStatus, SubscriptionState};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::discounts::{DiscountRepository, RedemptionOutcome};
use super::orders::{OrderRepository, TrackingPatch};
use super::products::{CatalogRepository, Product};
use super::customers::CustomerRepository;
use super::RepositoryError;

#[derive(Default)]
pub struct MemoryOrderRepository {
    orders: Mutex<HashMap<Uuid, Order>>,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, order: Order) {
        self.orders.lock().await.insert(order.id, order);
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        self.orders.lock().await.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.lock().await.get(&id).cloned())
    }

    async fn find_by_shipment_id(
        &self,
        shipment_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .orders
            .lock()
            .await
            .values()
            .find(|o| o.metadata.carrier_shipment_id.as_deref() == Some(shipment_id))
            .cloned())
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .orders
            .lock()
            .await
            .values()
            .find(|o| o.metadata.external_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn find_by_invoice(&self, invoice_id: &str) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .orders
            .lock()
            .await
            .values()
            .find(|o| o.metadata.stripe_invoice_id.as_deref() == Some(invoice_id))
            .cloned())
    }

    async fn claim_fulfillment(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut orders = self.orders.lock().await;
        let order = orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if order.fulfillment_status == FulfillmentStatus::NotFulfilled {
            order.fulfillment_status = FulfillmentStatus::RequiresAction;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn release_claim(&self, id: Uuid, failure_message: &str) -> Result<(), RepositoryError> {
        let mut orders = self.orders.lock().await;
        let order = orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if order.fulfillment_status == FulfillmentStatus::RequiresAction {
            order.fulfillment_status = FulfillmentStatus::NotFulfilled;
            order.metadata.shipment_failed = true;
            order.metadata.shipment_failure_message = Some(failure_message.to_string());
        }
        Ok(())
    }

    async fn record_shipment(
        &self,
        id: Uuid,
        shipment_id: &str,
        tracking_number: Option<&str>,
        label_url: Option<&str>,
        external_reference: &str,
    ) -> Result<FulfillmentStatus, RepositoryError> {
        let mut orders = self.orders.lock().await;
        let order = orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        let prior = order.fulfillment_status;

        order.fulfillment_status = FulfillmentStatus::Shipped;
        order.metadata.carrier_shipment_id = Some(shipment_id.to_string());
        order.metadata.external_reference = Some(external_reference.to_string());
        order.metadata.shipment_failed = false;
        order.metadata.shipment_failure_message = None;
        if let Some(tracking) = tracking_number {
            order.metadata.tracking_number = Some(tracking.to_string());
        }
        if let Some(url) = label_url {
            order.metadata.label_url = Some(url.to_string());
        }

        Ok(prior)
    }

    async fn merge_tracking(&self, id: Uuid, patch: &TrackingPatch) -> Result<(), RepositoryError> {
        let mut orders = self.orders.lock().await;
        let order = orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if let Some(tracking) = &patch.tracking_number {
            order.metadata.tracking_number = Some(tracking.clone());
        }
        if let Some(url) = &patch.tracking_url {
            order.metadata.tracking_url = Some(url.clone());
        }
        if let Some(status) = &patch.carrier_status {
            order.metadata.carrier_status = Some(status.clone());
        }
        Ok(())
    }

    async fn advance_fulfillment(
        &self,
        id: Uuid,
        to: FulfillmentStatus,
    ) -> Result<bool, RepositoryError> {
        let mut orders = self.orders.lock().await;
        let order = orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if order.fulfillment_status.can_advance_to(to) {
            order.fulfillment_status = to;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> Result<(), RepositoryError> {
        let mut orders = self.orders.lock().await;
        let order = orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        order.status = status;
        Ok(())
    }

    async fn set_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), RepositoryError> {
        let mut orders = self.orders.lock().await;
        let order = orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        order.payment_status = status;
        Ok(())
    }

    async fn set_label_url(&self, id: Uuid, url: &str) -> Result<(), RepositoryError> {
        let mut orders = self.orders.lock().await;
        let order = orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        order.metadata.label_url = Some(url.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCustomerRepository {
    customers: Mutex<HashMap<Uuid, Customer>>,
}

impl MemoryCustomerRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerRepository for MemoryCustomerRepository {
    async fn insert(&self, customer: &Customer) -> Result<(), RepositoryError> {
        self.customers
            .lock()
            .await
            .insert(customer.id, customer.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Customer>, RepositoryError> {
        Ok(self.customers.lock().await.get(&id).cloned())
    }

    async fn find_by_stripe_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Customer>, RepositoryError> {
        Ok(self
            .customers
            .lock()
            .await
            .values()
            .find(|c| c.stripe_customer_id.as_deref() == Some(reference))
            .cloned())
    }

    async fn list_subscribed(&self) -> Result<Vec<Customer>, RepositoryError> {
        let mut subscribed: Vec<Customer> = self
            .customers
            .lock()
            .await
            .values()
            .filter(|c| c.subscription.is_some())
            .cloned()
            .collect();
        subscribed.sort_by_key(|c| c.id);
        Ok(subscribed)
    }

    async fn set_subscription(
        &self,
        id: Uuid,
        state: Option<&SubscriptionState>,
    ) -> Result<(), RepositoryError> {
        let mut customers = self.customers.lock().await;
        let customer = customers.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        customer.subscription = state.cloned();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCatalogRepository {
    products: Mutex<HashMap<Uuid, Product>>,
}

impl MemoryCatalogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogRepository for MemoryCatalogRepository {
    async fn insert(&self, product: &Product) -> Result<(), RepositoryError> {
        self.products
            .lock()
            .await
            .insert(product.id, product.clone());
        Ok(())
    }

    async fn subscription_product(&self) -> Result<Option<Product>, RepositoryError> {
        Ok(self
            .products
            .lock()
            .await
            .values()
            .find(|p| p.is_subscription)
            .cloned())
    }

    async fn decrement_stock(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut products = self.products.lock().await;
        let product = products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if product.stock > 0 {
            product.stock -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[derive(Default)]
pub struct MemoryDiscountRepository {
    discounts: Mutex<HashMap<String, Discount>>,
}

impl MemoryDiscountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DiscountRepository for MemoryDiscountRepository {
    async fn insert(&self, discount: &Discount) -> Result<(), RepositoryError> {
        self.discounts
            .lock()
            .await
            .insert(discount.code.clone(), discount.clone());
        Ok(())
    }

    async fn get(&self, code: &str) -> Result<Option<Discount>, RepositoryError> {
        Ok(self.discounts.lock().await.get(code).cloned())
    }

    async fn redeem(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<RedemptionOutcome, RepositoryError> {
        let mut discounts = self.discounts.lock().await;
        let Some(discount) = discounts.get_mut(code) else {
            return Ok(RedemptionOutcome::NotFound);
        };
        if discount.is_expired(now) {
            return Ok(RedemptionOutcome::Expired);
        }
        if discount
            .max_usage
            .is_some_and(|max| discount.usage_count >= max)
        {
            return Ok(RedemptionOutcome::Exhausted);
        }
        discount.usage_count += 1;
        Ok(RedemptionOutcome::Redeemed(discount.clone()))
    }
}
