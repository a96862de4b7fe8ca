//! Order persistence and the atomic shipment-claim protocol.
//!
//! The claim is the engine's only mutual-exclusion mechanism: a
//! conditional UPDATE that moves `fulfillment_status` from `not_fulfilled`
//! to the in-progress marker. Zero rows affected means another worker
//! holds the claim - callers resolve the race by reading the winner's
//! result, never by erroring.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use terroir_core::{FulfillmentStatus, Order, OrderStatus, PaymentStatus};
use uuid::Uuid;

use super::RepositoryError;

/// Tracking fields merged into order metadata by carrier webhooks.
///
/// Serialized with absent fields skipped so a JSONB merge only touches the
/// keys the event actually carried.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier_status: Option<String>,
}

/// Order persistence operations.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError>;

    async fn get(&self, id: Uuid) -> Result<Option<Order>, RepositoryError>;

    /// Resolve an order by the carrier's shipment id.
    async fn find_by_shipment_id(
        &self,
        shipment_id: &str,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Resolve an order by the external reference embedded in carrier
    /// payloads - the fallback when a tracking event lost the shipment id.
    async fn find_by_reference(&self, reference: &str) -> Result<Option<Order>, RepositoryError>;

    /// Resolve an order by the recurring invoice that created it
    /// (idempotency key for webhook redelivery).
    async fn find_by_invoice(&self, invoice_id: &str) -> Result<Option<Order>, RepositoryError>;

    /// Atomically claim the order for shipment creation. Returns `true`
    /// when this caller won the claim; `false` means another worker holds
    /// it (or fulfillment already advanced).
    async fn claim_fulfillment(&self, id: Uuid) -> Result<bool, RepositoryError>;

    /// Roll a failed claim back to `not_fulfilled` and persist the failure
    /// flag and message so operators can see and retry it.
    async fn release_claim(&self, id: Uuid, failure_message: &str) -> Result<(), RepositoryError>;

    /// Persist the created shipment, clear any prior failure flags, and
    /// advance fulfillment to `shipped`. Returns the status the order held
    /// immediately before this write (the before/after notification guard).
    async fn record_shipment(
        &self,
        id: Uuid,
        shipment_id: &str,
        tracking_number: Option<&str>,
        label_url: Option<&str>,
        external_reference: &str,
    ) -> Result<FulfillmentStatus, RepositoryError>;

    /// Merge tracking fields into metadata without disturbing other keys.
    async fn merge_tracking(&self, id: Uuid, patch: &TrackingPatch) -> Result<(), RepositoryError>;

    /// Status-guarded fulfillment transition: writes `to` only when the
    /// current status may legally advance there. Returns whether the write
    /// happened - replayed events see `false` and stay idempotent.
    async fn advance_fulfillment(
        &self,
        id: Uuid,
        to: FulfillmentStatus,
    ) -> Result<bool, RepositoryError>;

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> Result<(), RepositoryError>;

    async fn set_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), RepositoryError>;

    /// Persist the label document URL into metadata.
    async fn set_label_url(&self, id: Uuid, url: &str) -> Result<(), RepositoryError>;
}

/// `PostgreSQL`-backed order repository.
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, email, customer_id, total, currency, destination, \
     line_items, status, fulfillment_status, payment_status, metadata FROM orders";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    email: String,
    customer_id: Option<Uuid>,
    total: Decimal,
    currency: String,
    destination: serde_json::Value,
    line_items: serde_json::Value,
    status: String,
    fulfillment_status: String,
    payment_status: String,
    metadata: serde_json::Value,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, RepositoryError> {
        let corrupt = |e: &dyn std::fmt::Display| RepositoryError::DataCorruption(e.to_string());

        Ok(Order {
            id: self.id,
            email: self.email,
            customer_id: self.customer_id,
            total: self.total,
            currency: self.currency,
            destination: serde_json::from_value(self.destination).map_err(|e| corrupt(&e))?,
            line_items: serde_json::from_value(self.line_items).map_err(|e| corrupt(&e))?,
            status: self.status.parse().map_err(|e| corrupt(&e))?,
            fulfillment_status: self.fulfillment_status.parse().map_err(|e| corrupt(&e))?,
            payment_status: self.payment_status.parse().map_err(|e| corrupt(&e))?,
            metadata: serde_json::from_value(self.metadata).map_err(|e| corrupt(&e))?,
        })
    }
}

impl PgOrderRepository {
    async fn fetch_one_where(
        &self,
        clause: &str,
        bind: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_COLUMNS} WHERE {clause}"))
            .bind(bind)
            .fetch_optional(&self.pool)
            .await?;
        row.map(OrderRow::into_order).transpose()
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        let corrupt = |e: serde_json::Error| RepositoryError::DataCorruption(e.to_string());

        sqlx::query(
            "INSERT INTO orders (id, email, customer_id, total, currency, destination, \
             line_items, status, fulfillment_status, payment_status, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(order.id)
        .bind(&order.email)
        .bind(order.customer_id)
        .bind(order.total)
        .bind(&order.currency)
        .bind(serde_json::to_value(&order.destination).map_err(corrupt)?)
        .bind(serde_json::to_value(&order.line_items).map_err(corrupt)?)
        .bind(order.status.as_str())
        .bind(order.fulfillment_status.as_str())
        .bind(order.payment_status.as_str())
        .bind(serde_json::to_value(&order.metadata).map_err(corrupt)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(OrderRow::into_order).transpose()
    }

    async fn find_by_shipment_id(
        &self,
        shipment_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        self.fetch_one_where("metadata ->> 'carrier_shipment_id' = $1", shipment_id)
            .await
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Order>, RepositoryError> {
        self.fetch_one_where("metadata ->> 'external_reference' = $1", reference)
            .await
    }

    async fn find_by_invoice(&self, invoice_id: &str) -> Result<Option<Order>, RepositoryError> {
        self.fetch_one_where("metadata ->> 'stripe_invoice_id' = $1", invoice_id)
            .await
    }

    async fn claim_fulfillment(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET fulfillment_status = $2, updated_at = NOW() \
             WHERE id = $1 AND fulfillment_status = $3",
        )
        .bind(id)
        .bind(FulfillmentStatus::RequiresAction.as_str())
        .bind(FulfillmentStatus::NotFulfilled.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn release_claim(&self, id: Uuid, failure_message: &str) -> Result<(), RepositoryError> {
        let patch = serde_json::json!({
            "shipment_failed": true,
            "shipment_failure_message": failure_message,
        });

        sqlx::query(
            "UPDATE orders SET fulfillment_status = $2, metadata = metadata || $3, \
             updated_at = NOW() WHERE id = $1 AND fulfillment_status = $4",
        )
        .bind(id)
        .bind(FulfillmentStatus::NotFulfilled.as_str())
        .bind(patch)
        .bind(FulfillmentStatus::RequiresAction.as_str())
        .execute(&self.pool)
        .await?;

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
        let mut patch = serde_json::json!({
            "carrier_shipment_id": shipment_id,
            "external_reference": external_reference,
        });
        if let Some(tracking) = tracking_number {
            patch["tracking_number"] = serde_json::Value::from(tracking);
        }
        if let Some(url) = label_url {
            patch["label_url"] = serde_json::Value::from(url);
        }

        let mut tx = self.pool.begin().await?;

        let prior: String =
            sqlx::query_scalar("SELECT fulfillment_status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        sqlx::query(
            "UPDATE orders SET fulfillment_status = $2, \
             metadata = (metadata - 'shipment_failed' - 'shipment_failure_message') || $3, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(FulfillmentStatus::Shipped.as_str())
        .bind(patch)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        prior
            .parse()
            .map_err(|e: terroir_core::UnknownStatus| RepositoryError::DataCorruption(e.to_string()))
    }

    async fn merge_tracking(&self, id: Uuid, patch: &TrackingPatch) -> Result<(), RepositoryError> {
        let value = serde_json::to_value(patch)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE orders SET metadata = metadata || $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(value)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn advance_fulfillment(
        &self,
        id: Uuid,
        to: FulfillmentStatus,
    ) -> Result<bool, RepositoryError> {
        let allowed_sources: Vec<String> = FulfillmentStatus::ALL
            .iter()
            .filter(|from| from.can_advance_to(to))
            .map(|from| from.as_str().to_string())
            .collect();

        let result = sqlx::query(
            "UPDATE orders SET fulfillment_status = $2, updated_at = NOW() \
             WHERE id = $1 AND fulfillment_status = ANY($3)",
        )
        .bind(id)
        .bind(to.as_str())
        .bind(allowed_sources)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET payment_status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_label_url(&self, id: Uuid, url: &str) -> Result<(), RepositoryError> {
        let patch = serde_json::json!({ "label_url": url });
        sqlx::query(
            "UPDATE orders SET metadata = metadata || $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(patch)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
