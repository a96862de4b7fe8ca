//! Order, line item, and shipping destination types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::status::{FulfillmentStatus, OrderStatus, PaymentStatus};

/// A confirmed or pending purchase record, whether created at checkout or
/// generated by a recurring-billing tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub email: String,
    /// Weak reference - the customer row may be deleted independently.
    pub customer_id: Option<Uuid>,
    pub total: Decimal,
    /// ISO 4217 currency code, lowercase (Stripe convention).
    pub currency: String,
    pub destination: Destination,
    pub line_items: Vec<LineItem>,
    pub status: OrderStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub payment_status: PaymentStatus,
    pub metadata: OrderMetadata,
}

impl Order {
    /// Total parcel weight across all line items, in grams.
    #[must_use]
    pub fn total_weight_grams(&self) -> i32 {
        self.line_items
            .iter()
            .map(|item| item.weight_grams.saturating_mul(item.quantity))
            .sum()
    }

    /// Country the parcel ships to, regardless of destination kind.
    #[must_use]
    pub fn shipping_country(&self) -> &str {
        match &self.destination {
            Destination::Home { address } => &address.country,
            Destination::Relay { relay } => &relay.country,
        }
    }
}

/// One purchased product line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: Uuid,
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    /// Unit weight in grams.
    pub weight_grams: i32,
}

/// Where a parcel goes: a home address or a third-party relay point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    Home { address: Address },
    Relay { relay: RelayDescriptor },
}

/// Postal address for home delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub postal_code: String,
    pub city: String,
    /// ISO 3166-1 alpha-2, uppercase.
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A pickup-point destination as selected at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayDescriptor {
    /// Carrier-assigned relay point code.
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub postal_code: String,
    pub city: String,
    pub country: String,
}

/// Typed view over the order's JSONB metadata column.
///
/// Known fields are named and validated on read; anything else lands in
/// `extra` and is written back verbatim, so fields added by newer releases
/// (or by operators poking at rows) survive a read-modify-write cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderMetadata {
    /// Stripe payment intent backing this order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    /// Recurring invoice that generated this order; doubles as the
    /// idempotency key under webhook redelivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_invoice_id: Option<String>,
    /// Carrier-assigned shipment id, present once a shipment was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier_shipment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_url: Option<String>,
    /// Raw carrier status code from the last tracking event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier_status: Option<String>,
    /// URL of the shipping label document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_url: Option<String>,
    /// Set when the last shipment-creation attempt failed; the order is
    /// eligible for a manual retry while this is set.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub shipment_failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipment_failure_message: Option<String>,
    /// Relay code captured at checkout, used as a fallback when the
    /// destination payload lost it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_code: Option<String>,
    /// Externally-visible order reference embedded into carrier payloads;
    /// tracking webhooks fall back to it when the shipment id is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_code: Option<String>,
    /// Forward-compatibility escape hatch: unknown keys, preserved as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
