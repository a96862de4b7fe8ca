//! Customer and subscription-state types.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::{Address, RelayDescriptor};

/// A registered customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Stripe customer reference, set once the customer first paid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_customer_id: Option<String>,
    /// Present while the customer holds an active subscription schedule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionState>,
    /// Shipping preference snapshot used for recurring orders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping: Option<ShippingPreference>,
}

/// Subscription bookkeeping held per actively-subscribed customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionState {
    /// Stripe subscription schedule reference.
    pub schedule_id: String,
    /// Billing dates the customer skipped. A skip excludes the date from
    /// billing effect but never compresses or removes the phase slot.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub skipped_dates: BTreeSet<NaiveDate>,
}

/// How recurring orders for this customer ship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPreference {
    pub method: ShippingMethod,
    /// ISO 3166-1 alpha-2 destination country.
    pub country: String,
    /// Selected relay point, when `method` is relay delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay: Option<RelayDescriptor>,
    /// Saved home address, when `method` is home delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

/// Delivery method offered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
    RelayPoint,
    HomeDelivery,
}

impl ShippingMethod {
    /// Text form used in settings keys and cache keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RelayPoint => "relay_point",
            Self::HomeDelivery => "home_delivery",
        }
    }
}
