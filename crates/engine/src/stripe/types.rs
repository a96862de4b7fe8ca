//! Wire types for the Stripe API surface the engine uses.

use serde::Deserialize;
use terroir_core::{SchedulePhase, ScheduleStatus};

/// A Stripe payment intent, reduced to the fields the engine reads.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    /// Amount in minor currency units (cents).
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub customer: Option<String>,
}

/// A Stripe refund.
#[derive(Debug, Clone, Deserialize)]
pub struct Refund {
    pub id: String,
    pub status: String,
}

/// A subscription schedule with its phases converted to domain dates.
#[derive(Debug, Clone)]
pub struct SubscriptionSchedule {
    pub id: String,
    pub status: ScheduleStatus,
    pub customer: String,
    pub phases: Vec<SchedulePhase>,
}

/// Error envelope Stripe wraps failures in.
#[derive(Debug, Deserialize)]
pub(super) struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub(super) struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// Raw schedule payload as Stripe sends it: unix timestamps, phase items.
#[derive(Debug, Deserialize)]
pub(super) struct WireSchedule {
    pub id: String,
    pub status: ScheduleStatus,
    pub customer: String,
    #[serde(default)]
    pub phases: Vec<WirePhase>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WirePhase {
    pub start_date: i64,
    pub end_date: i64,
    #[serde(default)]
    pub items: Vec<WirePhaseItem>,
    #[serde(default)]
    pub coupon: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WirePhaseItem {
    pub price: String,
}
