//! Stripe payment processor adapter.
//!
//! Wraps the parts of the Stripe REST API the engine consumes: payment
//! intents, refunds, and subscription schedules. The client is hand-rolled
//! over `reqwest` with form-encoded bodies, matching Stripe's wire format.

mod client;
mod schedules;
mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use client::{CreatePaymentIntent, StripeClient};
pub use types::{PaymentIntent, Refund, SubscriptionSchedule};

/// Errors returned by the Stripe adapter.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Too many requests; retry after the given number of seconds.
    #[error("rate limited, retry after {0}s")]
    RateLimited(u64),

    /// Failed to interpret a response payload.
    #[error("parse error: {0}")]
    Parse(String),
}

/// The payment operations the rest of the engine depends on.
///
/// Implemented by [`StripeClient`]; tests substitute fakes.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Refund the full captured amount of a payment intent.
    async fn create_refund(&self, payment_intent_id: &str) -> Result<Refund, StripeError>;

    /// Fetch a subscription schedule with its phases.
    async fn retrieve_schedule(
        &self,
        schedule_id: &str,
    ) -> Result<SubscriptionSchedule, StripeError>;

    /// Replace a schedule's complete phase list in one update.
    async fn update_schedule_phases(
        &self,
        schedule_id: &str,
        phases: &[terroir_core::SchedulePhase],
    ) -> Result<SubscriptionSchedule, StripeError>;
}
