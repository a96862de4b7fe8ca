//! Boxtal shipping carrier adapter.
//!
//! Wraps the carrier API: bearer-token management, shipping rates,
//! relay-point search, and shipment creation/cancellation. Rate tables are
//! computed locally from operator-editable tier tables; everything else is
//! a remote call.

mod auth;
mod client;
pub mod rates;
mod relay;
mod shipments;
mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use auth::BoxtalToken;
pub use client::BoxtalClient;
pub use shipments::{build_shipment_request, order_reference};
pub use types::{CreateShipmentRequest, OpeningSlot, Parcel, Party, RelayPoint, Shipment};

/// Errors returned by the Boxtal adapter.
#[derive(Debug, Error)]
pub enum BoxtalError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Token exchange or refresh was rejected.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Too many requests; retry after the given number of seconds.
    #[error("rate limited, retry after {0}s")]
    RateLimited(u64),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// A relay shipment had no relay code in the destination or metadata.
    #[error("relay shipment without a relay code")]
    MissingRelayCode,
}

/// The carrier operations the fulfillment state machine depends on.
///
/// Implemented by [`BoxtalClient`]; tests substitute fakes to count
/// external calls.
#[async_trait]
pub trait CarrierGateway: Send + Sync {
    /// Create a shipment and return the carrier's record for it.
    async fn create_shipment(
        &self,
        request: CreateShipmentRequest,
    ) -> Result<Shipment, BoxtalError>;

    /// Cancel a shipment. Callers treat rejection as non-fatal - the
    /// parcel may already have left the warehouse.
    async fn cancel_shipment(&self, shipment_id: &str) -> Result<(), BoxtalError>;
}
