//! Wire types for the Boxtal API.

use serde::{Deserialize, Serialize};

/// A relay pickup point returned by the search endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayPoint {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub line1: Option<String>,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub opening_hours: Vec<OpeningSlot>,
}

/// Opening hours for one day of the week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpeningSlot {
    pub day: String,
    pub hours: String,
}

/// Request payload for shipment creation.
#[derive(Debug, Clone, Serialize)]
pub struct CreateShipmentRequest {
    pub sender: Party,
    pub recipient: Party,
    pub parcel: Parcel,
    /// Relay point code, for relay deliveries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_code: Option<String>,
    /// Externally-visible order reference; echoed back in tracking
    /// webhooks so orders can be resolved without the shipment id.
    pub external_reference: String,
}

/// One party (sender or recipient) on a shipment.
#[derive(Debug, Clone, Serialize)]
pub struct Party {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub phone: String,
    pub line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub postal_code: String,
    pub city: String,
    pub country: String,
}

/// Physical parcel description.
#[derive(Debug, Clone, Serialize)]
pub struct Parcel {
    pub weight_grams: i32,
}

/// A created shipment as the carrier reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct Shipment {
    pub id: String,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub label_url: Option<String>,
}

/// Relay search response envelope.
#[derive(Debug, Deserialize)]
pub(super) struct RelaySearchResponse {
    pub points: Vec<RelayPoint>,
}
