//! Inbound webhook channels.
//!
//! Both providers follow the same contract: verify an HMAC-SHA256
//! signature over the raw request body with a constant-time comparison;
//! log and acknowledge on verification failure (an error status would only
//! trigger provider retry storms); once verified, always acknowledge with
//! the fixed success body no matter what processing does. Internal errors
//! are absorbed and logged at this boundary - they never propagate outward
//! as failure responses.

pub mod boxtal;
pub mod stripe;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

/// Reject Stripe signatures older than this (replay window).
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// The fixed acknowledgment body both channels return.
pub(crate) fn ack() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "received": true }))
}

fn hmac_hex(secret: &SecretString, payload: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes()).ok()?;
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a plain hex-encoded HMAC-SHA256 signature over the raw body.
pub(crate) fn verify_hex_hmac(secret: &SecretString, body: &[u8], signature: &str) -> bool {
    hmac_hex(secret, body)
        .is_some_and(|expected| constant_time_compare(&expected, signature.trim()))
}

/// Verify a Stripe-style signature header:
/// `t=<unix>,v1=<hex hmac of "{t}.{body}">[,v1=...]`.
///
/// The timestamp must fall within the replay window relative to `now`.
pub(crate) fn verify_stripe_signature(
    secret: &SecretString,
    header: &str,
    body: &str,
    now: i64,
) -> bool {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => candidates.push(value.to_string()),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return false;
    }

    let payload = format!("{timestamp}.{body}");
    let Some(expected) = hmac_hex(secret, payload.as_bytes()) else {
        return false;
    };

    candidates
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
