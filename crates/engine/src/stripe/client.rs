//! Stripe REST client.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::instrument;
use uuid::Uuid;

use crate::config::StripeConfig;

use super::types::{ApiErrorEnvelope, PaymentIntent, Refund};
use super::StripeError;

/// Stripe REST API base URL.
pub(super) const API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe API client.
///
/// All requests are form-encoded per Stripe's wire format and authenticated
/// with the account's secret key as a bearer token.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

pub(super) struct StripeClientInner {
    pub(super) http: reqwest::Client,
    pub(super) secret_key: SecretString,
}

/// Parameters for creating a payment intent.
#[derive(Debug, Clone)]
pub struct CreatePaymentIntent {
    /// Amount in minor currency units (cents).
    pub amount_minor: i64,
    /// ISO 4217 currency code, lowercase.
    pub currency: String,
    /// Stripe customer reference, when known.
    pub customer: Option<String>,
    /// Local order this intent pays for; written to the intent's metadata
    /// so processor dashboards link back to the order.
    pub order_id: Uuid,
}

impl CreatePaymentIntent {
    /// Form-encoded body for `POST /payment_intents`.
    pub(super) fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("amount".to_string(), self.amount_minor.to_string()),
            ("currency".to_string(), self.currency.clone()),
            (
                "metadata[order_id]".to_string(),
                self.order_id.to_string(),
            ),
        ];
        if let Some(customer) = &self.customer {
            form.push(("customer".to_string(), customer.clone()));
        }
        form
    }
}

impl StripeClient {
    /// Create a new Stripe API client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created. This should never happen
    /// under normal circumstances as we use standard TLS configuration.
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            inner: Arc::new(StripeClientInner {
                http,
                secret_key: config.secret_key.clone(),
            }),
        }
    }

    /// Create a payment intent for a checkout.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Api` if Stripe rejects the parameters.
    #[instrument(skip(self, params), fields(order_id = %params.order_id))]
    pub async fn create_payment_intent(
        &self,
        params: &CreatePaymentIntent,
    ) -> Result<PaymentIntent, StripeError> {
        self.post_form("/payment_intents", &params.to_form()).await
    }

    /// Retrieve a payment intent by id.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Api` if the intent does not exist.
    #[instrument(skip(self))]
    pub async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, StripeError> {
        self.get_json(&format!("/payment_intents/{id}")).await
    }

    /// Confirm a payment intent.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Api` if the intent cannot be confirmed.
    #[instrument(skip(self))]
    pub async fn confirm_payment_intent(&self, id: &str) -> Result<PaymentIntent, StripeError> {
        self.post_form(&format!("/payment_intents/{id}/confirm"), &[])
            .await
    }

    /// Refund the full captured amount of a payment intent.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Api` if the refund is rejected (e.g. already
    /// fully refunded).
    #[instrument(skip(self))]
    pub async fn create_refund(&self, payment_intent_id: &str) -> Result<Refund, StripeError> {
        self.post_form(
            "/refunds",
            &[(
                "payment_intent".to_string(),
                payment_intent_id.to_string(),
            )],
        )
        .await
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    pub(super) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, StripeError> {
        let response = self
            .inner
            .http
            .get(format!("{API_BASE}{path}"))
            .bearer_auth(self.inner.secret_key.expose_secret())
            .send()
            .await?;

        Self::decode(response).await
    }

    pub(super) async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, StripeError> {
        let response = self
            .inner
            .http
            .post(format!("{API_BASE}{path}"))
            .bearer_auth(self.inner.secret_key.expose_secret())
            .form(form)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StripeError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(StripeError::RateLimited(retry_after));
        }

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = match response.json::<ApiErrorEnvelope>().await {
            Ok(envelope) => envelope
                .error
                .message
                .or(envelope.error.kind)
                .unwrap_or_else(|| "unknown error".to_string()),
            Err(_) => "unknown error".to_string(),
        };

        Err(StripeError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_intent_form_encoding() {
        let order_id = Uuid::new_v4();
        let params = CreatePaymentIntent {
            amount_minor: 4250,
            currency: "eur".to_string(),
            customer: Some("cus_123".to_string()),
            order_id,
        };

        let form = params.to_form();
        assert!(form.contains(&("amount".to_string(), "4250".to_string())));
        assert!(form.contains(&("currency".to_string(), "eur".to_string())));
        assert!(form.contains(&("customer".to_string(), "cus_123".to_string())));
        assert!(form.contains(&("metadata[order_id]".to_string(), order_id.to_string())));
    }

    #[test]
    fn test_payment_intent_form_omits_absent_customer() {
        let params = CreatePaymentIntent {
            amount_minor: 1000,
            currency: "eur".to_string(),
            customer: None,
            order_id: Uuid::new_v4(),
        };

        let form = params.to_form();
        assert!(!form.iter().any(|(k, _)| k == "customer"));
    }
}
