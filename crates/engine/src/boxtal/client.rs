//! Boxtal REST client with in-memory token caching.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::config::BoxtalConfig;

use super::auth::{BoxtalToken, exchange_credentials};
use super::BoxtalError;

/// Boxtal REST API base URL.
pub(super) const API_BASE: &str = "https://api.boxtal.com/v3";

/// Boxtal API client.
///
/// The bearer token is cached in memory and refreshed transparently when
/// it approaches expiry. The client is cheap to clone; all clones share
/// the token cache.
#[derive(Clone)]
pub struct BoxtalClient {
    inner: Arc<BoxtalClientInner>,
}

struct BoxtalClientInner {
    http: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    /// In-memory token cache
    token: RwLock<Option<BoxtalToken>>,
}

impl BoxtalClient {
    /// Create a new Boxtal API client without a token; the first request
    /// performs the credential exchange lazily.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created. This should never happen
    /// under normal circumstances as we use standard TLS configuration.
    #[must_use]
    pub fn new(config: &BoxtalConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            inner: Arc::new(BoxtalClientInner {
                http,
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                token: RwLock::new(None),
            }),
        }
    }

    /// Set the token directly (for tests and warm starts).
    pub async fn set_token(&self, token: BoxtalToken) {
        *self.inner.token.write().await = Some(token);
    }

    /// Get the current token, if one is cached.
    pub async fn token(&self) -> Option<BoxtalToken> {
        self.inner.token.read().await.clone()
    }

    /// Return a valid bearer token, exchanging credentials if the cached
    /// one is absent or expired.
    ///
    /// # Errors
    ///
    /// Returns `BoxtalError::AuthenticationFailed` if the exchange fails.
    pub async fn ensure_token(&self) -> Result<SecretString, BoxtalError> {
        if let Some(token) = self.inner.token.read().await.as_ref()
            && !token.is_expired()
        {
            return Ok(token.access_token.clone());
        }

        let mut guard = self.inner.token.write().await;
        // Another caller may have refreshed while we waited for the lock
        if let Some(token) = guard.as_ref()
            && !token.is_expired()
        {
            return Ok(token.access_token.clone());
        }

        debug!("refreshing carrier bearer token");
        let token = exchange_credentials(
            &self.inner.http,
            &self.inner.client_id,
            &self.inner.client_secret,
        )
        .await?;
        let access = token.access_token.clone();
        *guard = Some(token);
        Ok(access)
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    #[instrument(skip(self, query))]
    pub(super) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, BoxtalError> {
        let token = self.ensure_token().await?;
        let response = self
            .inner
            .http
            .get(format!("{API_BASE}{path}"))
            .bearer_auth(token.expose_secret())
            .query(query)
            .send()
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self, body))]
    pub(super) async fn post_json<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BoxtalError> {
        let token = self.ensure_token().await?;
        let response = self
            .inner
            .http
            .post(format!("{API_BASE}{path}"))
            .bearer_auth(token.expose_secret())
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self))]
    pub(super) async fn delete(&self, path: &str) -> Result<(), BoxtalError> {
        let token = self.ensure_token().await?;
        let response = self
            .inner
            .http
            .delete(format!("{API_BASE}{path}"))
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(BoxtalError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BoxtalError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(BoxtalError::RateLimited(retry_after));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(BoxtalError::AuthenticationFailed(
                "bearer token rejected".to_string(),
            ));
        }

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = response.text().await.unwrap_or_default();
        Err(BoxtalError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> BoxtalConfig {
        BoxtalConfig {
            client_id: "terroir-test".to_string(),
            client_secret: SecretString::from("secret"),
            webhook_secret: SecretString::from("whsec"),
        }
    }

    #[tokio::test]
    async fn test_client_starts_without_token() {
        let client = BoxtalClient::new(&test_config());
        assert!(client.token().await.is_none());
    }

    #[tokio::test]
    async fn test_injected_token_is_reused_until_expiry() {
        let client = BoxtalClient::new(&test_config());
        let now = chrono::Utc::now().timestamp();

        client
            .set_token(BoxtalToken {
                access_token: SecretString::from("cached-token"),
                expires_at: now + 3600,
            })
            .await;

        let token = client.ensure_token().await.expect("cached token");
        assert_eq!(token.expose_secret(), "cached-token");
    }
}
