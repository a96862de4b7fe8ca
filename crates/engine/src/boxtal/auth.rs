//! Boxtal authentication.
//!
//! Client-credential exchange for short-lived bearer tokens.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use super::BoxtalError;

/// Boxtal token endpoint.
const TOKEN_ENDPOINT: &str = "https://api.boxtal.com/oauth2/token";

/// Safety margin subtracted from the reported expiry: a token this close
/// to expiring is treated as already expired so in-flight requests never
/// carry one that dies mid-call.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Bearer token obtained from the client-credential exchange.
#[derive(Debug, Clone)]
pub struct BoxtalToken {
    /// Bearer token for API requests.
    pub access_token: SecretString,
    /// Unix timestamp when the token expires.
    pub expires_at: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Token lifetime in seconds.
    expires_in: i64,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchange client credentials for a bearer token.
///
/// # Errors
///
/// Returns `BoxtalError::AuthenticationFailed` if the credentials are
/// rejected.
#[instrument(skip(client, client_secret), fields(client_id = %client_id))]
pub async fn exchange_credentials(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &SecretString,
) -> Result<BoxtalToken, BoxtalError> {
    let now = chrono::Utc::now().timestamp();

    let response = client
        .post(TOKEN_ENDPOINT)
        .basic_auth(client_id, Some(client_secret.expose_secret()))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await?;

    let status = response.status();

    if status.is_success() {
        let token: TokenResponse = response.json().await?;
        Ok(BoxtalToken {
            access_token: SecretString::from(token.access_token),
            expires_at: now + token.expires_in,
        })
    } else {
        let error: TokenErrorResponse =
            response.json().await.unwrap_or_else(|_| TokenErrorResponse {
                error: None,
                error_description: None,
            });
        let message = error
            .error_description
            .or(error.error)
            .unwrap_or_else(|| format!("HTTP {status}"));
        Err(BoxtalError::AuthenticationFailed(message))
    }
}

impl BoxtalToken {
    /// Check if the token has expired (with the safety margin applied).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        now >= self.expires_at - EXPIRY_MARGIN_SECS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_expired() {
        let now = chrono::Utc::now().timestamp();

        let expired = BoxtalToken {
            access_token: SecretString::from("test"),
            expires_at: now - 3600,
        };
        assert!(expired.is_expired());

        let valid = BoxtalToken {
            access_token: SecretString::from("test"),
            expires_at: now + 3600,
        };
        assert!(!valid.is_expired());

        // Within the safety margin counts as expired
        let almost = BoxtalToken {
            access_token: SecretString::from("test"),
            expires_at: now + 30,
        };
        assert!(almost.is_expired());
    }
}
