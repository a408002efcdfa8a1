//! GitHub App authentication.
//!
//! The forge transport authenticates as an installed GitHub App: a
//! short-lived RS256 JWT signed with the App's private key is exchanged at
//! the installations endpoint for an installation access token, which is
//! cached until shortly before it expires. Clients hold the provider behind
//! [`InstallationTokenProvider`] so tests can substitute a static token.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

/// Lifetime of the signed App JWT.
const APP_JWT_TTL_SECS: i64 = 540;
/// Clock-skew allowance applied to the JWT's issued-at claim.
const APP_JWT_SKEW_SECS: i64 = 60;
/// Installation tokens are re-minted once they are this close to expiry.
const TOKEN_RENEWAL_MARGIN_SECS: i64 = 60;

/// Errors raised while minting installation tokens.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The App private key could not be used for signing.
    #[error("invalid App private key: {0}")]
    InvalidKey(String),

    /// Signing the App JWT failed.
    #[error("failed to sign App JWT: {0}")]
    Signing(String),

    /// The token exchange request failed in transit.
    #[error("token exchange transport error: {0}")]
    Transport(String),

    /// The forge rejected the token exchange.
    #[error("token exchange failed (status: {status}): {message}")]
    Exchange {
        /// HTTP status of the rejection.
        status: u16,
        /// Response body text.
        message: String,
    },
}

impl From<reqwest::Error> for AuthError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

/// Mints installation access tokens for the forge transport.
#[async_trait]
pub trait InstallationTokenProvider: Send + Sync {
    /// Returns a currently valid installation token.
    ///
    /// # Errors
    ///
    /// Returns an error when a fresh token cannot be minted.
    async fn installation_token(&self) -> Result<SecretString, AuthError>;
}

#[derive(Debug, Serialize)]
struct AppJwtClaims<'a> {
    iat: i64,
    exp: i64,
    iss: &'a str,
}

#[derive(Debug, Deserialize)]
struct InstallationTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

struct CachedToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

/// Token provider backed by a GitHub App's private key.
pub struct AppTokenProvider {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    installation_id: String,
    encoding_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl AppTokenProvider {
    /// Creates a provider from the App identity triple.
    ///
    /// `base_url` must end with `/`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] when the PEM-encoded private key
    /// cannot be loaded.
    pub fn new(
        base_url: impl Into<String>,
        app_id: impl Into<String>,
        installation_id: impl Into<String>,
        private_key_pem: &[u8],
    ) -> Result<Self, AuthError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|err| AuthError::InvalidKey(err.to_string()))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            app_id: app_id.into(),
            installation_id: installation_id.into(),
            encoding_key,
            cached: Mutex::new(None),
        })
    }

    fn sign_app_jwt(&self) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = AppJwtClaims {
            iat: now - APP_JWT_SKEW_SECS,
            exp: now + APP_JWT_TTL_SECS,
            iss: &self.app_id,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|err| AuthError::Signing(err.to_string()))
    }

    async fn exchange(&self) -> Result<CachedToken, AuthError> {
        let jwt = self.sign_app_jwt()?;
        let url = format!(
            "{}app/installations/{}/access_tokens",
            self.base_url, self.installation_id
        );
        let response = self
            .http
            .post(url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "team-approver")
            .bearer_auth(jwt)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_owned());
            return Err(AuthError::Exchange {
                status: status.as_u16(),
                message,
            });
        }

        let payload: InstallationTokenResponse = response
            .json()
            .await
            .map_err(|err| AuthError::Transport(err.to_string()))?;
        Ok(CachedToken {
            token: SecretString::from(payload.token),
            expires_at: payload.expires_at,
        })
    }
}

#[async_trait]
impl InstallationTokenProvider for AppTokenProvider {
    async fn installation_token(&self) -> Result<SecretString, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if entry.expires_at - Utc::now() > Duration::seconds(TOKEN_RENEWAL_MARGIN_SECS) {
                return Ok(entry.token.clone());
            }
        }

        let fresh = self.exchange().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

/// Provider that always returns the same token. Used in tests and for
/// pre-minted credentials.
pub struct StaticTokenProvider {
    token: SecretString,
}

impl StaticTokenProvider {
    /// Wraps an existing token.
    #[must_use]
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl InstallationTokenProvider for StaticTokenProvider {
    async fn installation_token(&self) -> Result<SecretString, AuthError> {
        Ok(self.token.clone())
    }
}
