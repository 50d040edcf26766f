//! OAuth access tokens for the Sheets API, minted from a service-account key.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::gateway::StoreError;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<SecretString, StoreError>;
}

/// Always hands out the same token. Useful against local emulators.
pub struct StaticAccessToken(SecretString);

impl StaticAccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }
}

#[async_trait]
impl AccessTokenProvider for StaticAccessToken {
    async fn access_token(&self) -> Result<SecretString, StoreError> {
        Ok(self.0.clone())
    }
}

#[derive(Deserialize)]
struct RawServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: Option<String>,
}

#[derive(Clone)]
pub struct ServiceAccountKey {
    client_email: String,
    private_key: SecretString,
    token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        let key: RawServiceAccountKey = serde_json::from_str(raw)
            .map_err(|error| StoreError::Auth(format!("invalid service-account key: {error}")))?;

        if key.client_email.trim().is_empty() || key.private_key.trim().is_empty() {
            return Err(StoreError::Auth(
                "service-account key needs client_email and private_key".to_string(),
            ));
        }

        Ok(Self {
            client_email: key.client_email,
            private_key: SecretString::from(key.private_key),
            token_uri: key
                .token_uri
                .filter(|uri| !uri.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    /// Signs the RS256 assertion exchanged for an access token.
    pub fn signed_assertion(&self, issued_at: i64) -> Result<String, StoreError> {
        let encoding_key = EncodingKey::from_rsa_pem(self.private_key.expose_secret().as_bytes())
            .map_err(|error| StoreError::Auth(format!("unusable private key: {error}")))?;

        jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &AssertionClaims::new(self, issued_at),
            &encoding_key,
        )
        .map_err(|error| StoreError::Auth(format!("could not sign assertion: {error}")))
    }
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

impl<'a> AssertionClaims<'a> {
    fn new(key: &'a ServiceAccountKey, issued_at: i64) -> Self {
        Self {
            iss: &key.client_email,
            scope: SPREADSHEETS_SCOPE,
            aud: &key.token_uri,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

struct CachedToken {
    token: SecretString,
    refresh_at: Instant,
}

impl CachedToken {
    fn new(token: SecretString, expires_in: Duration, now: Instant) -> Self {
        Self { token, refresh_at: now + expires_in.saturating_sub(REFRESH_MARGIN) }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.refresh_at
    }
}

/// Exchanges a signed service-account assertion for an access token and caches it until
/// shortly before it expires. Concurrent callers share one exchange.
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(key: ServiceAccountKey, client: Client) -> Self {
        Self { key, client, cached: Mutex::new(None) }
    }

    async fn exchange(&self) -> Result<(SecretString, Duration), StoreError> {
        let assertion = self.key.signed_assertion(chrono::Utc::now().timestamp())?;

        let response = self
            .client
            .post(self.key.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|error| {
                let error = error.without_url();
                warn!(
                    event_name = "store.token_exchange_failed",
                    error = %error,
                    "service-account token exchange request failed"
                );
                StoreError::Auth(format!("token exchange request failed: {error}"))
            })?;

        if !response.status().is_success() {
            return Err(StoreError::Auth(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|error| {
            StoreError::Auth(format!("failed to decode token response: {}", error.without_url()))
        })?;
        if token.access_token.is_empty() {
            return Err(StoreError::Auth("token endpoint returned empty access token".to_string()));
        }

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        Ok((SecretString::from(token.access_token), lifetime))
    }
}

#[async_trait]
impl AccessTokenProvider for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<SecretString, StoreError> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref().filter(|entry| entry.is_fresh(Instant::now())) {
            return Ok(entry.token.clone());
        }

        let (token, lifetime) = self.exchange().await?;
        info!(
            event_name = "store.token_refreshed",
            client_email = %self.key.client_email(),
            lifetime_secs = lifetime.as_secs(),
            "obtained store access token"
        );
        *cached = Some(CachedToken::new(token.clone(), lifetime, Instant::now()));
        Ok(token)
    }
}
