//! OAuth access tokens for the Google Sheets API.
//!
//! A service account signs an RS256 JWT assertion and exchanges it at the
//! account's token endpoint for a short-lived access token, which is cached
//! until shortly before it expires.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::StorageError;

/// OAuth scope for reading and writing spreadsheets.
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
/// OAuth scope for finding, creating and sharing files on Drive.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens are refreshed this long before their reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const PROVIDER: &str = "google";

/// Something that can hand out a bearer token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, StorageError>;
}

/// A fixed, externally issued access token.
pub struct StaticToken(SecretString);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, StorageError> {
        Ok(self.0.expose_secret().to_string())
    }
}

/// The fields of a service-account credentials file this bot needs.
#[derive(Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: SecretString,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Parse the JSON credentials file contents.
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse `value` as inline JSON when it looks like an object, otherwise
    /// read the credentials file it names.
    pub fn from_inline_or_path(value: &str) -> Result<Self, StorageError> {
        let value = value.trim();
        if value.starts_with('{') {
            return Self::from_json(value);
        }
        let json = std::fs::read_to_string(value)?;
        Self::from_json(&json)
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    token: String,
    refresh_at: DateTime<Utc>,
}

/// Access tokens minted from a service account key.
pub struct ServiceAccountTokens {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    client: reqwest::Client,
    cached: RwLock<Option<CachedToken>>,
}

impl ServiceAccountTokens {
    pub fn new(key: ServiceAccountKey, client: reqwest::Client) -> Result<Self, StorageError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
            .map_err(|e| StorageError::AuthFailed {
                provider: PROVIDER.into(),
                reason: format!("invalid private key: {e}"),
            })?;
        Ok(Self {
            key,
            encoding_key,
            client,
            cached: RwLock::new(None),
        })
    }

    /// Build the signed JWT exchanged for an access token.
    fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String, StorageError> {
        let claims = AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: format!("{SHEETS_SCOPE} {DRIVE_SCOPE}"),
            aud: self.key.token_uri.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key).map_err(
            |e| StorageError::AuthFailed {
                provider: PROVIDER.into(),
                reason: format!("failed to sign assertion: {e}"),
            },
        )
    }

    async fn fetch_token(&self) -> Result<CachedToken, StorageError> {
        let now = Utc::now();
        let assertion = self.signed_assertion(now)?;

        let resp = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| StorageError::AuthFailed {
                provider: PROVIDER.into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::AuthFailed {
                provider: PROVIDER.into(),
                reason: format!("token endpoint returned {status}: {body}"),
            });
        }

        let token: TokenResponse = resp.json().await.map_err(|e| StorageError::InvalidResponse {
            provider: PROVIDER.into(),
            reason: e.to_string(),
        })?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        let refresh_at = now + chrono::Duration::from_std(lifetime).unwrap_or_default();
        info!(client_email = %self.key.client_email, "Obtained Google access token");

        Ok(CachedToken {
            token: token.access_token,
            refresh_at,
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokens {
    async fn access_token(&self) -> Result<String, StorageError> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if Utc::now() < cached.refresh_at {
                return Ok(cached.token.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(existing) = cached.as_ref() {
            if Utc::now() < existing.refresh_at {
                return Ok(existing.token.clone());
            }
        }

        debug!("Refreshing Google access token");
        let fresh = self.fetch_token().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}
