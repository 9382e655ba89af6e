//! OAuth access-token manager with automatic refresh.
//!
//! Obtains tokens either from a service-account key (JWT bearer grant) or
//! from a user refresh token, caches them in-memory, and refreshes when
//! they are about to expire.

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::credentials::{ServiceAccountKey, DRIVE_SCOPE};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Where access tokens come from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    ServiceAccount(ServiceAccountKey),
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        token_url: String,
    },
}

/// Cached token with expiration.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => Utc::now() >= exp - Duration::minutes(5),
            None => true, // No expiration info
        }
    }
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Manages the OAuth token used for every Drive call.
pub struct TokenManager {
    http: reqwest::Client,
    source: TokenSource,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(source: TokenSource) -> Self {
        Self {
            http: reqwest::Client::new(),
            source,
            cache: Mutex::new(None),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_valid_token(&self) -> anyhow::Result<String> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if !cached.is_expired() {
                debug!("Token cache hit");
                return Ok(cached.access_token.clone());
            }
            debug!("Token expired, refreshing");
        }

        let fresh = match &self.source {
            TokenSource::ServiceAccount(key) => self.exchange_assertion(key).await?,
            TokenSource::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
                token_url,
            } => {
                self.refresh_token(token_url, client_id, client_secret, refresh_token)
                    .await?
            }
        };

        let access_token = fresh.access_token.clone();
        *cache = Some(fresh);
        Ok(access_token)
    }

    /// Exchange a signed service-account assertion for an access token.
    async fn exchange_assertion(&self, key: &ServiceAccountKey) -> anyhow::Result<CachedToken> {
        let assertion = key.assertion(DRIVE_SCOPE, Utc::now())?;

        let resp = self
            .http
            .post(&key.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "Service account token exchange failed for {}: {} {}",
                key.client_email,
                status,
                body
            );
        }

        let token = Self::cache_entry(resp.json().await?);
        info!(
            "Obtained access token for service account {}",
            key.client_email
        );
        Ok(token)
    }

    /// Refresh an OAuth token using the refresh_token grant.
    async fn refresh_token(
        &self,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> anyhow::Result<CachedToken> {
        let resp = self
            .http
            .post(token_url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OAuth token refresh failed: {} {}", status, body);
        }

        let token = Self::cache_entry(resp.json().await?);
        info!("Refreshed OAuth token, expires at {:?}", token.expires_at);
        Ok(token)
    }

    fn cache_entry(resp: TokenResponse) -> CachedToken {
        CachedToken {
            access_token: resp.access_token,
            expires_at: Some(Utc::now() + Duration::seconds(resp.expires_in as i64)),
        }
    }
}
