//! Service-account key loading and JWT bearer assertions.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

/// Full Drive access, as granted to the service account.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("Failed to read credentials file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Invalid credentials JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Expected a service_account key, got {0:?}")]
    WrongType(String),

    #[error("Invalid private key: {0}")]
    Key(#[from] jsonwebtoken::errors::Error),
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

/// The subset of a Google service-account key file needed for token exchange.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, CredentialsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, CredentialsError> {
        let key: Self = serde_json::from_str(json)?;
        if key.key_type != "service_account" {
            return Err(CredentialsError::WrongType(key.key_type));
        }
        Ok(key)
    }

    /// Signed RS256 assertion for the `jwt-bearer` grant, valid for one hour from `now`.
    pub fn assertion(&self, scope: &str, now: DateTime<Utc>) -> Result<String, CredentialsError> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };

        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())?;
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }
}
