//! Credentials for Azure Resource Manager
//!
//! Tokens are requested for a scope (`https://management.azure.com/.default`)
//! and attached to every ARM request as a bearer token.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Refresh tokens this long before they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("requesting token from {endpoint}: {message}")]
    Request { endpoint: String, message: String },

    #[error("token endpoint returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("missing credential setting: {0}")]
    MissingSetting(&'static str),
}

/// Access token with its expiry
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Instant,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

/// Source of bearer tokens
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, AuthError>;
}

/// Pre-issued token (e.g. from `ARM_ACCESS_TOKEN`)
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, _scopes: &[&str]) -> Result<AccessToken, AuthError> {
        Ok(AccessToken {
            token: self.token.clone(),
            expires_at: Instant::now() + Duration::from_secs(3600),
        })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

/// OAuth2 client-credentials flow against Microsoft Entra ID
pub struct ClientSecretCredential {
    http: reqwest::Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    cache: Mutex<Option<AccessToken>>,
}

impl ClientSecretCredential {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            authority: DEFAULT_AUTHORITY.to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }

    fn token_endpoint(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant_id)
    }

    async fn request_token(&self, scopes: &[&str]) -> Result<AccessToken, AuthError> {
        let endpoint = self.token_endpoint();
        let scope = scopes.join(" ");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];

        let response = self
            .http
            .post(&endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::Request {
                endpoint: endpoint.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: TokenResponse = response.json().await.map_err(|e| AuthError::Request {
            endpoint: endpoint.clone(),
            message: e.to_string(),
        })?;

        // Entra ID has returned expires_in both as a number and as a string
        let lifetime = match body.expires_in {
            Some(serde_json::Value::Number(n)) => n.as_u64(),
            Some(serde_json::Value::String(s)) => s.parse().ok(),
            _ => None,
        }
        .unwrap_or(3600);

        info!("Obtained access token for client {}", self.client_id);

        Ok(AccessToken {
            token: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        })
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, AuthError> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref()
            && token.is_fresh()
        {
            debug!("Using cached access token");
            return Ok(token.clone());
        }

        let token = self.request_token(scopes).await?;
        *cache = Some(token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token_is_returned() {
        let cred = StaticTokenCredential::new("abc");
        let token = cred
            .get_token(&["https://management.azure.com/.default"])
            .await
            .unwrap();
        assert_eq!(token.token, "abc");
        assert!(token.is_fresh());
    }

    #[test]
    fn token_endpoint_uses_tenant() {
        let cred = ClientSecretCredential::new("tenant", "client", "secret")
            .with_authority("https://login.example.com/");
        assert_eq!(
            cred.token_endpoint(),
            "https://login.example.com/tenant/oauth2/v2.0/token"
        );
    }

    #[test]
    fn debug_redacts_token() {
        let token = AccessToken {
            token: "secret-value".to_string(),
            expires_at: Instant::now(),
        };
        assert!(!format!("{:?}", token).contains("secret-value"));
    }
}
