//! Provider configuration
//!
//! Settings come from the `provider` section of the configuration file;
//! `ARM_*` environment variables fill in whatever the file leaves unset.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::auth::{ClientSecretCredential, StaticTokenCredential, TokenCredential};
use crate::client::{ArmError, DEFAULT_ENDPOINT, HttpArmClient};
use crate::provider::AzureRmProvider;
use crate::resources::{Features, ProviderContext};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("a subscription ID must be configured (`subscription_id` or ARM_SUBSCRIPTION_ID)")]
    MissingSubscription,

    #[error(
        "no credentials configured: set `access_token` (ARM_ACCESS_TOKEN) or `tenant_id`, `client_id` and `client_secret` (ARM_TENANT_ID, ARM_CLIENT_ID, ARM_CLIENT_SECRET)"
    )]
    MissingCredentials,

    #[error("building ARM client: {0}")]
    Client(#[from] ArmError),
}

#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub subscription_id: Option<String>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub endpoint: Option<String>,
    pub features: Features,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("ProviderConfig")
            .field("subscription_id", &self.subscription_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &redacted(&self.client_secret))
            .field("access_token", &redacted(&self.access_token))
            .field("endpoint", &self.endpoint)
            .field("features", &self.features)
            .finish()
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.as_deref().is_none_or(str::is_empty) {
        *slot = value.filter(|v| !v.is_empty());
    }
}

impl ProviderConfig {
    /// Fill unset values from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        fill(&mut self.subscription_id, lookup("ARM_SUBSCRIPTION_ID"));
        fill(&mut self.tenant_id, lookup("ARM_TENANT_ID"));
        fill(&mut self.client_id, lookup("ARM_CLIENT_ID"));
        fill(&mut self.client_secret, lookup("ARM_CLIENT_SECRET"));
        fill(&mut self.access_token, lookup("ARM_ACCESS_TOKEN"));
        fill(&mut self.endpoint, lookup("ARM_ENDPOINT"));
        self
    }

    pub fn subscription_id(&self) -> Result<&str, ConfigError> {
        self.subscription_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSubscription)
    }

    /// A pre-issued token wins over client credentials
    pub fn credential(&self) -> Result<Arc<dyn TokenCredential>, ConfigError> {
        if let Some(token) = &self.access_token {
            info!("Authenticating with a pre-issued access token");
            return Ok(Arc::new(StaticTokenCredential::new(token.clone())));
        }
        match (&self.tenant_id, &self.client_id, &self.client_secret) {
            (Some(tenant), Some(client), Some(secret)) => {
                info!("Authenticating as service principal {}", client);
                Ok(Arc::new(ClientSecretCredential::new(
                    tenant.clone(),
                    client.clone(),
                    secret.clone(),
                )))
            }
            _ => Err(ConfigError::MissingCredentials),
        }
    }

    /// Provider talking to Azure over HTTP
    pub fn build(&self) -> Result<AzureRmProvider, ConfigError> {
        let subscription_id = self.subscription_id()?;
        let endpoint = self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        let client = HttpArmClient::new(endpoint, self.credential()?)?;

        let ctx = ProviderContext::new(Arc::new(client), subscription_id)
            .with_features(self.features.clone());
        Ok(AzureRmProvider::new(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn parses_provider_section() {
        let config: ProviderConfig = serde_json::from_str(
            r#"{
                "subscription_id": "00000000-0000-0000-0000-000000000000",
                "access_token": "token",
                "features": {"machine_learning": {"purge_soft_deleted_workspace_on_destroy": true}}
            }"#,
        )
        .unwrap();
        assert_eq!(
            config.subscription_id().unwrap(),
            "00000000-0000-0000-0000-000000000000"
        );
        assert!(
            config
                .features
                .machine_learning
                .purge_soft_deleted_workspace_on_destroy
        );
        assert!(config.credential().is_ok());
    }

    #[test]
    fn environment_fills_unset_values_only() {
        let config = ProviderConfig {
            subscription_id: Some("from-file".to_string()),
            ..Default::default()
        }
        .with_overrides_from(env(&[
            ("ARM_SUBSCRIPTION_ID", "from-env"),
            ("ARM_TENANT_ID", "tenant"),
            ("ARM_CLIENT_ID", "client"),
            ("ARM_CLIENT_SECRET", "secret"),
            ("ARM_ENDPOINT", ""),
        ]));

        assert_eq!(config.subscription_id.as_deref(), Some("from-file"));
        assert_eq!(config.tenant_id.as_deref(), Some("tenant"));
        assert_eq!(config.endpoint, None);
        assert!(config.credential().is_ok());
    }

    #[test]
    fn missing_settings_are_reported() {
        let config = ProviderConfig::default();
        assert!(matches!(
            config.subscription_id(),
            Err(ConfigError::MissingSubscription)
        ));
        assert!(matches!(
            config.credential(),
            Err(ConfigError::MissingCredentials)
        ));

        let partial = ProviderConfig {
            tenant_id: Some("tenant".to_string()),
            client_id: Some("client".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            partial.credential(),
            Err(ConfigError::MissingCredentials)
        ));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = ProviderConfig {
            client_secret: Some("hunter2".to_string()),
            access_token: Some("eyJ0eXAi".to_string()),
            ..Default::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("eyJ0eXAi"));
    }
}
