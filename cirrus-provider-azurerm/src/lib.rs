//! Cirrus Azure Resource Manager Provider
//!
//! Manages Azure resources through the Resource Manager REST API.
//!
//! ## Module Structure
//!
//! - `provider` - AzureRmProvider, dispatching to the resource implementations
//! - `resources` - The `AzureResource` contract and shared helpers
//! - `services` - One module per Azure service with its resources and API models
//! - `client` - ARM transport (HTTP and in-memory)
//! - `auth` - Credentials producing bearer tokens
//! - `ids` - Typed resource IDs
//! - `config` - Provider configuration and environment overrides
//! - `validate` / `utils` - Validators and expand/flatten helpers

pub mod auth;
pub mod client;
pub mod config;
pub mod ids;
pub mod provider;
pub mod resources;
pub mod services;
pub mod utils;
pub mod validate;

// Re-export main types
pub use config::{ConfigError, ProviderConfig};
pub use provider::AzureRmProvider;
pub use resources::{Features, ProviderContext};

use std::collections::HashMap;

use cirrus_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType, UpgradedState};
use cirrus_core::resource::{Resource, ResourceId, State, Value};

use resources::AzureResourceType;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for AzureRmProvider {
    fn name(&self) -> &'static str {
        "azurerm"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        self.all_resources()
            .iter()
            .map(|r| Box::new(AzureResourceType::of(r.as_ref())) as Box<dyn ResourceType>)
            .collect()
    }

    fn read<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
        prior: Option<&'a State>,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(async move {
            self.read_resource(id, identifier, prior.map(|s| &s.attributes))
                .await
        })
    }

    fn create<'a>(&'a self, resource: &'a Resource) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(async move { self.create_resource(resource).await })
    }

    fn update<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(async move { self.update_resource(id, identifier, from, to).await })
    }

    fn delete<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move { self.delete_resource(id, identifier).await })
    }

    fn import<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(async move { self.import_resource(id, identifier).await })
    }

    fn upgrade_state(
        &self,
        resource_type: &str,
        schema_version: u32,
        identifier: &str,
        attributes: HashMap<String, Value>,
    ) -> ProviderResult<UpgradedState> {
        self.upgrade_resource_state(resource_type, schema_version, identifier, attributes)
    }

    fn validate(&self, resource: &Resource) -> ProviderResult<()> {
        self.validate_resource(resource)
    }
}
