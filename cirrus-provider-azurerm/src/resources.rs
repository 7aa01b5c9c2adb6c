//! Resource type definitions
//!
//! This module defines:
//! - The `AzureResource` trait every managed resource implements
//! - `ProviderContext`, the client, subscription, features and locks shared by all resources
//! - `Attrs`, a typed reader over configuration attributes
//! - Error helpers mapping ARM failures to provider errors

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use cirrus_core::locks::LockRegistry;
use cirrus_core::provider::{ErrorKind, ProviderError, ProviderResult, ResourceType};
use cirrus_core::resource::Value;
use cirrus_core::schema::ResourceSchema;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::client::{ArmClient, ArmError, ResourceClient};

pub type Attributes = HashMap<String, Value>;

// =============================================================================
// Provider Context
// =============================================================================

/// Toggles changing how resources behave on destroy
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Features {
    pub machine_learning: MachineLearningFeatures,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MachineLearningFeatures {
    pub purge_soft_deleted_workspace_on_destroy: bool,
}

/// Everything a resource needs to talk to Azure
#[derive(Clone)]
pub struct ProviderContext {
    pub client: Arc<dyn ArmClient>,
    pub subscription_id: String,
    pub features: Features,
    pub locks: Arc<LockRegistry>,
}

impl ProviderContext {
    pub fn new(client: Arc<dyn ArmClient>, subscription_id: impl Into<String>) -> Self {
        Self {
            client,
            subscription_id: subscription_id.into(),
            features: Features::default(),
            locks: Arc::new(LockRegistry::new()),
        }
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    /// Typed client for one kind of ARM resource
    pub fn resource_client<M>(&self, api_version: &'static str) -> ResourceClient<M>
    where
        M: serde::Serialize + DeserializeOwned + Send + Sync,
    {
        ResourceClient::new(self.client.clone(), api_version)
    }
}

// =============================================================================
// Resource Trait
// =============================================================================

/// A resource type managed through Azure Resource Manager
///
/// `create` returns the ARM ID of the new entity. `read` returns `None` when
/// the entity no longer exists, and may use `prior` to keep values the API
/// never returns (secrets).
#[async_trait]
pub trait AzureResource: Send + Sync {
    fn resource_type(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    /// Validate an identifier given to `import`
    fn validate_id(&self, identifier: &str) -> Result<(), String>;

    /// Constraints spanning several attributes
    fn validate(&self, _attrs: &Attributes) -> Result<(), String> {
        Ok(())
    }

    async fn create(&self, ctx: &ProviderContext, attrs: &Attributes) -> ProviderResult<String>;

    async fn read(
        &self,
        ctx: &ProviderContext,
        identifier: &str,
        prior: Option<&Attributes>,
    ) -> ProviderResult<Option<Attributes>>;

    async fn update(
        &self,
        ctx: &ProviderContext,
        identifier: &str,
        from: &Attributes,
        to: &Attributes,
    ) -> ProviderResult<()>;

    async fn delete(&self, ctx: &ProviderContext, identifier: &str) -> ProviderResult<()>;

    /// Extra check run before an existing entity is imported
    async fn import_check(&self, _ctx: &ProviderContext, _identifier: &str) -> ProviderResult<()> {
        Ok(())
    }

    /// Migrations from older schema versions, one per version step
    fn state_upgraders(&self) -> Vec<Box<dyn StateUpgrader>> {
        Vec::new()
    }
}

/// Migration of persisted state from `from_version()` to the next version
pub trait StateUpgrader: Send + Sync {
    fn from_version(&self) -> u32;

    fn upgrade(&self, identifier: &str, attrs: Attributes) -> ProviderResult<(String, Attributes)>;
}

/// `ResourceType` view of an `AzureResource`
pub struct AzureResourceType {
    name: &'static str,
    schema: ResourceSchema,
}

impl AzureResourceType {
    pub fn of(resource: &dyn AzureResource) -> Self {
        Self {
            name: resource.resource_type(),
            schema: resource.schema(),
        }
    }
}

impl ResourceType for AzureResourceType {
    fn name(&self) -> &'static str {
        self.name
    }

    fn schema(&self) -> ResourceSchema {
        self.schema.clone()
    }
}

/// Returns all resource types supported by this provider
pub fn resources() -> Vec<Box<dyn AzureResource>> {
    let mut all = Vec::new();
    all.extend(crate::services::datafactory::resources());
    all.extend(crate::services::loganalytics::resources());
    all.extend(crate::services::machinelearning::resources());
    all.extend(crate::services::mssql::resources());
    all.extend(crate::services::netapp::resources());
    all.extend(crate::services::privatedns::resources());
    all
}

// =============================================================================
// Attribute Access
// =============================================================================

/// Typed read access to configuration attributes
///
/// Missing attributes and values of the wrong type read as absent, the
/// schema has already been validated by the time resources see them.
#[derive(Debug, Clone, Copy)]
pub struct Attrs<'a>(&'a Attributes);

impl<'a> Attrs<'a> {
    pub fn new(attrs: &'a Attributes) -> Self {
        Self(attrs)
    }

    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.0.get(name)
    }

    /// Non-empty string value
    pub fn str(&self, name: &str) -> Option<&'a str> {
        self.0
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// String value, empty when absent
    pub fn string(&self, name: &str) -> String {
        self.str(name).unwrap_or_default().to_string()
    }

    pub fn require(&self, name: &str) -> ProviderResult<&'a str> {
        self.str(name).ok_or_else(|| {
            ProviderError::validation(format!("the argument {:?} is required", name))
        })
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_int)
    }

    pub fn bool(&self, name: &str) -> bool {
        self.0.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    /// First item of a block
    pub fn block(&self, name: &str) -> Option<Attrs<'a>> {
        self.blocks(name).into_iter().next()
    }

    /// All items of a block list
    pub fn blocks(&self, name: &str) -> Vec<Attrs<'a>> {
        match self.0.get(name) {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::Map(map) => Some(Attrs(map)),
                    _ => None,
                })
                .collect(),
            Some(Value::Map(map)) => vec![Attrs(map)],
            _ => Vec::new(),
        }
    }

    pub fn strings(&self, name: &str) -> Vec<String> {
        match self.0.get(name) {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Map of strings, e.g. tags
    pub fn string_map(&self, name: &str) -> HashMap<String, String> {
        match self.0.get(name) {
            Some(Value::Map(map)) => map
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect(),
            _ => HashMap::new(),
        }
    }
}

/// Whether `name` differs between two attribute sets (absent equals empty)
pub fn has_change(from: &Attributes, to: &Attributes, name: &str) -> bool {
    let empty = |v: Option<&Value>| v.is_none_or(Value::is_empty);
    match (from.get(name), to.get(name)) {
        (a, b) if empty(a) && empty(b) => false,
        (a, b) => a != b,
    }
}

/// Insert a value into attributes being flattened
pub fn set(attrs: &mut Attributes, name: &str, value: impl Into<Value>) {
    attrs.insert(name.to_string(), value.into());
}

/// Wrap flattened block items into a block value
pub fn blocks(items: Vec<Attributes>) -> Value {
    Value::List(items.into_iter().map(Value::Map).collect())
}

// =============================================================================
// Error Helpers
// =============================================================================

/// Wrap an ARM failure with what was being attempted
pub fn api_error(action: impl Display, err: ArmError) -> ProviderError {
    let kind = if err.was_not_found() {
        ErrorKind::NotFound
    } else {
        ErrorKind::Api
    };
    ProviderError::new(action.to_string())
        .with_kind(kind)
        .with_cause(err)
}

/// Invalid identifier or value found while parsing
pub fn parse_error(err: impl Display) -> ProviderError {
    ProviderError::validation(err.to_string())
}

/// Fail with `AlreadyExists` when the entity at `id` is present
pub async fn ensure_absent<M>(client: &ResourceClient<M>, id: &str) -> ProviderResult<()>
where
    M: serde::Serialize + DeserializeOwned + Send + Sync,
{
    match client.get(id).await {
        Ok(_) => Err(ProviderError::already_exists(id)),
        Err(e) if e.was_not_found() => Ok(()),
        Err(e) => Err(api_error(
            format!("checking for presence of existing {}", id),
            e,
        )),
    }
}

/// Fetch a resource, `None` when it is gone
pub async fn get_existing<M>(
    client: &ResourceClient<M>,
    id: &str,
    what: impl Display,
) -> ProviderResult<Option<M>>
where
    M: serde::Serialize + DeserializeOwned + Send + Sync,
{
    match client.get(id).await {
        Ok(model) => Ok(Some(model)),
        Err(e) if e.was_not_found() => {
            info!("{} was not found - removing from state", what);
            Ok(None)
        }
        Err(e) => Err(api_error(format!("retrieving {}", what), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryArmClient;
    use serde_json::json;

    fn attrs(pairs: Vec<(&str, Value)>) -> Attributes {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn attrs_reads_blocks_and_scalars() {
        let mut inner = Attributes::new();
        set(&mut inner, "isolation_mode", "Disabled");
        let a = attrs(vec![
            ("name", Value::string("hub")),
            ("empty", Value::string("")),
            ("count", Value::Int(3)),
            ("enabled", Value::Bool(true)),
            ("managed_network", Value::block(inner)),
        ]);
        let a = Attrs::new(&a);

        assert_eq!(a.str("name"), Some("hub"));
        assert_eq!(a.str("empty"), None);
        assert_eq!(a.string("missing"), "");
        assert_eq!(a.int("count"), Some(3));
        assert!(a.bool("enabled"));
        assert!(!a.bool("missing"));
        assert_eq!(
            a.block("managed_network").and_then(|b| b.str("isolation_mode")),
            Some("Disabled")
        );
        assert!(a.require("missing").is_err());
    }

    #[test]
    fn has_change_treats_absent_as_empty() {
        let from = attrs(vec![("description", Value::string(""))]);
        let to = Attributes::new();
        assert!(!has_change(&from, &to, "description"));

        let to = attrs(vec![("description", Value::string("new"))]);
        assert!(has_change(&from, &to, "description"));
    }

    #[tokio::test]
    async fn ensure_absent_reports_existing_entities() {
        let arm = Arc::new(MemoryArmClient::new());
        let path = "/subscriptions/1/resourceGroups/rg";
        let client: ResourceClient<serde_json::Value> =
            ResourceClient::new(arm.clone(), "2021-04-01");

        assert!(ensure_absent(&client, path).await.is_ok());

        arm.insert(path, json!({"location": "westeurope"}));
        let err = ensure_absent(&client, path).await.unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::AlreadyExists {
                id: path.to_string()
            }
        );
    }

    #[tokio::test]
    async fn get_existing_returns_none_when_gone() {
        let arm = Arc::new(MemoryArmClient::new());
        let client: ResourceClient<serde_json::Value> = ResourceClient::new(arm, "2021-04-01");
        let found = get_existing(&client, "/subscriptions/1/resourceGroups/rg", "rg")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn api_error_keeps_not_found_kind() {
        let err = api_error(
            "retrieving thing",
            ArmError::from_response(404, Some(&json!({"error": {"code": "NotFound", "message": "gone"}}))),
        );
        assert!(err.is_not_found());
        assert!(err.to_string().starts_with("retrieving thing: "));
    }
}
