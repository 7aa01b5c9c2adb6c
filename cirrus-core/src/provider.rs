//! Provider - Trait abstracting resource operations
//!
//! A Provider defines operations for a specific infrastructure.
//! It is responsible for converting Effects into actual API calls.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::ResourceSchema;

/// Classification of a provider failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The remote entity does not exist
    NotFound,
    /// The remote entity exists already and needs to be imported
    AlreadyExists { id: String },
    /// Configuration or identifier failed validation
    Validation,
    /// The operation deadline passed
    Timeout,
    /// The remote API returned an error
    Api,
    /// The provider does not handle the request
    Unsupported,
}

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
    pub resource_id: Option<ResourceId>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}.{}] {}", id.resource_type, id.name, self.message)?;
        } else {
            write!(f, "{}", self.message)?;
        }
        if let Some(ref cause) = self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Api,
            message: message.into(),
            resource_id: None,
            cause: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ErrorKind::NotFound)
    }

    /// The entity at `id` already exists and should be imported instead
    pub fn already_exists(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(format!(
            "A resource with the ID {:?} already exists - to be managed it needs to be imported into the State",
            id
        ))
        .with_kind(ErrorKind::AlreadyExists { id })
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ErrorKind::Validation)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ErrorKind::Timeout)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ErrorKind::Unsupported)
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Definition of resource types that a Provider can handle
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "private_dns_a_record")
    fn name(&self) -> &'static str;

    /// Attribute schema for this resource type
    fn schema(&self) -> ResourceSchema;
}

/// Attributes and identifier after state upgrades have been applied
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradedState {
    pub identifier: String,
    pub attributes: HashMap<String, Value>,
    pub schema_version: u32,
}

/// Main Provider trait
///
/// All operations are async and involve side effects.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "azurerm")
    fn name(&self) -> &'static str;

    /// List of resource types this Provider can handle
    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// Get the current state of a resource
    ///
    /// Returns `State::not_found()` if the resource does not exist.
    /// `prior` carries the last known state so write-only values can be kept.
    fn read<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
        prior: Option<&'a State>,
    ) -> BoxFuture<'a, ProviderResult<State>>;

    /// Create a resource
    ///
    /// Returns State with identifier set to the remote ID
    fn create<'a>(&'a self, resource: &'a Resource) -> BoxFuture<'a, ProviderResult<State>>;

    /// Update a resource
    fn update<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>>;

    /// Delete a resource
    fn delete<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>>;

    /// Adopt an existing remote entity by its identifier
    fn import<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<State>>;

    /// Migrate persisted attributes written by an older schema version
    fn upgrade_state(
        &self,
        resource_type: &str,
        schema_version: u32,
        identifier: &str,
        attributes: HashMap<String, Value>,
    ) -> ProviderResult<UpgradedState>;

    /// Check constraints spanning several attributes before any API call
    fn validate(&self, _resource: &Resource) -> ProviderResult<()> {
        Ok(())
    }
}

/// Lets an `Interpreter` borrow a provider that is still needed elsewhere
impl<P: Provider + ?Sized> Provider for &P {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        (**self).resource_types()
    }

    fn read<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
        prior: Option<&'a State>,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        (**self).read(id, identifier, prior)
    }

    fn create<'a>(&'a self, resource: &'a Resource) -> BoxFuture<'a, ProviderResult<State>> {
        (**self).create(resource)
    }

    fn update<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        (**self).update(id, identifier, from, to)
    }

    fn delete<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        (**self).delete(id, identifier)
    }

    fn import<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        (**self).import(id, identifier)
    }

    fn upgrade_state(
        &self,
        resource_type: &str,
        schema_version: u32,
        identifier: &str,
        attributes: HashMap<String, Value>,
    ) -> ProviderResult<UpgradedState> {
        (**self).upgrade_state(resource_type, schema_version, identifier, attributes)
    }

    fn validate(&self, resource: &Resource) -> ProviderResult<()> {
        (**self).validate(resource)
    }
}
