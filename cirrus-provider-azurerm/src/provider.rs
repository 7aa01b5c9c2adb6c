//! Azure Resource Manager provider implementation
//!
//! Dispatches provider operations to the `AzureResource` registered for the
//! resource type, bounding each call by the type's timeouts.

use cirrus_core::provider::{ProviderError, ProviderResult, UpgradedState};
use cirrus_core::resource::{Resource, ResourceId, State};
use cirrus_core::schema::ResourceSchema;
use cirrus_core::timeouts::Operation;
use tracing::{debug, info};

use crate::resources::{Attributes, AzureResource, ProviderContext, resources};

/// Azure Resource Manager Provider
pub struct AzureRmProvider {
    ctx: ProviderContext,
    resources: Vec<Box<dyn AzureResource>>,
}

impl AzureRmProvider {
    /// Provider managing every supported resource type
    pub fn new(ctx: ProviderContext) -> Self {
        Self::with_resources(ctx, resources())
    }

    pub fn with_resources(ctx: ProviderContext, resources: Vec<Box<dyn AzureResource>>) -> Self {
        Self { ctx, resources }
    }

    pub fn context(&self) -> &ProviderContext {
        &self.ctx
    }

    pub(crate) fn all_resources(&self) -> &[Box<dyn AzureResource>] {
        &self.resources
    }

    fn resource(&self, id: &ResourceId) -> ProviderResult<&dyn AzureResource> {
        self.resources
            .iter()
            .find(|r| r.resource_type() == id.resource_type)
            .map(|r| r.as_ref())
            .ok_or_else(|| {
                ProviderError::unsupported(format!("Unknown resource type: {}", id.resource_type))
                    .for_resource(id.clone())
            })
    }

    /// Apply defaults, then check the schema and cross-attribute constraints
    fn prepare(
        &self,
        r: &dyn AzureResource,
        schema: &ResourceSchema,
        resource: &Resource,
    ) -> ProviderResult<Attributes> {
        let mut attrs = resource.attributes.clone();
        schema.normalize(&mut attrs);

        if let Err(errors) = schema.validate(&attrs) {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return Err(ProviderError::validation(messages.join("; "))
                .for_resource(resource.id.clone()));
        }
        r.validate(&attrs)
            .map_err(|e| ProviderError::validation(e).for_resource(resource.id.clone()))?;
        Ok(attrs)
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource without calling Azure
    pub fn validate_resource(&self, resource: &Resource) -> ProviderResult<()> {
        let r = self.resource(&resource.id)?;
        self.prepare(r, &r.schema(), resource).map(|_| ())
    }

    /// Read a resource by its ARM ID
    pub async fn read_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        prior: Option<&Attributes>,
    ) -> ProviderResult<State> {
        let r = self.resource(id)?;
        let schema = r.schema();
        debug!("Reading {} ({})", id, identifier);

        let attributes = schema
            .timeouts
            .run(Operation::Read, id, r.read(&self.ctx, identifier, prior))
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        match attributes {
            Some(attributes) => Ok(State::existing(id.clone(), attributes)
                .with_identifier(identifier)
                .with_schema_version(schema.version)),
            None => {
                info!("{} does not exist - removing from state", id);
                Ok(State::not_found(id.clone()))
            }
        }
    }

    /// Create a resource, then read it back
    pub async fn create_resource(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let r = self.resource(id)?;
        let schema = r.schema();
        let attrs = self.prepare(r, &schema, resource)?;

        info!("Creating {}", id);
        let identifier = schema
            .timeouts
            .run(Operation::Create, id, r.create(&self.ctx, &attrs))
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        info!("Created {} with ID {}", id, identifier);

        self.read_back(id, &identifier, &attrs).await
    }

    /// Update a resource in place, then read it back
    pub async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let r = self.resource(id)?;
        let schema = r.schema();
        let attrs = self.prepare(r, &schema, to)?;

        info!("Updating {}", id);
        schema
            .timeouts
            .run(
                Operation::Update,
                id,
                r.update(&self.ctx, identifier, &from.attributes, &attrs),
            )
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        self.read_back(id, identifier, &attrs).await
    }

    /// Delete a resource
    pub async fn delete_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        let r = self.resource(id)?;
        info!("Deleting {}", id);
        r.schema()
            .timeouts
            .run(Operation::Delete, id, r.delete(&self.ctx, identifier))
            .await
            .map_err(|e| e.for_resource(id.clone()))
    }

    /// Adopt an existing entity by its ARM ID
    pub async fn import_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
        let r = self.resource(id)?;
        r.validate_id(identifier)
            .map_err(|e| ProviderError::validation(e).for_resource(id.clone()))?;
        r.import_check(&self.ctx, identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let state = self.read_resource(id, identifier, None).await?;
        if !state.exists {
            return Err(ProviderError::not_found(format!(
                "Cannot import non-existent remote object {:?}",
                identifier
            ))
            .for_resource(id.clone()));
        }
        info!("Imported {} from {}", id, identifier);
        Ok(state)
    }

    /// Run the state upgraders from `schema_version` up to the current version
    pub fn upgrade_resource_state(
        &self,
        resource_type: &str,
        schema_version: u32,
        identifier: &str,
        attributes: Attributes,
    ) -> ProviderResult<UpgradedState> {
        let id = ResourceId::new(resource_type, identifier);
        let r = self.resource(&id)?;
        let current = r.schema().version;
        if schema_version > current {
            return Err(ProviderError::validation(format!(
                "state of {} has schema version {} but the newest known version is {}",
                resource_type, schema_version, current
            )));
        }

        let upgraders = r.state_upgraders();
        let mut identifier = identifier.to_string();
        let mut attributes = attributes;
        for version in schema_version..current {
            let upgrader = upgraders
                .iter()
                .find(|u| u.from_version() == version)
                .ok_or_else(|| {
                    ProviderError::unsupported(format!(
                        "no state upgrade for {} from schema version {}",
                        resource_type, version
                    ))
                })?;
            debug!(
                "Upgrading {} state from schema version {}",
                resource_type, version
            );
            (identifier, attributes) = upgrader.upgrade(&identifier, attributes)?;
        }

        Ok(UpgradedState {
            identifier,
            attributes,
            schema_version: current,
        })
    }

    async fn read_back(
        &self,
        id: &ResourceId,
        identifier: &str,
        desired: &Attributes,
    ) -> ProviderResult<State> {
        let state = self.read_resource(id, identifier, Some(desired)).await?;
        if !state.exists {
            return Err(ProviderError::not_found(format!(
                "{} was not found after it was written",
                identifier
            ))
            .for_resource(id.clone()));
        }
        Ok(state)
    }
}
