//! AI Foundry hub, a Machine Learning workspace of kind `Hub`

use async_trait::async_trait;
use cirrus_core::provider::{ProviderError, ProviderResult};
use cirrus_core::resource::Value;
use cirrus_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema, types};
use cirrus_core::timeouts::{Timeouts, minutes};

use super::API_VERSION;
use super::models::{
    DeleteOptions, ENCRYPTION_ENABLED, EncryptionKeyVaultProperties, EncryptionProperty,
    IdentityForCmk, ManagedNetworkSettings, Workspace, WorkspaceProperties,
};
use crate::ids::{
    ApplicationInsightsId, ContainerRegistryId, KeyVaultId, NestedItemId, StorageAccountId,
    UserAssignedIdentityId, VersionType, WorkspaceId, id_type,
};
use crate::resources::{
    Attributes, Attrs, AzureResource, ProviderContext, api_error, blocks, ensure_absent,
    get_existing, has_change, parse_error, set,
};
use crate::utils::{
    expand_identity, expand_tags, flatten_identity, flatten_tags, identity_schema,
    location_schema, normalize_location, resource_group_name_schema, tags_schema,
};
use crate::validate;

const KIND_HUB: &str = "Hub";

pub struct AiFoundryResource;

fn encryption_schema() -> AttributeSchema {
    let block = BlockSchema::new()
        .attribute(AttributeSchema::new("key_vault_id", id_type::<KeyVaultId>()).required())
        .attribute(
            AttributeSchema::new("key_id", types::string_with("KeyVaultKeyId", NestedItemId::validate))
                .required(),
        )
        .attribute(AttributeSchema::new(
            "user_assigned_identity_id",
            id_type::<UserAssignedIdentityId>(),
        ));
    AttributeSchema::new("encryption", block.into_type())
        .force_new()
        .max_items(1)
}

fn managed_network_schema() -> AttributeSchema {
    let block = BlockSchema::new().attribute(
        AttributeSchema::new(
            "isolation_mode",
            AttributeType::enumeration(&[
                "AllowInternetOutbound",
                "AllowOnlyApprovedOutbound",
                "Disabled",
            ]),
        )
        .computed(),
    );
    AttributeSchema::new("managed_network", block.into_type())
        .computed()
        .max_items(1)
}

/// Parse an optional ID attribute into its canonical form
fn optional_id<T>(
    a: Attrs<'_>,
    name: &str,
    parse: fn(&str) -> Result<T, crate::ids::IdParseError>,
    id: fn(&T) -> String,
) -> ProviderResult<Option<String>> {
    match a.str(name) {
        Some(value) => Ok(Some(id(&parse(value).map_err(parse_error)?))),
        None => Ok(None),
    }
}

fn expand_encryption(block: Option<Attrs<'_>>) -> Option<EncryptionProperty> {
    let block = block?;
    Some(EncryptionProperty {
        status: ENCRYPTION_ENABLED.to_string(),
        identity: Some(IdentityForCmk {
            user_assigned_identity: block.str("user_assigned_identity_id").map(str::to_string),
        }),
        key_vault_properties: EncryptionKeyVaultProperties {
            key_vault_arm_id: block.string("key_vault_id"),
            key_identifier: block.string("key_id"),
            identity_client_id: None,
        },
    })
}

fn flatten_encryption(encryption: Option<&EncryptionProperty>) -> ProviderResult<Value> {
    let Some(encryption) = encryption.filter(|e| e.status == ENCRYPTION_ENABLED) else {
        return Ok(Value::empty_list());
    };

    let kv = &encryption.key_vault_properties;
    let mut block = Attributes::new();
    if !kv.key_vault_arm_id.is_empty() {
        let id = KeyVaultId::parse(&kv.key_vault_arm_id).map_err(parse_error)?;
        set(&mut block, "key_vault_id", id.id());
    }
    if !kv.key_identifier.is_empty() {
        let key = NestedItemId::parse(&kv.key_identifier, VersionType::Versioned)
            .map_err(parse_error)?;
        set(&mut block, "key_id", key.id());
    }
    if let Some(identity) = encryption
        .identity
        .as_ref()
        .and_then(|i| i.user_assigned_identity.as_deref())
    {
        let id = UserAssignedIdentityId::parse_insensitively(identity).map_err(parse_error)?;
        set(&mut block, "user_assigned_identity_id", id.id());
    }
    Ok(blocks(vec![block]))
}

fn expand_managed_network(block: Option<Attrs<'_>>) -> Option<ManagedNetworkSettings> {
    block.map(|b| ManagedNetworkSettings {
        isolation_mode: b.str("isolation_mode").map(str::to_string),
        ..Default::default()
    })
}

fn flatten_managed_network(network: Option<&ManagedNetworkSettings>) -> Value {
    match network {
        Some(network) => {
            let mut block = Attributes::new();
            set(
                &mut block,
                "isolation_mode",
                network.isolation_mode.clone().unwrap_or_default(),
            );
            blocks(vec![block])
        }
        None => Value::empty_list(),
    }
}

#[async_trait]
impl AzureResource for AiFoundryResource {
    fn resource_type(&self) -> &'static str {
        "ai_foundry"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.resource_type())
            .with_description("AI Foundry hub")
            .attribute(
                AttributeSchema::new("name", validate::workspace_name())
                    .required()
                    .force_new(),
            )
            .attribute(location_schema())
            .attribute(resource_group_name_schema())
            .attribute(
                AttributeSchema::new("key_vault_id", id_type::<KeyVaultId>())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("storage_account_id", id_type::<StorageAccountId>())
                    .required()
                    .force_new(),
            )
            .attribute(identity_schema().required())
            .attribute(
                AttributeSchema::new("high_business_impact_enabled", AttributeType::Bool)
                    .computed()
                    .force_new(),
            )
            .attribute(encryption_schema())
            .attribute(AttributeSchema::new(
                "application_insights_id",
                id_type::<ApplicationInsightsId>(),
            ))
            .attribute(AttributeSchema::new(
                "container_registry_id",
                id_type::<ContainerRegistryId>(),
            ))
            .attribute(managed_network_schema())
            .attribute(AttributeSchema::new(
                "primary_user_assigned_identity",
                id_type::<UserAssignedIdentityId>(),
            ))
            .attribute(
                AttributeSchema::new(
                    "public_network_access",
                    AttributeType::enumeration(&["Enabled", "Disabled"]),
                )
                .with_default(Value::string("Enabled")),
            )
            .attribute(AttributeSchema::new("description", types::string_not_empty()))
            .attribute(AttributeSchema::new("friendly_name", types::string_not_empty()))
            .attribute(tags_schema())
            .attribute(AttributeSchema::new("discovery_url", AttributeType::String).read_only())
            .attribute(AttributeSchema::new("workspace_id", AttributeType::String).read_only())
            .with_timeouts(Timeouts::new(
                minutes(60),
                minutes(5),
                minutes(30),
                minutes(30),
            ))
    }

    fn validate_id(&self, identifier: &str) -> Result<(), String> {
        WorkspaceId::validate(identifier)
    }

    async fn import_check(&self, ctx: &ProviderContext, identifier: &str) -> ProviderResult<()> {
        let id = WorkspaceId::parse(identifier).map_err(parse_error)?;
        let workspace = ctx
            .resource_client::<Workspace>(API_VERSION)
            .get(&id.id())
            .await
            .map_err(|e| api_error(format!("retrieving {}", id), e))?;
        let kind = workspace
            .kind
            .ok_or_else(|| ProviderError::new(format!("retrieving {}: `kind` was nil", id)))?;

        if !kind.eq_ignore_ascii_case(KIND_HUB) {
            return Err(ProviderError::validation(format!(
                "importing {}: specified workspace is not of kind `{}`, got `{}`",
                id, KIND_HUB, kind
            )));
        }
        Ok(())
    }

    async fn create(&self, ctx: &ProviderContext, attrs: &Attributes) -> ProviderResult<String> {
        let a = Attrs::new(attrs);
        let id = WorkspaceId::new(
            &ctx.subscription_id,
            a.require("resource_group_name")?,
            a.require("name")?,
        );

        let client = ctx.resource_client::<Workspace>(API_VERSION);
        ensure_absent(&client, &id.id()).await?;

        let storage_account =
            StorageAccountId::parse(a.require("storage_account_id")?).map_err(parse_error)?;
        let key_vault = KeyVaultId::parse(a.require("key_vault_id")?).map_err(parse_error)?;
        let identity = expand_identity(a.block("identity"))
            .map_err(|e| parse_error(format!("expanding `identity`: {}", e)))?;

        let properties = WorkspaceProperties {
            key_vault: Some(key_vault.id()),
            storage_account: Some(storage_account.id()),
            public_network_access: a.str("public_network_access").map(str::to_string),
            application_insights: optional_id(
                a,
                "application_insights_id",
                ApplicationInsightsId::parse,
                ApplicationInsightsId::id,
            )?,
            container_registry: optional_id(
                a,
                "container_registry_id",
                ContainerRegistryId::parse,
                ContainerRegistryId::id,
            )?,
            description: a.str("description").map(str::to_string),
            friendly_name: a.str("friendly_name").map(str::to_string),
            hbi_workspace: a.bool("high_business_impact_enabled").then_some(true),
            primary_user_assigned_identity: optional_id(
                a,
                "primary_user_assigned_identity",
                UserAssignedIdentityId::parse,
                UserAssignedIdentityId::id,
            )?,
            encryption: expand_encryption(a.block("encryption")),
            managed_network: expand_managed_network(a.block("managed_network")),
            ..Default::default()
        };

        let payload = Workspace {
            name: Some(id.workspace_name.clone()),
            location: Some(normalize_location(a.require("location")?)),
            kind: Some(KIND_HUB.to_string()),
            tags: expand_tags(a),
            identity,
            properties: Some(properties),
            ..Default::default()
        };
        client
            .create_or_update_then_poll(&id.id(), &payload)
            .await
            .map_err(|e| api_error(format!("creating {}", id), e))?;

        Ok(id.id())
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        identifier: &str,
        _prior: Option<&Attributes>,
    ) -> ProviderResult<Option<Attributes>> {
        let id = WorkspaceId::parse(identifier).map_err(parse_error)?;
        let client = ctx.resource_client::<Workspace>(API_VERSION);
        let Some(workspace) = get_existing(&client, &id.id(), &id).await? else {
            return Ok(None);
        };

        let mut out = Attributes::new();
        set(&mut out, "name", id.workspace_name.as_str());
        set(&mut out, "resource_group_name", id.resource_group_name.as_str());
        set(
            &mut out,
            "location",
            normalize_location(workspace.location.as_deref().unwrap_or_default()),
        );
        out.insert(
            "identity".to_string(),
            flatten_identity(workspace.identity.as_ref())
                .map_err(|e| parse_error(format!("flattening `identity`: {}", e)))?,
        );
        out.insert("tags".to_string(), flatten_tags(workspace.tags.as_ref()));

        let props = workspace.properties.unwrap_or_default();
        if let Some(v) = props.application_insights.as_deref().filter(|v| !v.is_empty()) {
            let insights = ApplicationInsightsId::parse_insensitively(v).map_err(parse_error)?;
            set(&mut out, "application_insights_id", insights.id());
        }
        if let Some(v) = props.container_registry.as_deref().filter(|v| !v.is_empty()) {
            let registry = ContainerRegistryId::parse(v).map_err(parse_error)?;
            set(&mut out, "container_registry_id", registry.id());
        }
        if let Some(v) = props.storage_account.as_deref() {
            let account = StorageAccountId::parse(v).map_err(parse_error)?;
            set(&mut out, "storage_account_id", account.id());
        }
        if let Some(v) = props.key_vault.as_deref() {
            let vault = KeyVaultId::parse(v).map_err(parse_error)?;
            set(&mut out, "key_vault_id", vault.id());
        }
        if let Some(v) = props
            .primary_user_assigned_identity
            .as_deref()
            .filter(|v| !v.is_empty())
        {
            let identity = UserAssignedIdentityId::parse(v).map_err(parse_error)?;
            set(&mut out, "primary_user_assigned_identity", identity.id());
        }

        set(&mut out, "description", props.description.clone().unwrap_or_default());
        set(
            &mut out,
            "friendly_name",
            props.friendly_name.clone().unwrap_or_default(),
        );
        set(
            &mut out,
            "high_business_impact_enabled",
            props.hbi_workspace.unwrap_or_default(),
        );
        set(
            &mut out,
            "public_network_access",
            props.public_network_access.clone().unwrap_or_default(),
        );
        set(
            &mut out,
            "discovery_url",
            props.discovery_url.clone().unwrap_or_default(),
        );
        set(
            &mut out,
            "workspace_id",
            props.workspace_id.clone().unwrap_or_default(),
        );
        out.insert(
            "managed_network".to_string(),
            flatten_managed_network(props.managed_network.as_ref()),
        );
        out.insert(
            "encryption".to_string(),
            flatten_encryption(props.encryption.as_ref())
                .map_err(|e| parse_error(format!("flattening `encryption`: {}", e)))?,
        );

        Ok(Some(out))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        identifier: &str,
        from: &Attributes,
        to: &Attributes,
    ) -> ProviderResult<()> {
        let id = WorkspaceId::parse(identifier).map_err(parse_error)?;
        let a = Attrs::new(to);
        let client = ctx.resource_client::<Workspace>(API_VERSION);

        let mut payload = client
            .get(&id.id())
            .await
            .map_err(|e| api_error(format!("retrieving {}", id), e))?;
        let mut props = payload
            .properties
            .take()
            .ok_or_else(|| ProviderError::new(format!("retrieving {}: `properties` was nil", id)))?;

        if has_change(from, to, "application_insights_id") {
            props.application_insights = optional_id(
                a,
                "application_insights_id",
                ApplicationInsightsId::parse,
                ApplicationInsightsId::id,
            )?;
        }
        if has_change(from, to, "container_registry_id") {
            props.container_registry = optional_id(
                a,
                "container_registry_id",
                ContainerRegistryId::parse,
                ContainerRegistryId::id,
            )?;
        }
        if has_change(from, to, "public_network_access") {
            props.public_network_access = a.str("public_network_access").map(str::to_string);
        }
        if has_change(from, to, "description") {
            props.description = Some(a.string("description"));
        }
        if has_change(from, to, "friendly_name") {
            props.friendly_name = Some(a.string("friendly_name"));
        }
        if has_change(from, to, "identity") {
            payload.identity = expand_identity(a.block("identity"))
                .map_err(|e| parse_error(format!("expanding `identity`: {}", e)))?;
        }
        if has_change(from, to, "primary_user_assigned_identity") {
            props.primary_user_assigned_identity = optional_id(
                a,
                "primary_user_assigned_identity",
                UserAssignedIdentityId::parse,
                UserAssignedIdentityId::id,
            )?;
        }
        if has_change(from, to, "managed_network") {
            props.managed_network = expand_managed_network(a.block("managed_network"));
        }
        if has_change(from, to, "tags") {
            payload.tags = Some(a.string_map("tags"));
        }

        payload.properties = Some(props);
        client
            .create_or_update_then_poll(&id.id(), &payload)
            .await
            .map_err(|e| api_error(format!("updating {}", id), e))
    }

    async fn delete(&self, ctx: &ProviderContext, identifier: &str) -> ProviderResult<()> {
        let id = WorkspaceId::parse(identifier).map_err(parse_error)?;
        let options = DeleteOptions {
            force_to_purge: ctx
                .features
                .machine_learning
                .purge_soft_deleted_workspace_on_destroy
                .then_some(true),
        };
        ctx.resource_client::<Workspace>(API_VERSION)
            .delete_then_poll_with(&id.id(), &options)
            .await
            .map_err(|e| api_error(format!("deleting {}", id), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MemoryArmClient, Method};
    use crate::resources::{Features, MachineLearningFeatures};
    use crate::utils::SYSTEM_ASSIGNED;
    use serde_json::json;
    use std::sync::Arc;

    const SUB: &str = "00000000-0000-0000-0000-000000000000";
    const RG: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/ml";

    fn config() -> Attributes {
        let mut identity = Attributes::new();
        set(&mut identity, "type", SYSTEM_ASSIGNED);

        let mut attrs = Attributes::new();
        set(&mut attrs, "name", "hub1");
        set(&mut attrs, "resource_group_name", "ml");
        set(&mut attrs, "location", "West Europe");
        set(
            &mut attrs,
            "key_vault_id",
            format!("{}/providers/Microsoft.KeyVault/vaults/kv1", RG),
        );
        set(
            &mut attrs,
            "storage_account_id",
            format!("{}/providers/Microsoft.Storage/storageAccounts/sa1", RG),
        );
        set(&mut attrs, "public_network_access", "Enabled");
        attrs.insert("identity".to_string(), blocks(vec![identity]));
        attrs
    }

    fn hub_id() -> String {
        format!(
            "{}/providers/Microsoft.MachineLearningServices/workspaces/hub1",
            RG
        )
    }

    #[tokio::test]
    async fn create_sends_hub_payload() {
        let arm = Arc::new(MemoryArmClient::new());
        let ctx = ProviderContext::new(arm.clone(), SUB);

        let id = AiFoundryResource.create(&ctx, &config()).await.unwrap();
        assert_eq!(id, hub_id());

        let body = arm.requests_with(Method::Put)[0].body.clone().unwrap();
        assert_eq!(body["kind"], "Hub");
        assert_eq!(body["location"], "westeurope");
        assert_eq!(body["identity"], json!({"type": "SystemAssigned"}));
        assert_eq!(
            body["properties"],
            json!({
                "keyVault": format!("{}/providers/Microsoft.KeyVault/vaults/kv1", RG),
                "storageAccount": format!("{}/providers/Microsoft.Storage/storageAccounts/sa1", RG),
                "publicNetworkAccess": "Enabled"
            })
        );
    }

    #[tokio::test]
    async fn read_flattens_hub() {
        let arm = Arc::new(MemoryArmClient::new());
        let ctx = ProviderContext::new(arm.clone(), SUB);
        arm.on_put(|_, body| {
            body["identity"]["principalId"] = json!("principal");
            body["identity"]["tenantId"] = json!("tenant");
            body["properties"]["discoveryUrl"] = json!("https://westeurope.api.azureml.ms/discovery");
            body["properties"]["hbiWorkspace"] = json!(false);
            body["properties"]["managedNetwork"] = json!({"isolationMode": "Disabled", "status": {}});
        });

        let id = AiFoundryResource.create(&ctx, &config()).await.unwrap();
        let state = AiFoundryResource.read(&ctx, &id, None).await.unwrap().unwrap();

        assert_eq!(state["location"], Value::string("westeurope"));
        assert_eq!(
            state["discovery_url"],
            Value::string("https://westeurope.api.azureml.ms/discovery")
        );
        assert_eq!(state["encryption"], Value::empty_list());
        let Value::List(network) = &state["managed_network"] else {
            panic!("expected managed_network block");
        };
        assert_eq!(network.len(), 1);
        let Value::List(identity) = &state["identity"] else {
            panic!("expected identity block");
        };
        let Value::Map(identity) = &identity[0] else {
            panic!("expected identity map");
        };
        assert_eq!(identity["principal_id"], Value::string("principal"));
    }

    #[tokio::test]
    async fn update_keeps_unknown_fields() {
        let arm = Arc::new(MemoryArmClient::new());
        let ctx = ProviderContext::new(arm.clone(), SUB);
        arm.on_put(|_, body| {
            body["sku"] = json!({"name": "Basic", "tier": "Basic"});
        });

        let from = config();
        let id = AiFoundryResource.create(&ctx, &from).await.unwrap();
        let mut to = from.clone();
        set(&mut to, "friendly_name", "Research hub");
        AiFoundryResource.update(&ctx, &id, &from, &to).await.unwrap();

        let put = &arm.requests_with(Method::Put)[1];
        let body = put.body.as_ref().unwrap();
        assert_eq!(body["properties"]["friendlyName"], "Research hub");
        assert_eq!(body["sku"]["name"], "Basic");
    }

    #[tokio::test]
    async fn import_rejects_non_hub_workspaces() {
        let arm = Arc::new(MemoryArmClient::new());
        let ctx = ProviderContext::new(arm.clone(), SUB);
        arm.insert(&hub_id(), json!({"kind": "Default", "properties": {}}));

        let err = AiFoundryResource
            .import_check(&ctx, &hub_id())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not of kind `Hub`, got `Default`"));

        arm.insert(&hub_id(), json!({"kind": "hub", "properties": {}}));
        assert!(AiFoundryResource.import_check(&ctx, &hub_id()).await.is_ok());
    }

    #[tokio::test]
    async fn delete_purges_when_enabled() {
        let arm = Arc::new(MemoryArmClient::new());
        let ctx = ProviderContext::new(arm.clone(), SUB).with_features(Features {
            machine_learning: MachineLearningFeatures {
                purge_soft_deleted_workspace_on_destroy: true,
            },
        });

        AiFoundryResource.delete(&ctx, &hub_id()).await.unwrap();
        let delete = &arm.requests_with(Method::Delete)[0];
        assert_eq!(
            delete.query,
            vec![("forceToPurge".to_string(), "true".to_string())]
        );
    }

    #[tokio::test]
    async fn delete_without_purge_sends_no_query() {
        let arm = Arc::new(MemoryArmClient::new());
        let ctx = ProviderContext::new(arm.clone(), SUB);

        AiFoundryResource.delete(&ctx, &hub_id()).await.unwrap();
        assert!(arm.requests_with(Method::Delete)[0].query.is_empty());
    }

    #[test]
    fn encryption_is_only_flattened_when_enabled() {
        let disabled = EncryptionProperty {
            status: "Disabled".to_string(),
            ..Default::default()
        };
        assert_eq!(
            flatten_encryption(Some(&disabled)).unwrap(),
            Value::empty_list()
        );

        let enabled = EncryptionProperty {
            status: ENCRYPTION_ENABLED.to_string(),
            identity: None,
            key_vault_properties: EncryptionKeyVaultProperties {
                key_vault_arm_id: format!("{}/providers/Microsoft.KeyVault/vaults/kv1", RG),
                key_identifier: "https://kv1.vault.azure.net/keys/cmk/0123".to_string(),
                identity_client_id: None,
            },
        };
        let Value::List(items) = flatten_encryption(Some(&enabled)).unwrap() else {
            panic!("expected a block");
        };
        assert_eq!(items.len(), 1);
    }
}
