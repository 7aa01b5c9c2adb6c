//! Customer managed key of a Log Analytics cluster
//!
//! The key lives inside the cluster's `keyVaultProperties`, so this resource
//! reads the whole cluster, swaps the key and writes the cluster back. Its
//! identifier is the cluster ID.

use std::time::Duration;

use async_trait::async_trait;
use cirrus_core::provider::{ProviderError, ProviderResult};
use cirrus_core::schema::{AttributeSchema, ResourceSchema, types};
use cirrus_core::timeouts::{Timeouts, hours, minutes};
use tracing::{debug, info};

use super::API_VERSION;
use super::migration::ClusterCustomerManagedKeyV0ToV1;
use super::models::{Cluster, ClusterProperties, KeyVaultProperties};
use crate::client::{ArmError, ResourceClient};
use crate::ids::{LogAnalyticsClusterId, NestedItemId, NestedItemType, VersionType, id_type};
use crate::resources::{
    Attributes, Attrs, AzureResource, ProviderContext, StateUpgrader, api_error, parse_error, set,
};

const POLL_INTERVAL: Duration = Duration::from_secs(30);

pub struct ClusterCustomerManagedKeyResource;

fn key_properties(key_id: &str) -> ProviderResult<KeyVaultProperties> {
    let key = NestedItemId::parse(key_id, VersionType::Optional)
        .map_err(|e| parse_error(format!("parsing Key Vault Key ID: {}", e)))?;
    Ok(KeyVaultProperties {
        key_vault_uri: Some(key.key_vault_base_url),
        key_name: Some(key.name),
        key_version: Some(key.version),
    })
}

/// Fetch the cluster, failing when it or its properties are missing
async fn get_cluster(
    client: &ResourceClient<Cluster>,
    id: &LogAnalyticsClusterId,
) -> ProviderResult<(Cluster, ClusterProperties)> {
    let mut cluster = client.get(&id.id()).await.map_err(|e| {
        if e.was_not_found() {
            ProviderError::not_found(format!("{} was not found", id))
        } else {
            api_error(format!("retrieving {}", id), e)
        }
    })?;
    let props = cluster.properties.take().ok_or_else(|| {
        ProviderError::new(format!("retrieving {}: `properties` was nil", id))
    })?;
    Ok((cluster, props))
}

/// Write the cluster back with new key properties
async fn put_key(
    client: &ResourceClient<Cluster>,
    id: &LogAnalyticsClusterId,
    mut cluster: Cluster,
    mut props: ClusterProperties,
    key: KeyVaultProperties,
) -> Result<(), ArmError> {
    props.associated_workspaces = None;
    props.provisioning_state = None;
    props.key_vault_properties = Some(key);
    cluster.properties = Some(props);
    client.create_or_update_then_poll(&id.id(), &cluster).await
}

/// Wait until the cluster has left its transitional provisioning states
async fn wait_for_cluster(
    client: &ResourceClient<Cluster>,
    id: &LogAnalyticsClusterId,
) -> ProviderResult<()> {
    loop {
        let cluster = client
            .get(&id.id())
            .await
            .map_err(|e| api_error(format!("polling {}", id), e))?;
        let state = cluster
            .properties
            .and_then(|p| p.provisioning_state)
            .unwrap_or_default();
        match state.as_str() {
            "Updating" | "Creating" | "ProvisioningAccount" => {
                debug!("{} is {}, waiting", id, state);
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            "Failed" | "Canceled" => {
                return Err(ProviderError::new(format!(
                    "waiting for {} to finish adding the Customer Managed Key: provisioning state {}",
                    id, state
                )));
            }
            _ => return Ok(()),
        }
    }
}

#[async_trait]
impl AzureResource for ClusterCustomerManagedKeyResource {
    fn resource_type(&self) -> &'static str {
        "log_analytics_cluster_customer_managed_key"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.resource_type())
            .with_description("Customer managed key of a Log Analytics cluster")
            .with_version(1)
            .attribute(
                AttributeSchema::new("log_analytics_cluster_id", id_type::<LogAnalyticsClusterId>())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new(
                    "key_vault_key_id",
                    types::string_with("KeyVaultKeyId", NestedItemId::validate_optional_version),
                )
                .required(),
            )
            .with_timeouts(Timeouts::new(hours(6), minutes(5), hours(6), minutes(30)))
    }

    fn validate_id(&self, identifier: &str) -> Result<(), String> {
        LogAnalyticsClusterId::validate(identifier)
    }

    async fn create(&self, ctx: &ProviderContext, attrs: &Attributes) -> ProviderResult<String> {
        let a = Attrs::new(attrs);
        let id = LogAnalyticsClusterId::parse(a.require("log_analytics_cluster_id")?)
            .map_err(parse_error)?;

        let _lock = ctx.locks.by_id(&id.id()).await;
        let client = ctx.resource_client::<Cluster>(API_VERSION);
        let (cluster, props) = get_cluster(&client, &id).await?;

        if props
            .key_vault_properties
            .as_ref()
            .is_some_and(KeyVaultProperties::has_key)
        {
            return Err(ProviderError::already_exists(id.id()));
        }

        let key = key_properties(a.require("key_vault_key_id")?)?;
        put_key(&client, &id, cluster, props, key)
            .await
            .map_err(|e| api_error(format!("creating Customer Managed Key for {}", id), e))?;
        wait_for_cluster(&client, &id).await?;

        Ok(id.id())
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        identifier: &str,
        _prior: Option<&Attributes>,
    ) -> ProviderResult<Option<Attributes>> {
        let id = LogAnalyticsClusterId::parse(identifier).map_err(parse_error)?;
        let client = ctx.resource_client::<Cluster>(API_VERSION);
        let cluster = match client.get(&id.id()).await {
            Ok(cluster) => cluster,
            Err(e) if e.was_not_found() => {
                info!("{} does not exist - removing from state", id);
                return Ok(None);
            }
            Err(e) => return Err(api_error(format!("retrieving {}", id), e)),
        };

        let key = cluster
            .properties
            .and_then(|p| p.key_vault_properties)
            .unwrap_or_default();
        let uri = key.key_vault_uri.unwrap_or_default();
        let name = key.key_name.unwrap_or_default();
        if uri.is_empty() || name.is_empty() {
            debug!("{} has no Customer Managed Key - removing from state", id);
            return Ok(None);
        }
        let key_id = NestedItemId::new(
            &uri,
            NestedItemType::Key,
            name,
            key.key_version.unwrap_or_default(),
        )
        .map_err(parse_error)?;

        let mut out = Attributes::new();
        set(&mut out, "log_analytics_cluster_id", id.id());
        set(&mut out, "key_vault_key_id", key_id.id());
        Ok(Some(out))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        identifier: &str,
        _from: &Attributes,
        to: &Attributes,
    ) -> ProviderResult<()> {
        let id = LogAnalyticsClusterId::parse(identifier).map_err(parse_error)?;
        let key = key_properties(Attrs::new(to).require("key_vault_key_id")?)?;

        let _lock = ctx.locks.by_id(&id.id()).await;
        let client = ctx.resource_client::<Cluster>(API_VERSION);
        let (cluster, props) = get_cluster(&client, &id).await?;
        put_key(&client, &id, cluster, props, key)
            .await
            .map_err(|e| api_error(format!("updating Customer Managed Key for {}", id), e))
    }

    async fn delete(&self, ctx: &ProviderContext, identifier: &str) -> ProviderResult<()> {
        let id = LogAnalyticsClusterId::parse(identifier).map_err(parse_error)?;

        let _lock = ctx.locks.by_id(&id.id()).await;
        let client = ctx.resource_client::<Cluster>(API_VERSION);
        let (cluster, props) = get_cluster(&client, &id).await?;

        if !props
            .key_vault_properties
            .as_ref()
            .is_some_and(KeyVaultProperties::has_key)
        {
            return Err(ProviderError::new(format!(
                "deleting the Customer Managed Key of {}: no customer managed key exists",
                id
            )));
        }

        let cleared = KeyVaultProperties {
            key_vault_uri: Some(String::new()),
            key_name: Some(String::new()),
            key_version: Some(String::new()),
        };
        put_key(&client, &id, cluster, props, cleared)
            .await
            .map_err(|e| api_error(format!("deleting Customer Managed Key from {}", id), e))
    }

    fn state_upgraders(&self) -> Vec<Box<dyn StateUpgrader>> {
        vec![Box::new(ClusterCustomerManagedKeyV0ToV1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MemoryArmClient, Method};
    use cirrus_core::provider::ErrorKind;
    use cirrus_core::resource::Value;
    use serde_json::json;
    use std::sync::Arc;

    const CLUSTER: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/logs/providers/Microsoft.OperationalInsights/clusters/cluster1";
    const KEY: &str = "https://vault1.vault.azure.net/keys/cmk/0123456789";

    fn setup() -> (Arc<MemoryArmClient>, ProviderContext) {
        let arm = Arc::new(MemoryArmClient::new());
        arm.insert(
            CLUSTER,
            json!({
                "location": "westeurope",
                "identity": {"type": "SystemAssigned"},
                "sku": {"name": "CapacityReservation", "capacity": 100},
                "properties": {
                    "provisioningState": "Succeeded",
                    "billingType": "Cluster",
                    "associatedWorkspaces": [{"workspaceName": "ws1"}]
                }
            }),
        );
        let ctx = ProviderContext::new(arm.clone(), "00000000-0000-0000-0000-000000000000");
        (arm, ctx)
    }

    fn config(key: &str) -> Attributes {
        let mut attrs = Attributes::new();
        set(&mut attrs, "log_analytics_cluster_id", CLUSTER);
        set(&mut attrs, "key_vault_key_id", key);
        attrs
    }

    #[tokio::test]
    async fn create_writes_key_and_keeps_other_cluster_fields() {
        let (arm, ctx) = setup();
        let resource = ClusterCustomerManagedKeyResource;

        let id = resource.create(&ctx, &config(KEY)).await.unwrap();
        assert_eq!(id, CLUSTER);

        let body = arm.requests_with(Method::Put)[0].body.clone().unwrap();
        assert_eq!(body["sku"]["capacity"], 100);
        assert_eq!(body["properties"]["billingType"], "Cluster");
        assert!(body["properties"].get("associatedWorkspaces").is_none());
        assert_eq!(
            body["properties"]["keyVaultProperties"],
            json!({
                "keyVaultUri": "https://vault1.vault.azure.net/",
                "keyName": "cmk",
                "keyVersion": "0123456789"
            })
        );

        let state = resource.read(&ctx, &id, None).await.unwrap().unwrap();
        assert_eq!(state["key_vault_key_id"], Value::string(KEY));
    }

    #[tokio::test]
    async fn create_fails_when_key_already_set() {
        let (_arm, ctx) = setup();
        let resource = ClusterCustomerManagedKeyResource;
        resource.create(&ctx, &config(KEY)).await.unwrap();

        let err = resource.create(&ctx, &config(KEY)).await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn create_fails_for_missing_cluster() {
        let arm = Arc::new(MemoryArmClient::new());
        let ctx = ProviderContext::new(arm, "00000000-0000-0000-0000-000000000000");
        let err = ClusterCustomerManagedKeyResource
            .create(&ctx, &config(KEY))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("was not found"));
    }

    #[tokio::test]
    async fn versionless_key_round_trips() {
        let (_arm, ctx) = setup();
        let resource = ClusterCustomerManagedKeyResource;
        let key = "https://vault1.vault.azure.net/keys/cmk";

        let id = resource.create(&ctx, &config(key)).await.unwrap();
        let state = resource.read(&ctx, &id, None).await.unwrap().unwrap();
        assert_eq!(state["key_vault_key_id"], Value::string(key));
    }

    #[tokio::test]
    async fn delete_clears_key_and_read_drops_state() {
        let (arm, ctx) = setup();
        let resource = ClusterCustomerManagedKeyResource;
        let id = resource.create(&ctx, &config(KEY)).await.unwrap();

        resource.delete(&ctx, &id).await.unwrap();
        let stored = arm.resource(CLUSTER).unwrap();
        assert_eq!(stored["properties"]["keyVaultProperties"]["keyName"], "");
        assert!(resource.read(&ctx, &id, None).await.unwrap().is_none());

        assert!(resource.delete(&ctx, &id).await.is_err());
    }
}
