use async_trait::async_trait;
use cirrus_core::provider::ProviderResult;
use cirrus_core::resource::Value;
use cirrus_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::API_VERSION;
use super::models::{Datastore, DatastoreCredentials, DatastoreProperties, ServicePrincipalSecrets};
use crate::ids::{DataStoreId, StorageContainerId, WorkspaceId, id_type};
use crate::resources::{
    Attributes, Attrs, AzureResource, ProviderContext, api_error, ensure_absent, get_existing,
    parse_error, set,
};
use crate::utils::{expand_tags, flatten_tags};
use crate::validate;

const DATASTORE_TYPE: &str = "AzureDataLakeGen2";

pub struct DatastoreDataLakeGen2Resource;

fn expand(a: Attrs<'_>, container: &StorageContainerId) -> Datastore {
    let credentials = match a.str("client_id") {
        Some(client_id) => DatastoreCredentials::ServicePrincipal {
            tenant_id: a.string("tenant_id"),
            client_id: client_id.to_string(),
            authority_url: a.str("authority_url").map(str::to_string),
            secrets: Some(ServicePrincipalSecrets::ServicePrincipal {
                client_secret: a.string("client_secret"),
            }),
        },
        None => DatastoreCredentials::None,
    };

    Datastore {
        id: None,
        name: None,
        properties: DatastoreProperties {
            datastore_type: DATASTORE_TYPE.to_string(),
            account_name: container.storage_account_name.clone(),
            filesystem: container.container_name.clone(),
            subscription_id: Some(container.subscription_id.clone()),
            resource_group: Some(container.resource_group_name.clone()),
            service_data_access_auth_identity: a
                .str("service_data_identity")
                .map(str::to_string),
            description: a.str("description").map(str::to_string),
            tags: expand_tags(a),
            credentials,
            is_default: None,
        },
    }
}

impl DatastoreDataLakeGen2Resource {
    async fn put(
        &self,
        ctx: &ProviderContext,
        attrs: &Attributes,
        create: bool,
    ) -> ProviderResult<String> {
        let a = Attrs::new(attrs);
        let workspace = WorkspaceId::parse(a.require("workspace_id")?).map_err(parse_error)?;
        let container = StorageContainerId::parse(a.require("storage_container_id")?)
            .map_err(parse_error)?;
        let id = workspace.data_store(a.require("name")?);

        let client = ctx.resource_client::<Datastore>(API_VERSION);
        if create {
            ensure_absent(&client, &id.id()).await?;
        }

        let action = if create { "creating" } else { "updating" };
        client
            .create_or_update(&id.id(), &expand(a, &container))
            .await
            .map_err(|e| api_error(format!("{} {}", action, id), e))?;
        Ok(id.id())
    }
}

#[async_trait]
impl AzureResource for DatastoreDataLakeGen2Resource {
    fn resource_type(&self) -> &'static str {
        "machine_learning_datastore_datalake_gen2"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.resource_type())
            .with_description("Machine Learning datastore backed by a Data Lake Gen2 container")
            .attribute(
                AttributeSchema::new("name", validate::data_store_name())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("workspace_id", id_type::<WorkspaceId>())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("storage_container_id", id_type::<StorageContainerId>())
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("tenant_id", types::uuid()))
            .attribute(
                AttributeSchema::new("client_id", types::uuid()).required_with(&["client_secret"]),
            )
            .attribute(
                AttributeSchema::new("client_secret", types::string_not_empty())
                    .sensitive()
                    .required_with(&["client_id"]),
            )
            .attribute(AttributeSchema::new("authority_url", types::string_not_empty()))
            .attribute(AttributeSchema::new("description", AttributeType::String).force_new())
            .attribute(
                AttributeSchema::new(
                    "service_data_identity",
                    AttributeType::enumeration(&[
                        "None",
                        "WorkspaceSystemAssignedIdentity",
                        "WorkspaceUserAssignedIdentity",
                    ]),
                )
                .with_default(Value::string("None")),
            )
            .attribute(AttributeSchema::new("tags", types::tags()).force_new())
            .attribute(AttributeSchema::new("is_default", AttributeType::Bool).read_only())
    }

    fn validate_id(&self, identifier: &str) -> Result<(), String> {
        DataStoreId::validate(identifier)
    }

    async fn create(&self, ctx: &ProviderContext, attrs: &Attributes) -> ProviderResult<String> {
        self.put(ctx, attrs, true).await
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        identifier: &str,
        prior: Option<&Attributes>,
    ) -> ProviderResult<Option<Attributes>> {
        let id = DataStoreId::parse(identifier).map_err(parse_error)?;
        let client = ctx.resource_client::<Datastore>(API_VERSION);
        let Some(datastore) = get_existing(&client, &id.id(), &id).await? else {
            return Ok(None);
        };

        let props = datastore.properties;
        let workspace = id.workspace_id();
        // the storage account may live in another subscription
        let container = StorageContainerId::new(
            props
                .subscription_id
                .as_deref()
                .unwrap_or(&workspace.subscription_id),
            props
                .resource_group
                .as_deref()
                .unwrap_or(&workspace.resource_group_name),
            &props.account_name,
            &props.filesystem,
        );

        let mut out = Attributes::new();
        set(&mut out, "name", id.data_store_name.as_str());
        set(&mut out, "workspace_id", workspace.id());
        set(&mut out, "storage_container_id", container.id());
        set(
            &mut out,
            "service_data_identity",
            props.service_data_access_auth_identity.unwrap_or_default(),
        );
        set(&mut out, "description", props.description.unwrap_or_default());
        set(&mut out, "is_default", props.is_default.unwrap_or_default());
        out.insert("tags".to_string(), flatten_tags(props.tags.as_ref()));

        if let DatastoreCredentials::ServicePrincipal {
            tenant_id,
            client_id,
            authority_url,
            ..
        } = props.credentials
        {
            set(&mut out, "tenant_id", tenant_id);
            set(&mut out, "client_id", client_id);
            set(&mut out, "authority_url", authority_url.unwrap_or_default());
            let secret = prior
                .map(|p| Attrs::new(p).string("client_secret"))
                .unwrap_or_default();
            set(&mut out, "client_secret", secret);
        }

        Ok(Some(out))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        _identifier: &str,
        _from: &Attributes,
        to: &Attributes,
    ) -> ProviderResult<()> {
        self.put(ctx, to, false).await.map(|_| ())
    }

    async fn delete(&self, ctx: &ProviderContext, identifier: &str) -> ProviderResult<()> {
        let id = DataStoreId::parse(identifier).map_err(parse_error)?;
        let client = ctx.resource_client::<Datastore>(API_VERSION);
        match client.delete(&id.id()).await {
            Err(e) if !e.was_not_found() => Err(api_error(format!("deleting {}", id), e)),
            _ => Ok(()),
        }
    }
}
