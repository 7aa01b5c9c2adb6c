use async_trait::async_trait;
use cirrus_core::provider::ProviderResult;
use cirrus_core::schema::{AttributeSchema, ResourceSchema};
use cirrus_core::timeouts::{Timeouts, minutes};

use super::API_VERSION;
use super::models::{BackupVault, BackupVaultPatch};
use crate::ids::{NetAppAccountId, NetAppBackupVaultId};
use crate::resources::{
    Attributes, Attrs, AzureResource, ProviderContext, api_error, ensure_absent, get_existing,
    parse_error, set,
};
use crate::utils::{
    expand_tags, flatten_tags, location_schema, normalize_location, resource_group_name_schema,
    tags_schema,
};
use crate::validate;

pub struct BackupVaultResource;

#[async_trait]
impl AzureResource for BackupVaultResource {
    fn resource_type(&self) -> &'static str {
        "netapp_backup_vault"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.resource_type())
            .with_description("Backup vault of a NetApp account")
            .attribute(
                AttributeSchema::new("name", validate::netapp_name())
                    .required()
                    .force_new(),
            )
            .attribute(resource_group_name_schema())
            .attribute(location_schema())
            .attribute(
                AttributeSchema::new("account_name", validate::netapp_name())
                    .required()
                    .force_new(),
            )
            .attribute(tags_schema())
            .with_timeouts(Timeouts::new(
                minutes(120),
                minutes(5),
                minutes(120),
                minutes(120),
            ))
    }

    fn validate_id(&self, identifier: &str) -> Result<(), String> {
        NetAppBackupVaultId::validate(identifier)
    }

    async fn create(&self, ctx: &ProviderContext, attrs: &Attributes) -> ProviderResult<String> {
        let a = Attrs::new(attrs);
        let account = NetAppAccountId::new(
            &ctx.subscription_id,
            a.require("resource_group_name")?,
            a.require("account_name")?,
        );
        let id = account.backup_vault(a.require("name")?);

        let _lock = ctx.locks.by_id(&account.id()).await;
        let client = ctx.resource_client::<BackupVault>(API_VERSION);
        ensure_absent(&client, &id.id()).await?;

        let vault = BackupVault {
            location: Some(normalize_location(a.require("location")?)),
            tags: expand_tags(a),
            ..Default::default()
        };
        client
            .create_or_update_then_poll(&id.id(), &vault)
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
        let id = NetAppBackupVaultId::parse(identifier).map_err(parse_error)?;
        let client = ctx.resource_client::<BackupVault>(API_VERSION);
        let Some(vault) = get_existing(&client, &id.id(), &id).await? else {
            return Ok(None);
        };

        let mut out = Attributes::new();
        set(&mut out, "name", id.backup_vault_name.as_str());
        set(&mut out, "resource_group_name", id.resource_group_name.as_str());
        set(&mut out, "account_name", id.net_app_account_name.as_str());
        set(
            &mut out,
            "location",
            normalize_location(vault.location.as_deref().unwrap_or_default()),
        );
        out.insert("tags".to_string(), flatten_tags(vault.tags.as_ref()));
        Ok(Some(out))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        identifier: &str,
        _from: &Attributes,
        to: &Attributes,
    ) -> ProviderResult<()> {
        let id = NetAppBackupVaultId::parse(identifier).map_err(parse_error)?;
        let _lock = ctx.locks.by_id(&id.account_id().id()).await;

        let patch = BackupVaultPatch {
            tags: Attrs::new(to).string_map("tags"),
        };
        ctx.resource_client::<BackupVault>(API_VERSION)
            .update_then_poll(&id.id(), &patch)
            .await
            .map_err(|e| api_error(format!("updating {}", id), e))
    }

    async fn delete(&self, ctx: &ProviderContext, identifier: &str) -> ProviderResult<()> {
        let id = NetAppBackupVaultId::parse(identifier).map_err(parse_error)?;
        let _lock = ctx.locks.by_id(&id.account_id().id()).await;
        let client = ctx.resource_client::<BackupVault>(API_VERSION);
        match client.delete_then_poll(&id.id()).await {
            Err(e) if !e.was_not_found() => Err(api_error(format!("deleting {}", id), e)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MemoryArmClient, Method};
    use cirrus_core::resource::Value;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn config() -> Attributes {
        let mut attrs = Attributes::new();
        set(&mut attrs, "name", "vault1");
        set(&mut attrs, "resource_group_name", "anf");
        set(&mut attrs, "location", "West Europe");
        set(&mut attrs, "account_name", "account1");
        attrs
    }

    #[tokio::test]
    async fn lifecycle() {
        let arm = Arc::new(MemoryArmClient::new());
        let ctx = ProviderContext::new(arm.clone(), "00000000-0000-0000-0000-000000000000");

        let from = config();
        let id = BackupVaultResource.create(&ctx, &from).await.unwrap();
        assert!(id.ends_with("/netAppAccounts/account1/backupVaults/vault1"));
        assert_eq!(
            arm.requests_with(Method::Put)[0].body,
            Some(json!({"location": "westeurope", "properties": {}}))
        );

        let mut to = from.clone();
        to.insert(
            "tags".to_string(),
            Value::Map(HashMap::from([("env".to_string(), Value::string("prod"))])),
        );
        BackupVaultResource.update(&ctx, &id, &from, &to).await.unwrap();

        let state = BackupVaultResource.read(&ctx, &id, None).await.unwrap().unwrap();
        assert_eq!(state["location"], Value::string("westeurope"));
        assert_eq!(state["tags"], to["tags"]);

        BackupVaultResource.delete(&ctx, &id).await.unwrap();
        assert!(BackupVaultResource.read(&ctx, &id, None).await.unwrap().is_none());
    }
}
