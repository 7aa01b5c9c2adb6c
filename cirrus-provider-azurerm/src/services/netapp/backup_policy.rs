use async_trait::async_trait;
use cirrus_core::provider::ProviderResult;
use cirrus_core::resource::Value;
use cirrus_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use cirrus_core::timeouts::{Timeouts, minutes};

use super::API_VERSION;
use super::models::{BackupPolicy, BackupPolicyPatch, BackupPolicyProperties};
use crate::ids::{NetAppAccountId, NetAppBackupPolicyId};
use crate::resources::{
    Attributes, Attrs, AzureResource, ProviderContext, api_error, ensure_absent, get_existing,
    parse_error, set,
};
use crate::utils::{
    expand_tags, flatten_tags, location_schema, normalize_location, resource_group_name_schema,
    tags_schema,
};
use crate::validate;

pub struct BackupPolicyResource;

fn retention(name: &str, min: i64, default: i64) -> AttributeSchema {
    AttributeSchema::new(name, types::int_between(min, 1019)).with_default(Value::Int(default))
}

fn expand_properties(a: Attrs<'_>) -> BackupPolicyProperties {
    BackupPolicyProperties {
        daily_backups_to_keep: a.int("daily_backups_to_keep"),
        weekly_backups_to_keep: a.int("weekly_backups_to_keep"),
        monthly_backups_to_keep: a.int("monthly_backups_to_keep"),
        enabled: Some(a.bool("enabled")),
        provisioning_state: None,
    }
}

#[async_trait]
impl AzureResource for BackupPolicyResource {
    fn resource_type(&self) -> &'static str {
        "netapp_backup_policy"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.resource_type())
            .with_description("Backup retention policy of a NetApp account")
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
            .attribute(retention("daily_backups_to_keep", 2, 2))
            .attribute(retention("weekly_backups_to_keep", 0, 1))
            .attribute(retention("monthly_backups_to_keep", 0, 1))
            .attribute(
                AttributeSchema::new("enabled", AttributeType::Bool)
                    .with_default(Value::Bool(true)),
            )
            .with_timeouts(Timeouts::new(
                minutes(120),
                minutes(5),
                minutes(120),
                minutes(120),
            ))
    }

    fn validate_id(&self, identifier: &str) -> Result<(), String> {
        NetAppBackupPolicyId::validate(identifier)
    }

    async fn create(&self, ctx: &ProviderContext, attrs: &Attributes) -> ProviderResult<String> {
        let a = Attrs::new(attrs);
        let account = NetAppAccountId::new(
            &ctx.subscription_id,
            a.require("resource_group_name")?,
            a.require("account_name")?,
        );
        let id = account.backup_policy(a.require("name")?);

        let _lock = ctx.locks.by_id(&account.id()).await;
        let client = ctx.resource_client::<BackupPolicy>(API_VERSION);
        ensure_absent(&client, &id.id()).await?;

        let policy = BackupPolicy {
            location: Some(normalize_location(a.require("location")?)),
            tags: expand_tags(a),
            properties: expand_properties(a),
            ..Default::default()
        };
        client
            .create_or_update_then_poll(&id.id(), &policy)
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
        let id = NetAppBackupPolicyId::parse(identifier).map_err(parse_error)?;
        let client = ctx.resource_client::<BackupPolicy>(API_VERSION);
        let Some(policy) = get_existing(&client, &id.id(), &id).await? else {
            return Ok(None);
        };

        let props = &policy.properties;
        let mut out = Attributes::new();
        set(&mut out, "name", id.backup_policy_name.as_str());
        set(&mut out, "resource_group_name", id.resource_group_name.as_str());
        set(&mut out, "account_name", id.net_app_account_name.as_str());
        set(
            &mut out,
            "location",
            normalize_location(policy.location.as_deref().unwrap_or_default()),
        );
        out.insert("tags".to_string(), flatten_tags(policy.tags.as_ref()));
        set(
            &mut out,
            "daily_backups_to_keep",
            props.daily_backups_to_keep.unwrap_or_default(),
        );
        set(
            &mut out,
            "weekly_backups_to_keep",
            props.weekly_backups_to_keep.unwrap_or_default(),
        );
        set(
            &mut out,
            "monthly_backups_to_keep",
            props.monthly_backups_to_keep.unwrap_or_default(),
        );
        set(&mut out, "enabled", props.enabled.unwrap_or_default());
        Ok(Some(out))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        identifier: &str,
        _from: &Attributes,
        to: &Attributes,
    ) -> ProviderResult<()> {
        let id = NetAppBackupPolicyId::parse(identifier).map_err(parse_error)?;
        let _lock = ctx.locks.by_id(&id.account_id().id()).await;

        let a = Attrs::new(to);
        let patch = BackupPolicyPatch {
            tags: Some(a.string_map("tags")),
            properties: expand_properties(a),
        };
        ctx.resource_client::<BackupPolicy>(API_VERSION)
            .update_then_poll(&id.id(), &patch)
            .await
            .map_err(|e| api_error(format!("updating {}", id), e))
    }

    async fn delete(&self, ctx: &ProviderContext, identifier: &str) -> ProviderResult<()> {
        let id = NetAppBackupPolicyId::parse(identifier).map_err(parse_error)?;
        let _lock = ctx.locks.by_id(&id.account_id().id()).await;
        let client = ctx.resource_client::<BackupPolicy>(API_VERSION);
        match client.delete_then_poll(&id.id()).await {
            Err(e) if !e.was_not_found() => Err(api_error(format!("deleting {}", id), e)),
            _ => Ok(()),
        }
    }
}
