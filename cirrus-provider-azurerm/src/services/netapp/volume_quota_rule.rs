use async_trait::async_trait;
use cirrus_core::provider::ProviderResult;
use cirrus_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use cirrus_core::timeouts::{Timeouts, minutes};

use super::API_VERSION;
use super::models::{VolumeQuotaRule, VolumeQuotaRulePatch, VolumeQuotaRuleProperties};
use crate::ids::{NetAppVolumeId, VolumeQuotaRuleId, id_type};
use crate::resources::{
    Attributes, Attrs, AzureResource, ProviderContext, api_error, ensure_absent, get_existing,
    parse_error, set,
};
use crate::utils::{location_schema, normalize_location};
use crate::validate;

const QUOTA_TYPES: &[&str] = &[
    "DefaultGroupQuota",
    "DefaultUserQuota",
    "IndividualGroupQuota",
    "IndividualUserQuota",
];

pub struct VolumeQuotaRuleResource;

#[async_trait]
impl AzureResource for VolumeQuotaRuleResource {
    fn resource_type(&self) -> &'static str {
        "netapp_volume_quota_rule"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.resource_type())
            .with_description("User or group quota on a NetApp volume")
            .attribute(
                AttributeSchema::new("name", validate::netapp_name())
                    .required()
                    .force_new(),
            )
            .attribute(location_schema())
            .attribute(
                AttributeSchema::new("volume_id", id_type::<NetAppVolumeId>())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("quota_target", AttributeType::String)
                    .force_new()
                    .with_description("UID, GID or SID, required for individual quotas"),
            )
            .attribute(
                AttributeSchema::new("quota_size_in_kib", types::int_between(4, 4294967295))
                    .required(),
            )
            .attribute(
                AttributeSchema::new("quota_type", AttributeType::enumeration(QUOTA_TYPES))
                    .required()
                    .force_new(),
            )
            .with_timeouts(Timeouts::new(
                minutes(90),
                minutes(5),
                minutes(120),
                minutes(120),
            ))
    }

    fn validate_id(&self, identifier: &str) -> Result<(), String> {
        VolumeQuotaRuleId::validate(identifier)
    }

    fn validate(&self, attrs: &Attributes) -> Result<(), String> {
        let a = Attrs::new(attrs);
        let quota_type = a.string("quota_type");
        match (quota_type.starts_with("Individual"), a.str("quota_target")) {
            (true, None) => Err(format!(
                "`quota_target` is required when `quota_type` is {:?}",
                quota_type
            )),
            (false, Some(_)) => Err(format!(
                "`quota_target` cannot be set when `quota_type` is {:?}",
                quota_type
            )),
            _ => Ok(()),
        }
    }

    async fn create(&self, ctx: &ProviderContext, attrs: &Attributes) -> ProviderResult<String> {
        let a = Attrs::new(attrs);
        let volume = NetAppVolumeId::parse(a.require("volume_id")?).map_err(parse_error)?;
        let id = volume.quota_rule(a.require("name")?);

        let _lock = ctx.locks.by_id(&volume.id()).await;
        let client = ctx.resource_client::<VolumeQuotaRule>(API_VERSION);
        ensure_absent(&client, &id.id()).await?;

        let rule = VolumeQuotaRule {
            location: Some(normalize_location(a.require("location")?)),
            properties: VolumeQuotaRuleProperties {
                quota_size_in_kibs: a.int("quota_size_in_kib"),
                quota_type: a.str("quota_type").map(str::to_string),
                quota_target: a.str("quota_target").map(str::to_string),
                provisioning_state: None,
            },
            ..Default::default()
        };
        client
            .create_or_update_then_poll(&id.id(), &rule)
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
        let id = VolumeQuotaRuleId::parse(identifier).map_err(parse_error)?;
        let client = ctx.resource_client::<VolumeQuotaRule>(API_VERSION);
        let Some(rule) = get_existing(&client, &id.id(), &id).await? else {
            return Ok(None);
        };

        let props = rule.properties;
        let mut out = Attributes::new();
        set(&mut out, "name", id.volume_quota_rule_name.as_str());
        set(&mut out, "volume_id", id.volume_id().id());
        set(
            &mut out,
            "location",
            normalize_location(rule.location.as_deref().unwrap_or_default()),
        );
        set(&mut out, "quota_target", props.quota_target.unwrap_or_default());
        set(
            &mut out,
            "quota_size_in_kib",
            props.quota_size_in_kibs.unwrap_or_default(),
        );
        set(&mut out, "quota_type", props.quota_type.unwrap_or_default());
        Ok(Some(out))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        identifier: &str,
        _from: &Attributes,
        to: &Attributes,
    ) -> ProviderResult<()> {
        let id = VolumeQuotaRuleId::parse(identifier).map_err(parse_error)?;
        let _lock = ctx.locks.by_id(&id.volume_id().id()).await;

        let patch = VolumeQuotaRulePatch {
            properties: VolumeQuotaRuleProperties {
                quota_size_in_kibs: Attrs::new(to).int("quota_size_in_kib"),
                ..Default::default()
            },
        };
        ctx.resource_client::<VolumeQuotaRule>(API_VERSION)
            .update_then_poll(&id.id(), &patch)
            .await
            .map_err(|e| api_error(format!("updating {}", id), e))
    }

    async fn delete(&self, ctx: &ProviderContext, identifier: &str) -> ProviderResult<()> {
        let id = VolumeQuotaRuleId::parse(identifier).map_err(parse_error)?;
        let _lock = ctx.locks.by_id(&id.volume_id().id()).await;
        let client = ctx.resource_client::<VolumeQuotaRule>(API_VERSION);
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
    use std::sync::Arc;

    const VOLUME: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/anf/providers/Microsoft.NetApp/netAppAccounts/account1/capacityPools/pool1/volumes/vol1";

    fn config(quota_type: &str, target: Option<&str>) -> Attributes {
        let mut attrs = Attributes::new();
        set(&mut attrs, "name", "rule1");
        set(&mut attrs, "location", "westeurope");
        set(&mut attrs, "volume_id", VOLUME);
        set(&mut attrs, "quota_size_in_kib", 2048);
        set(&mut attrs, "quota_type", quota_type);
        if let Some(target) = target {
            set(&mut attrs, "quota_target", target);
        }
        attrs
    }

    #[test]
    fn quota_target_depends_on_quota_type() {
        let r = VolumeQuotaRuleResource;
        assert!(r.validate(&config("IndividualUserQuota", Some("3001"))).is_ok());
        assert!(r.validate(&config("IndividualGroupQuota", None)).is_err());
        assert!(r.validate(&config("DefaultUserQuota", None)).is_ok());
        assert!(r.validate(&config("DefaultGroupQuota", Some("2001"))).is_err());
    }

    #[test]
    fn quota_size_upper_bound() {
        let schema = VolumeQuotaRuleResource.schema();
        let mut attrs = config("DefaultUserQuota", None);
        set(&mut attrs, "quota_size_in_kib", 4294967295i64);
        assert!(schema.validate(&attrs).is_ok());
        set(&mut attrs, "quota_size_in_kib", 4294967296i64);
        assert!(schema.validate(&attrs).is_err());
    }

    #[tokio::test]
    async fn create_and_resize() {
        let arm = Arc::new(MemoryArmClient::new());
        let ctx = ProviderContext::new(arm.clone(), "00000000-0000-0000-0000-000000000000");

        let from = config("IndividualUserQuota", Some("3001"));
        let id = VolumeQuotaRuleResource.create(&ctx, &from).await.unwrap();
        assert_eq!(id, format!("{}/volumeQuotaRules/rule1", VOLUME));
        assert_eq!(
            arm.requests_with(Method::Put)[0].body,
            Some(json!({
                "location": "westeurope",
                "properties": {
                    "quotaSizeInKiBs": 2048,
                    "quotaType": "IndividualUserQuota",
                    "quotaTarget": "3001"
                }
            }))
        );

        let mut to = from.clone();
        set(&mut to, "quota_size_in_kib", 4096);
        VolumeQuotaRuleResource.update(&ctx, &id, &from, &to).await.unwrap();
        assert_eq!(
            arm.requests_with(Method::Patch)[0].body,
            Some(json!({"properties": {"quotaSizeInKiBs": 4096}}))
        );

        let state = VolumeQuotaRuleResource.read(&ctx, &id, None).await.unwrap().unwrap();
        assert_eq!(state["quota_size_in_kib"], Value::Int(4096));
        assert_eq!(state["volume_id"], Value::string(VOLUME));
    }
}
