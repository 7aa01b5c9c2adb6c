//! A record set in a private DNS zone

use async_trait::async_trait;
use cirrus_core::provider::ProviderResult;
use cirrus_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::API_VERSION;
use super::models::{ARecord, RecordSet, RecordSetProperties};
use crate::ids::{PrivateDnsZoneId, RecordSetId, RecordType};
use crate::resources::{
    Attributes, Attrs, AzureResource, ProviderContext, api_error, ensure_absent, get_existing,
    has_change, parse_error, set,
};
use crate::utils::{expand_tags, flatten_tags, resource_group_name_schema, tags_schema};
use crate::validate;

pub struct ARecordResource;

fn expand_records(attrs: Attrs<'_>) -> Vec<ARecord> {
    attrs
        .strings("records")
        .into_iter()
        .map(|ip| ARecord {
            ipv4_address: Some(ip),
        })
        .collect()
}

/// Records are a set: keep the configured order when the contents match
fn flatten_records(records: Option<&Vec<ARecord>>, prior: Option<&Attributes>) -> Vec<String> {
    let mut ips: Vec<String> = records
        .into_iter()
        .flatten()
        .filter_map(|r| r.ipv4_address.clone())
        .collect();
    ips.sort();

    if let Some(prior) = prior {
        let configured = Attrs::new(prior).strings("records");
        let mut sorted = configured.clone();
        sorted.sort();
        if sorted == ips {
            return configured;
        }
    }
    ips
}

#[async_trait]
impl AzureResource for ARecordResource {
    fn resource_type(&self) -> &'static str {
        "private_dns_a_record"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.resource_type())
            .with_description("An A record set within a private DNS zone")
            .attribute(
                AttributeSchema::new("name", validate::record_set_name())
                    .required()
                    .force_new(),
            )
            .attribute(resource_group_name_schema())
            .attribute(
                AttributeSchema::new("zone_name", types::string_not_empty())
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("ttl", types::int_between(1, 2147483647)).required())
            .attribute(
                AttributeSchema::new(
                    "records",
                    AttributeType::List(Box::new(validate::ipv4_address())),
                )
                .required()
                .min_items(1),
            )
            .attribute(tags_schema())
            .attribute(AttributeSchema::new("fqdn", AttributeType::String).read_only())
    }

    fn validate_id(&self, identifier: &str) -> Result<(), String> {
        let id = RecordSetId::parse(identifier).map_err(|e| e.to_string())?;
        if id.record_type != RecordType::A {
            return Err(format!(
                "expected a record set of type A, got {}",
                id.record_type.as_str()
            ));
        }
        Ok(())
    }

    async fn create(&self, ctx: &ProviderContext, attrs: &Attributes) -> ProviderResult<String> {
        let a = Attrs::new(attrs);
        let zone = PrivateDnsZoneId::new(
            &ctx.subscription_id,
            a.require("resource_group_name")?,
            a.require("zone_name")?,
        );
        let id = RecordSetId::new(&zone, RecordType::A, a.require("name")?);

        let _lock = ctx.locks.by_id(&zone.id()).await;
        let client = ctx.resource_client::<RecordSet>(API_VERSION);
        ensure_absent(&client, &id.id()).await?;

        let payload = RecordSet {
            properties: RecordSetProperties {
                metadata: expand_tags(a),
                ttl: a.int("ttl"),
                a_records: Some(expand_records(a)),
                ..Default::default()
            },
            ..Default::default()
        };
        client
            .create_or_update(&id.id(), &payload)
            .await
            .map_err(|e| api_error(format!("creating {}", id), e))?;

        Ok(id.id())
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        identifier: &str,
        prior: Option<&Attributes>,
    ) -> ProviderResult<Option<Attributes>> {
        let id = RecordSetId::parse(identifier).map_err(parse_error)?;
        let client = ctx.resource_client::<RecordSet>(API_VERSION);
        let Some(record_set) = get_existing(&client, &id.id(), &id).await? else {
            return Ok(None);
        };

        let props = &record_set.properties;
        let mut out = Attributes::new();
        set(&mut out, "name", id.relative_record_set_name.as_str());
        set(&mut out, "resource_group_name", id.resource_group_name.as_str());
        set(&mut out, "zone_name", id.private_dns_zone_name.as_str());
        set(&mut out, "ttl", props.ttl.unwrap_or_default());
        set(
            &mut out,
            "records",
            flatten_records(props.a_records.as_ref(), prior),
        );
        set(&mut out, "fqdn", props.fqdn.clone().unwrap_or_default());
        out.insert("tags".to_string(), flatten_tags(props.metadata.as_ref()));
        Ok(Some(out))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        identifier: &str,
        from: &Attributes,
        to: &Attributes,
    ) -> ProviderResult<()> {
        let id = RecordSetId::parse(identifier).map_err(parse_error)?;
        let a = Attrs::new(to);

        let _lock = ctx.locks.by_id(&id.zone_id().id()).await;
        let client = ctx.resource_client::<RecordSet>(API_VERSION);
        let mut existing = client
            .get(&id.id())
            .await
            .map_err(|e| api_error(format!("retrieving {}", id), e))?;

        let props = &mut existing.properties;
        if has_change(from, to, "ttl") {
            props.ttl = a.int("ttl");
        }
        if has_change(from, to, "records") {
            props.a_records = Some(expand_records(a));
        }
        if has_change(from, to, "tags") {
            props.metadata = Some(a.string_map("tags"));
        }
        props.fqdn = None;
        props.is_auto_registered = None;

        client
            .update(&id.id(), &existing)
            .await
            .map_err(|e| api_error(format!("updating {}", id), e))?;
        Ok(())
    }

    async fn delete(&self, ctx: &ProviderContext, identifier: &str) -> ProviderResult<()> {
        let id = RecordSetId::parse(identifier).map_err(parse_error)?;
        let _lock = ctx.locks.by_id(&id.zone_id().id()).await;
        let client = ctx.resource_client::<RecordSet>(API_VERSION);
        match client.delete(&id.id()).await {
            Err(e) if !e.was_not_found() => Err(api_error(format!("deleting {}", id), e)),
            _ => Ok(()),
        }
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

    const ZONE: &str =
        "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/dns/providers/Microsoft.Network/privateDnsZones/example.internal";

    fn context() -> (Arc<MemoryArmClient>, ProviderContext) {
        let arm = Arc::new(MemoryArmClient::new());
        let ctx = ProviderContext::new(arm.clone(), "00000000-0000-0000-0000-000000000000");
        (arm, ctx)
    }

    fn config(records: &[&str]) -> Attributes {
        let mut attrs = Attributes::new();
        set(&mut attrs, "name", "www");
        set(&mut attrs, "resource_group_name", "dns");
        set(&mut attrs, "zone_name", "example.internal");
        set(&mut attrs, "ttl", 300);
        set(
            &mut attrs,
            "records",
            records.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
        );
        attrs
    }

    #[tokio::test]
    async fn create_sends_records_and_returns_id() {
        let (arm, ctx) = context();
        let id = ARecordResource
            .create(&ctx, &config(&["10.0.0.5", "10.0.0.4"]))
            .await
            .unwrap();
        assert_eq!(id, format!("{}/A/www", ZONE));

        let put = &arm.requests_with(Method::Put)[0];
        assert_eq!(put.api_version, API_VERSION);
        assert_eq!(
            put.body.as_ref().unwrap(),
            &json!({"properties": {
                "ttl": 300,
                "aRecords": [{"ipv4Address": "10.0.0.5"}, {"ipv4Address": "10.0.0.4"}]
            }})
        );
    }

    #[tokio::test]
    async fn create_fails_when_record_exists() {
        let (arm, ctx) = context();
        arm.insert(&format!("{}/A/www", ZONE), json!({"properties": {"ttl": 60}}));

        let err = ARecordResource
            .create(&ctx, &config(&["10.0.0.4"]))
            .await
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn read_keeps_configured_record_order() {
        let (_arm, ctx) = context();
        let desired = config(&["10.0.0.5", "10.0.0.4"]);
        let id = ARecordResource.create(&ctx, &desired).await.unwrap();

        let state = ARecordResource
            .read(&ctx, &id, Some(&desired))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state["records"], desired["records"]);
        assert_eq!(state["zone_name"], Value::string("example.internal"));

        let imported = ARecordResource.read(&ctx, &id, None).await.unwrap().unwrap();
        assert_eq!(
            imported["records"],
            Value::from(vec!["10.0.0.4".to_string(), "10.0.0.5".to_string()])
        );
    }

    #[tokio::test]
    async fn update_patches_changed_values() {
        let (arm, ctx) = context();
        let from = config(&["10.0.0.4"]);
        let id = ARecordResource.create(&ctx, &from).await.unwrap();

        let mut to = from.clone();
        set(&mut to, "ttl", 60);
        ARecordResource.update(&ctx, &id, &from, &to).await.unwrap();

        let stored = arm.resource(&id).unwrap();
        assert_eq!(stored["properties"]["ttl"], 60);
        assert_eq!(arm.requests_with(Method::Patch).len(), 1);
    }

    #[tokio::test]
    async fn read_of_deleted_record_is_none() {
        let (_arm, ctx) = context();
        let id = ARecordResource.create(&ctx, &config(&["10.0.0.4"])).await.unwrap();
        ARecordResource.delete(&ctx, &id).await.unwrap();
        assert!(ARecordResource.read(&ctx, &id, None).await.unwrap().is_none());
    }

    #[test]
    fn validate_id_requires_a_records() {
        assert!(ARecordResource.validate_id(&format!("{}/A/www", ZONE)).is_ok());
        assert!(ARecordResource.validate_id(&format!("{}/CNAME/www", ZONE)).is_err());
        assert!(ARecordResource.validate_id(ZONE).is_err());
    }
}
