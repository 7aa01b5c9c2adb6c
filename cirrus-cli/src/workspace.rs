//! Tracked state: upgrading, refreshing and recording apply results

use std::collections::HashMap;

use cirrus_core::interpreter::{ApplyResult, EffectOutcome};
use cirrus_core::plan::Plan;
use cirrus_core::provider::Provider;
use cirrus_core::resource::{ResourceId, State, attributes_to_json};
use cirrus_core::schema::ResourceSchema;
use cirrus_state::{ResourceState, StateFile};
use colored::Colorize;
use tracing::debug;

pub type CurrentStates = HashMap<ResourceId, State>;

pub fn schemas<P: Provider>(provider: &P) -> HashMap<String, ResourceSchema> {
    provider
        .resource_types()
        .iter()
        .map(|t| (t.name().to_string(), t.schema()))
        .collect()
}

/// Bring every recorded resource up to its current schema version
pub fn upgrade<P: Provider>(provider: &P, file: &mut StateFile) -> Result<(), String> {
    for entry in &mut file.resources {
        let upgraded = provider
            .upgrade_state(
                &entry.resource_type,
                entry.schema_version,
                &entry.identifier,
                entry.to_state().attributes,
            )
            .map_err(|e| format!("Failed to upgrade state of {}: {}", entry.resource_id(), e))?;

        if upgraded.schema_version != entry.schema_version {
            debug!(
                "Upgraded {} from schema version {} to {}",
                entry.resource_id(),
                entry.schema_version,
                upgraded.schema_version
            );
        }
        entry.identifier = upgraded.identifier;
        entry.schema_version = upgraded.schema_version;
        entry.attributes = attributes_to_json(&upgraded.attributes);
    }
    Ok(())
}

/// Re-read every recorded resource, dropping the ones deleted outside Cirrus
pub async fn refresh<P: Provider>(provider: &P, file: &mut StateFile) -> Result<CurrentStates, String> {
    upgrade(provider, file)?;

    let mut current = CurrentStates::new();
    let mut refreshed = Vec::with_capacity(file.resources.len());
    for entry in &file.resources {
        let id = entry.resource_id();
        let prior = entry.to_state();
        let state = provider
            .read(&id, &entry.identifier, Some(&prior))
            .await
            .map_err(|e| format!("Failed to read {}: {}", id, e))?;

        match ResourceState::from_state(&state, &entry.provider) {
            Some(updated) => {
                refreshed.push(updated);
                current.insert(id, state);
            }
            None => println!(
                "  {} {} no longer exists and was removed from state",
                "!".yellow().bold(),
                id
            ),
        }
    }
    file.resources = refreshed;
    Ok(current)
}

/// Apply the outcome of each executed effect to the state file
///
/// Returns the number of state entries that changed.
pub fn record(file: &mut StateFile, provider: &str, plan: &Plan, result: &ApplyResult) -> usize {
    let mut changed = 0;
    for (effect, outcome) in plan.effects().iter().zip(&result.outcomes) {
        let Ok(outcome) = outcome else {
            continue;
        };
        match outcome {
            EffectOutcome::Created { state }
            | EffectOutcome::Updated { state }
            | EffectOutcome::Replaced { state } => {
                if let Some(entry) = ResourceState::from_state(state, provider) {
                    file.upsert_resource(entry);
                    changed += 1;
                }
            }
            EffectOutcome::Deleted { id } => {
                if file.remove_resource(&id.resource_type, &id.name).is_some() {
                    changed += 1;
                }
            }
            EffectOutcome::Skipped { reason } => {
                debug!("{} skipped: {}", effect, reason);
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_core::differ::create_plan;
    use cirrus_core::interpreter::{Interpreter, InterpreterConfig};
    use cirrus_core::resource::{Resource, Value};
    use cirrus_provider_azurerm::client::MemoryArmClient;
    use cirrus_provider_azurerm::{AzureRmProvider, ProviderContext};
    use serde_json::json;
    use std::sync::Arc;

    const ZONE: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/dns/providers/Microsoft.Network/privateDnsZones/example.internal";

    fn provider() -> (Arc<MemoryArmClient>, AzureRmProvider) {
        let arm = Arc::new(MemoryArmClient::new());
        let ctx = ProviderContext::new(arm.clone(), "00000000-0000-0000-0000-000000000000");
        (arm, AzureRmProvider::new(ctx))
    }

    fn a_record(ttl: i64) -> Resource {
        Resource::new("private_dns_a_record", "www")
            .with_attribute("name", Value::string("www"))
            .with_attribute("resource_group_name", Value::string("dns"))
            .with_attribute("zone_name", Value::string("example.internal"))
            .with_attribute("ttl", Value::Int(ttl))
            .with_attribute("records", Value::List(vec![Value::string("10.0.0.4")]))
    }

    async fn apply(provider: AzureRmProvider, desired: &[Resource], file: &mut StateFile) -> usize {
        let current = refresh(&provider, file).await.unwrap();
        let plan = create_plan(desired, &current, &schemas(&provider));
        let interpreter = Interpreter::new(provider);
        let result = interpreter.apply(&plan).await;
        assert!(result.is_success());
        record(file, "azurerm", &plan, &result)
    }

    #[tokio::test]
    async fn apply_records_created_resources() {
        let (_arm, provider) = provider();
        let mut file = StateFile::new();

        assert_eq!(apply(provider, &[a_record(300)], &mut file).await, 1);

        let entry = file.find_resource("private_dns_a_record", "www").unwrap();
        assert_eq!(entry.identifier, format!("{}/A/www", ZONE));
        assert_eq!(entry.attributes["ttl"], json!(300));
    }

    #[tokio::test]
    async fn second_apply_without_changes_is_a_no_op() {
        let (arm, provider) = provider();
        let mut file = StateFile::new();
        apply(provider, &[a_record(300)], &mut file).await;

        let ctx = ProviderContext::new(arm, "00000000-0000-0000-0000-000000000000");
        let provider = AzureRmProvider::new(ctx);
        let current = refresh(&provider, &mut file).await.unwrap();
        let plan = create_plan(&[a_record(300)], &current, &schemas(&provider));
        assert!(plan.is_empty(), "unexpected plan: {:?}", plan.effects());
    }

    #[tokio::test]
    async fn removed_declarations_are_deleted_and_forgotten() {
        let (arm, provider) = provider();
        let mut file = StateFile::new();
        apply(provider, &[a_record(300)], &mut file).await;

        let ctx = ProviderContext::new(arm.clone(), "00000000-0000-0000-0000-000000000000");
        apply(AzureRmProvider::new(ctx), &[], &mut file).await;

        assert!(file.resources.is_empty());
        assert!(arm.resource(&format!("{}/A/www", ZONE)).is_none());
    }

    #[tokio::test]
    async fn refresh_drops_resources_deleted_elsewhere() {
        let (_arm, provider) = provider();
        let mut file = StateFile::new();
        file.upsert_resource(
            ResourceState::new(
                "private_dns_a_record",
                "www",
                "azurerm",
                format!("{}/A/www", ZONE),
            )
            .with_attribute("ttl", json!(300)),
        );

        let current = refresh(&provider, &mut file).await.unwrap();
        assert!(current.is_empty());
        assert!(file.resources.is_empty());
    }

    #[tokio::test]
    async fn dry_run_records_nothing() {
        let (arm, provider) = provider();
        let mut file = StateFile::new();
        let plan = create_plan(&[a_record(300)], &CurrentStates::new(), &schemas(&provider));

        let interpreter = Interpreter::new(provider).with_config(InterpreterConfig {
            dry_run: true,
            continue_on_error: false,
        });
        let result = interpreter.apply(&plan).await;

        assert_eq!(record(&mut file, "azurerm", &plan, &result), 0);
        assert!(arm.requests().is_empty());
    }

    #[test]
    fn upgrade_rewrites_legacy_entries() {
        let (_arm, provider) = provider();
        let cluster = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/logs/providers/Microsoft.OperationalInsights/clusters/cluster1";
        let mut file = StateFile::new();
        file.upsert_resource(ResourceState::new(
            "log_analytics_cluster_customer_managed_key",
            "cmk",
            "azurerm",
            format!("{}/CMK", cluster),
        ));

        upgrade(&provider, &mut file).unwrap();

        let entry = &file.resources[0];
        assert_eq!(entry.identifier, cluster);
        assert_eq!(entry.schema_version, 1);
        assert_eq!(entry.attributes["log_analytics_cluster_id"], json!(cluster));
    }
}
