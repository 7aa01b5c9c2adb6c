//! Azure-SSIS integration runtime of a Data Factory
//!
//! A managed integration runtime running SSIS packages. Secrets (SAS token,
//! catalog admin password, component licenses, cmdkey passwords) are never
//! returned by the API and are carried over from prior state on read.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use cirrus_core::provider::{ProviderError, ProviderResult};
use cirrus_core::resource::Value;
use cirrus_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema, types};
use cirrus_core::timeouts::{Timeouts, minutes};

use super::API_VERSION;
use super::migration::IntegrationRuntimeAzureSsisV0ToV1;
use super::models::{
    AzPowerShellSetupProperties, CREDENTIAL_REFERENCE, CatalogInfo, CmdkeySetupProperties,
    ComponentSetupProperties, ComputeProperties, CopyComputeScaleProperties, CredentialReference,
    CustomSetup, CustomSetupScriptProperties, CustomerVirtualNetwork, DataProxyProperties,
    EntityReference, EnvironmentVariableSetupProperties, INTEGRATION_RUNTIME_REFERENCE,
    IntegrationRuntime, IntegrationRuntimeResource, KeyVaultSecretReference,
    LINKED_SERVICE_REFERENCE, LinkedServiceReference, ManagedIntegrationRuntime,
    ManagedTypeProperties, PackageStore, PipelineExternalComputeScaleProperties, Secret,
    SsisProperties, VnetProperties,
};
use crate::ids::{
    FactoryId, IntegrationRuntimeId, PublicIpAddressId, SubnetId, VirtualNetworkId, id_type,
};
use crate::resources::{
    Attributes, Attrs, AzureResource, ProviderContext, StateUpgrader, api_error, blocks,
    ensure_absent, get_existing, parse_error, set,
};
use crate::utils::{location_schema, normalize_location};
use crate::validate;

const NODE_SIZES: &[&str] = &[
    "Standard_D2_v3",
    "Standard_D4_v3",
    "Standard_D8_v3",
    "Standard_D16_v3",
    "Standard_D32_v3",
    "Standard_D64_v3",
    "Standard_E2_v3",
    "Standard_E4_v3",
    "Standard_E8_v3",
    "Standard_E16_v3",
    "Standard_E32_v3",
    "Standard_E64_v3",
    "Standard_D1_v2",
    "Standard_D2_v2",
    "Standard_D3_v2",
    "Standard_D4_v2",
    "Standard_A4_v2",
    "Standard_A8_v2",
];

#[rustfmt::skip]
const CATALOG_PRICING_TIERS: &[&str] = &[
    "Basic",
    "S0", "S1", "S2", "S3", "S4", "S6", "S7", "S9", "S12",
    "P1", "P2", "P4", "P6", "P11", "P15",
    "GP_S_Gen5_1", "GP_S_Gen5_2", "GP_S_Gen5_4", "GP_S_Gen5_6", "GP_S_Gen5_8", "GP_S_Gen5_10",
    "GP_S_Gen5_12", "GP_S_Gen5_14", "GP_S_Gen5_16", "GP_S_Gen5_18", "GP_S_Gen5_20",
    "GP_S_Gen5_24", "GP_S_Gen5_32", "GP_S_Gen5_40",
    "GP_Gen5_2", "GP_Gen5_4", "GP_Gen5_6", "GP_Gen5_8", "GP_Gen5_10", "GP_Gen5_12",
    "GP_Gen5_14", "GP_Gen5_16", "GP_Gen5_18", "GP_Gen5_20", "GP_Gen5_24", "GP_Gen5_32",
    "GP_Gen5_40", "GP_Gen5_80",
    "BC_Gen5_2", "BC_Gen5_4", "BC_Gen5_6", "BC_Gen5_8", "BC_Gen5_10", "BC_Gen5_12",
    "BC_Gen5_14", "BC_Gen5_16", "BC_Gen5_18", "BC_Gen5_20", "BC_Gen5_24", "BC_Gen5_32",
    "BC_Gen5_40", "BC_Gen5_80",
    "HS_Gen5_2", "HS_Gen5_4", "HS_Gen5_6", "HS_Gen5_8", "HS_Gen5_10", "HS_Gen5_12",
    "HS_Gen5_14", "HS_Gen5_16", "HS_Gen5_18", "HS_Gen5_20", "HS_Gen5_24", "HS_Gen5_32",
    "HS_Gen5_40", "HS_Gen5_80",
];

const EXPRESS_CUSTOM_SETUP_ITEMS: &[&str] =
    &["environment", "powershell_version", "component", "command_key"];

pub struct IntegrationRuntimeAzureSsisResource;

// =============================================================================
// Elastic Pool Encoding
// =============================================================================

// `elastic_pool_name` and `pricing_tier` share `catalogPricingTier` on the wire
fn format_elastic_pool(name: &str) -> String {
    format!("ELASTIC_POOL(name=\"{}\")", name)
}

fn parse_elastic_pool(tier: &str) -> Option<&str> {
    tier.strip_prefix("ELASTIC_POOL(name=\"")?
        .strip_suffix("\")")
        .filter(|name| !name.is_empty())
}

// =============================================================================
// Schema
// =============================================================================

fn string_map() -> AttributeType {
    AttributeType::Map(Box::new(AttributeType::String))
}

fn key_vault_secret(name: &str) -> AttributeSchema {
    let block = BlockSchema::new()
        .attribute(
            AttributeSchema::new("linked_service_name", types::string_not_empty()).required(),
        )
        .attribute(AttributeSchema::new("secret_name", types::string_not_empty()).required())
        .attribute(AttributeSchema::new("parameters", string_map()))
        .attribute(AttributeSchema::new("secret_version", types::string_not_empty()));
    AttributeSchema::new(name, block.into_type()).max_items(1)
}

fn vnet_integration_schema() -> AttributeSchema {
    let block = BlockSchema::new()
        .attribute(
            AttributeSchema::new("vnet_id", id_type::<VirtualNetworkId>())
                .exactly_one_of(&["vnet_id", "subnet_id"]),
        )
        .attribute(
            AttributeSchema::new("subnet_id", id_type::<SubnetId>())
                .exactly_one_of(&["vnet_id", "subnet_id"]),
        )
        .attribute(
            AttributeSchema::new("subnet_name", types::string_not_empty())
                .required_with(&["vnet_id"]),
        )
        .attribute(
            AttributeSchema::new(
                "public_ips",
                AttributeType::List(Box::new(id_type::<PublicIpAddressId>())),
            )
            .min_items(2)
            .max_items(2),
        );
    AttributeSchema::new("vnet_integration", block.into_type()).max_items(1)
}

fn catalog_info_schema() -> AttributeSchema {
    let block = BlockSchema::new()
        .attribute(AttributeSchema::new("server_endpoint", types::string_not_empty()).required())
        .attribute(AttributeSchema::new(
            "administrator_login",
            types::string_not_empty(),
        ))
        .attribute(
            AttributeSchema::new("administrator_password", types::string_not_empty()).sensitive(),
        )
        .attribute(
            AttributeSchema::new("pricing_tier", types::string_in_slice(CATALOG_PRICING_TIERS))
                .conflicts_with(&["elastic_pool_name"]),
        )
        .attribute(
            AttributeSchema::new("elastic_pool_name", validate::elastic_pool_name())
                .conflicts_with(&["pricing_tier"]),
        )
        .attribute(AttributeSchema::new(
            "dual_standby_pair_name",
            types::string_not_empty(),
        ));
    AttributeSchema::new("catalog_info", block.into_type()).max_items(1)
}

fn express_custom_setup_schema() -> AttributeSchema {
    let component = BlockSchema::new()
        .attribute(AttributeSchema::new("name", types::string_not_empty()).required())
        .attribute(AttributeSchema::new("license", types::string_not_empty()).sensitive())
        .attribute(key_vault_secret("key_vault_license"));

    let command_key = BlockSchema::new()
        .attribute(AttributeSchema::new("target_name", types::string_not_empty()).required())
        .attribute(AttributeSchema::new("user_name", types::string_not_empty()).required())
        .attribute(AttributeSchema::new("password", types::string_not_empty()).sensitive())
        .attribute(key_vault_secret("key_vault_password"));

    let block = BlockSchema::new()
        .attribute(
            AttributeSchema::new("environment", string_map())
                .at_least_one_of(EXPRESS_CUSTOM_SETUP_ITEMS),
        )
        .attribute(
            AttributeSchema::new("powershell_version", types::string_not_empty())
                .at_least_one_of(EXPRESS_CUSTOM_SETUP_ITEMS),
        )
        .attribute(
            AttributeSchema::new("component", component.into_type())
                .at_least_one_of(EXPRESS_CUSTOM_SETUP_ITEMS),
        )
        .attribute(
            AttributeSchema::new("command_key", command_key.into_type())
                .at_least_one_of(EXPRESS_CUSTOM_SETUP_ITEMS),
        );
    AttributeSchema::new("express_custom_setup", block.into_type()).max_items(1)
}

fn compute_scale_schemas() -> [AttributeSchema; 2] {
    let copy = BlockSchema::new()
        .attribute(AttributeSchema::new(
            "data_integration_unit",
            types::int_between_divisible_by(4, 256, 4),
        ))
        .attribute(AttributeSchema::new("time_to_live", types::int_at_least(5)));

    let pipeline = BlockSchema::new()
        .attribute(AttributeSchema::new(
            "number_of_external_nodes",
            types::int_between(1, 10),
        ))
        .attribute(AttributeSchema::new(
            "number_of_pipeline_nodes",
            types::int_between(1, 10),
        ))
        .attribute(AttributeSchema::new("time_to_live", types::int_at_least(5)));

    [
        AttributeSchema::new("copy_compute_scale", copy.into_type()).max_items(1),
        AttributeSchema::new("pipeline_external_compute_scale", pipeline.into_type())
            .max_items(1),
    ]
}

// =============================================================================
// Expand
// =============================================================================

fn positive(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v != 0)
}

fn expand_vnet(block: Attrs<'_>) -> VnetProperties {
    let mut vnet = VnetProperties::default();
    if let Some(vnet_id) = block.str("vnet_id") {
        vnet.vnet_id = Some(vnet_id.to_string());
        vnet.subnet = Some(block.string("subnet_name"));
    }
    if let Some(subnet_id) = block.str("subnet_id") {
        vnet.subnet_id = Some(subnet_id.to_string());
    }
    let public_ips = block.strings("public_ips");
    if !public_ips.is_empty() {
        vnet.public_ips = Some(public_ips);
    }
    vnet
}

fn expand_compute(a: Attrs<'_>) -> ComputeProperties {
    let copy_compute_scale = a.block("copy_compute_scale").and_then(|b| {
        let scale = CopyComputeScaleProperties {
            data_integration_unit: positive(b.int("data_integration_unit")),
            time_to_live: positive(b.int("time_to_live")),
        };
        (scale != CopyComputeScaleProperties::default()).then_some(scale)
    });

    let pipeline_external_compute_scale = a.block("pipeline_external_compute_scale").and_then(|b| {
        let scale = PipelineExternalComputeScaleProperties {
            time_to_live: positive(b.int("time_to_live")),
            number_of_pipeline_nodes: positive(b.int("number_of_pipeline_nodes")),
            number_of_external_nodes: positive(b.int("number_of_external_nodes")),
        };
        (scale != PipelineExternalComputeScaleProperties::default()).then_some(scale)
    });

    ComputeProperties {
        location: Some(normalize_location(&a.string("location"))),
        node_size: Some(a.string("node_size")),
        number_of_nodes: a.int("number_of_nodes"),
        max_parallel_executions_per_node: a.int("max_parallel_executions_per_node"),
        vnet_properties: a.block("vnet_integration").map(expand_vnet),
        copy_compute_scale_properties: copy_compute_scale,
        pipeline_external_compute_scale_properties: pipeline_external_compute_scale,
    }
}

fn expand_key_vault_secret(block: Option<Attrs<'_>>) -> Option<Secret> {
    let block = block?;
    let parameters = block.string_map("parameters");
    Some(Secret::AzureKeyVaultSecret(KeyVaultSecretReference {
        store: LinkedServiceReference {
            kind: LINKED_SERVICE_REFERENCE.to_string(),
            reference_name: block.string("linked_service_name"),
            parameters: (!parameters.is_empty()).then(|| {
                parameters
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect()
            }),
        },
        secret_name: block.string("secret_name"),
        secret_version: block.str("secret_version").map(str::to_string),
    }))
}

/// Inline value when given, otherwise the Key Vault reference
fn expand_secret(inline: Option<&str>, key_vault: Option<Attrs<'_>>) -> Option<Secret> {
    match inline {
        Some(value) => Some(Secret::secure_string(value)),
        None => expand_key_vault_secret(key_vault),
    }
}

fn expand_express_custom_setup(block: Attrs<'_>) -> Vec<CustomSetup> {
    let mut setups = Vec::new();

    let environment: BTreeMap<String, String> =
        block.string_map("environment").into_iter().collect();
    for (name, value) in environment {
        setups.push(CustomSetup::EnvironmentVariableSetup {
            type_properties: EnvironmentVariableSetupProperties {
                variable_name: name,
                variable_value: value,
            },
        });
    }

    if let Some(version) = block.str("powershell_version") {
        setups.push(CustomSetup::AzPowerShellSetup {
            type_properties: AzPowerShellSetupProperties {
                version: version.to_string(),
            },
        });
    }

    for component in block.blocks("component") {
        setups.push(CustomSetup::ComponentSetup {
            type_properties: ComponentSetupProperties {
                component_name: component.string("name"),
                license_key: expand_secret(
                    component.str("license"),
                    component.block("key_vault_license"),
                ),
            },
        });
    }

    for command_key in block.blocks("command_key") {
        setups.push(CustomSetup::CmdkeySetup {
            type_properties: CmdkeySetupProperties {
                target_name: command_key.string("target_name"),
                user_name: command_key.string("user_name"),
                password: expand_secret(
                    command_key.str("password"),
                    command_key.block("key_vault_password"),
                ),
            },
        });
    }

    setups
}

fn expand_catalog_info(block: Attrs<'_>) -> CatalogInfo {
    let pricing_tier = match block.str("elastic_pool_name") {
        Some(pool) => format_elastic_pool(pool),
        None => block.string("pricing_tier"),
    };
    CatalogInfo {
        catalog_server_endpoint: Some(block.string("server_endpoint")),
        catalog_admin_user_name: block.str("administrator_login").map(str::to_string),
        catalog_admin_password: block
            .str("administrator_password")
            .map(Secret::secure_string),
        catalog_pricing_tier: Some(pricing_tier),
        dual_standby_pair_name: block.str("dual_standby_pair_name").map(str::to_string),
    }
}

fn expand_proxy(block: Attrs<'_>) -> DataProxyProperties {
    DataProxyProperties {
        connect_via: Some(EntityReference::new(
            INTEGRATION_RUNTIME_REFERENCE,
            block.string("self_hosted_integration_runtime_name"),
        )),
        staging_linked_service: Some(EntityReference::new(
            LINKED_SERVICE_REFERENCE,
            block.string("staging_storage_linked_service_name"),
        )),
        path: block.str("path").map(str::to_string),
    }
}

fn expand_ssis(a: Attrs<'_>) -> SsisProperties {
    let package_stores: Vec<PackageStore> = a
        .blocks("package_store")
        .into_iter()
        .map(|store| PackageStore {
            name: store.string("name"),
            package_store_linked_service: EntityReference::new(
                LINKED_SERVICE_REFERENCE,
                store.string("linked_service_name"),
            ),
        })
        .collect();

    SsisProperties {
        catalog_info: a.block("catalog_info").map(expand_catalog_info),
        license_type: Some(a.string("license_type")),
        custom_setup_script_properties: a.block("custom_setup_script").map(|script| {
            CustomSetupScriptProperties {
                blob_container_uri: Some(script.string("blob_container_uri")),
                sas_token: Some(Secret::secure_string(script.string("sas_token"))),
            }
        }),
        data_proxy_properties: a.block("proxy").map(expand_proxy),
        edition: Some(a.string("edition")),
        express_custom_setup_properties: a
            .block("express_custom_setup")
            .map(expand_express_custom_setup),
        package_stores: (!package_stores.is_empty()).then_some(package_stores),
        credential: a.str("credential_name").map(|name| CredentialReference {
            kind: CREDENTIAL_REFERENCE.to_string(),
            reference_name: name.to_string(),
        }),
    }
}

fn expand(a: Attrs<'_>, id: &IntegrationRuntimeId) -> IntegrationRuntimeResource {
    IntegrationRuntimeResource {
        id: None,
        name: Some(id.integration_runtime_name.clone()),
        properties: IntegrationRuntime::Managed(ManagedIntegrationRuntime {
            description: Some(a.string("description")),
            state: None,
            type_properties: ManagedTypeProperties {
                compute_properties: Some(expand_compute(a)),
                ssis_properties: Some(expand_ssis(a)),
                customer_virtual_network: a.block("express_vnet_integration").map(|b| {
                    CustomerVirtualNetwork {
                        subnet_id: Some(b.string("subnet_id")),
                    }
                }),
            },
        }),
    }
}

// =============================================================================
// Flatten
// =============================================================================

/// Value of `property` in the first prior item whose `filters` all match
fn read_back_sensitive(items: &[Attrs<'_>], property: &str, filters: &[(&str, &str)]) -> String {
    items
        .iter()
        .find(|item| filters.iter().all(|(k, v)| item.string(k) == *v))
        .map(|item| item.string(property))
        .unwrap_or_default()
}

fn flatten_vnet(vnet: Option<&VnetProperties>) -> Value {
    let Some(vnet) = vnet else {
        return Value::empty_list();
    };
    let mut block = Attributes::new();
    set(&mut block, "vnet_id", vnet.vnet_id.clone().unwrap_or_default());
    set(&mut block, "subnet_id", vnet.subnet_id.clone().unwrap_or_default());
    set(&mut block, "subnet_name", vnet.subnet.clone().unwrap_or_default());
    set(&mut block, "public_ips", vnet.public_ips.clone().unwrap_or_default());
    Value::block(block)
}

fn flatten_copy_compute_scale(scale: Option<&CopyComputeScaleProperties>) -> Value {
    let Some(scale) = scale else {
        return Value::empty_list();
    };
    let mut block = Attributes::new();
    set(
        &mut block,
        "data_integration_unit",
        scale.data_integration_unit.unwrap_or_default(),
    );
    set(&mut block, "time_to_live", scale.time_to_live.unwrap_or_default());
    Value::block(block)
}

fn flatten_pipeline_external_compute_scale(
    scale: Option<&PipelineExternalComputeScaleProperties>,
) -> Value {
    let Some(scale) = scale else {
        return Value::empty_list();
    };
    let mut block = Attributes::new();
    set(
        &mut block,
        "number_of_external_nodes",
        scale.number_of_external_nodes.unwrap_or_default(),
    );
    set(
        &mut block,
        "number_of_pipeline_nodes",
        scale.number_of_pipeline_nodes.unwrap_or_default(),
    );
    set(&mut block, "time_to_live", scale.time_to_live.unwrap_or_default());
    Value::block(block)
}

fn flatten_catalog_info(catalog: Option<&CatalogInfo>, prior: Option<Attrs<'_>>) -> Value {
    let Some(catalog) = catalog else {
        return Value::empty_list();
    };
    let tier = catalog.catalog_pricing_tier.as_deref().unwrap_or_default();
    let (pricing_tier, elastic_pool_name) = match parse_elastic_pool(tier) {
        Some(pool) => ("", pool),
        None => (tier, ""),
    };

    let mut block = Attributes::new();
    set(
        &mut block,
        "server_endpoint",
        catalog.catalog_server_endpoint.clone().unwrap_or_default(),
    );
    set(&mut block, "pricing_tier", pricing_tier);
    set(&mut block, "elastic_pool_name", elastic_pool_name);
    set(
        &mut block,
        "administrator_login",
        catalog.catalog_admin_user_name.clone().unwrap_or_default(),
    );
    set(
        &mut block,
        "administrator_password",
        prior
            .map(|p| p.string("administrator_password"))
            .unwrap_or_default(),
    );
    set(
        &mut block,
        "dual_standby_pair_name",
        catalog.dual_standby_pair_name.clone().unwrap_or_default(),
    );
    Value::block(block)
}

fn flatten_custom_setup_script(
    script: Option<&CustomSetupScriptProperties>,
    prior: Option<Attrs<'_>>,
) -> Value {
    let Some(script) = script else {
        return Value::empty_list();
    };
    let mut block = Attributes::new();
    set(
        &mut block,
        "blob_container_uri",
        script.blob_container_uri.clone().unwrap_or_default(),
    );
    set(
        &mut block,
        "sas_token",
        prior.map(|p| p.string("sas_token")).unwrap_or_default(),
    );
    Value::block(block)
}

fn flatten_key_vault_secret(secret: Option<&Secret>) -> Value {
    let Some(reference) = secret.and_then(Secret::key_vault_reference) else {
        return Value::empty_list();
    };
    let parameters = reference
        .store
        .parameters
        .iter()
        .flatten()
        .map(|(k, v)| {
            let value = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
            (k.clone(), Value::String(value))
        })
        .collect();

    let mut block = Attributes::new();
    set(
        &mut block,
        "linked_service_name",
        reference.store.reference_name.as_str(),
    );
    set(&mut block, "parameters", Value::Map(parameters));
    set(&mut block, "secret_name", reference.secret_name.as_str());
    set(
        &mut block,
        "secret_version",
        reference.secret_version.clone().unwrap_or_default(),
    );
    Value::block(block)
}

fn flatten_express_custom_setup(setups: Option<&Vec<CustomSetup>>, prior: Option<Attrs<'_>>) -> Value {
    let Some(setups) = setups.filter(|s| !s.is_empty()) else {
        return Value::empty_list();
    };
    let prior_components = prior.map(|p| p.blocks("component")).unwrap_or_default();
    let prior_command_keys = prior.map(|p| p.blocks("command_key")).unwrap_or_default();

    let mut environment = HashMap::new();
    let mut powershell_version = String::new();
    let mut components = Vec::new();
    let mut command_keys = Vec::new();

    for setup in setups {
        match setup {
            CustomSetup::EnvironmentVariableSetup { type_properties } => {
                environment.insert(
                    type_properties.variable_name.clone(),
                    Value::string(&type_properties.variable_value),
                );
            }
            CustomSetup::AzPowerShellSetup { type_properties } => {
                powershell_version = type_properties.version.clone();
            }
            CustomSetup::ComponentSetup { type_properties } => {
                let name = type_properties.component_name.as_str();
                let mut component = Attributes::new();
                set(&mut component, "name", name);
                set(
                    &mut component,
                    "license",
                    read_back_sensitive(&prior_components, "license", &[("name", name)]),
                );
                set(
                    &mut component,
                    "key_vault_license",
                    flatten_key_vault_secret(type_properties.license_key.as_ref()),
                );
                components.push(component);
            }
            CustomSetup::CmdkeySetup { type_properties } => {
                let target = type_properties.target_name.as_str();
                let user = type_properties.user_name.as_str();
                let mut command_key = Attributes::new();
                set(&mut command_key, "target_name", target);
                set(&mut command_key, "user_name", user);
                set(
                    &mut command_key,
                    "password",
                    read_back_sensitive(
                        &prior_command_keys,
                        "password",
                        &[("target_name", target), ("user_name", user)],
                    ),
                );
                set(
                    &mut command_key,
                    "key_vault_password",
                    flatten_key_vault_secret(type_properties.password.as_ref()),
                );
                command_keys.push(command_key);
            }
            CustomSetup::Unsupported => {}
        }
    }

    let mut block = Attributes::new();
    set(&mut block, "environment", Value::Map(environment));
    set(&mut block, "powershell_version", powershell_version);
    set(&mut block, "component", blocks(components));
    set(&mut block, "command_key", blocks(command_keys));
    Value::block(block)
}

fn flatten_package_stores(stores: Option<&Vec<PackageStore>>) -> Value {
    blocks(
        stores
            .into_iter()
            .flatten()
            .map(|store| {
                let mut block = Attributes::new();
                set(&mut block, "name", store.name.as_str());
                set(
                    &mut block,
                    "linked_service_name",
                    store
                        .package_store_linked_service
                        .reference_name
                        .clone()
                        .unwrap_or_default(),
                );
                block
            })
            .collect(),
    )
}

fn flatten_proxy(proxy: Option<&DataProxyProperties>) -> Value {
    let Some(proxy) = proxy else {
        return Value::empty_list();
    };
    let reference_name = |r: Option<&EntityReference>| {
        r.and_then(|r| r.reference_name.clone()).unwrap_or_default()
    };
    let mut block = Attributes::new();
    set(&mut block, "path", proxy.path.clone().unwrap_or_default());
    set(
        &mut block,
        "self_hosted_integration_runtime_name",
        reference_name(proxy.connect_via.as_ref()),
    );
    set(
        &mut block,
        "staging_storage_linked_service_name",
        reference_name(proxy.staging_linked_service.as_ref()),
    );
    Value::block(block)
}

fn flatten_ssis(out: &mut Attributes, ssis: &SsisProperties, prior: Option<Attrs<'_>>) {
    let prior_block = |name: &str| prior.and_then(|p| p.block(name));

    set(out, "edition", ssis.edition.clone().unwrap_or_default());
    set(out, "license_type", ssis.license_type.clone().unwrap_or_default());
    set(
        out,
        "credential_name",
        ssis.credential
            .as_ref()
            .map(|c| c.reference_name.clone())
            .unwrap_or_default(),
    );
    set(
        out,
        "catalog_info",
        flatten_catalog_info(ssis.catalog_info.as_ref(), prior_block("catalog_info")),
    );
    set(
        out,
        "custom_setup_script",
        flatten_custom_setup_script(
            ssis.custom_setup_script_properties.as_ref(),
            prior_block("custom_setup_script"),
        ),
    );
    set(
        out,
        "express_custom_setup",
        flatten_express_custom_setup(
            ssis.express_custom_setup_properties.as_ref(),
            prior_block("express_custom_setup"),
        ),
    );
    set(out, "package_store", flatten_package_stores(ssis.package_stores.as_ref()));
    set(out, "proxy", flatten_proxy(ssis.data_proxy_properties.as_ref()));
}

// =============================================================================
// Resource
// =============================================================================

impl IntegrationRuntimeAzureSsisResource {
    async fn put(
        &self,
        ctx: &ProviderContext,
        attrs: &Attributes,
        create: bool,
    ) -> ProviderResult<String> {
        let a = Attrs::new(attrs);
        let factory = FactoryId::parse(a.require("data_factory_id")?).map_err(parse_error)?;
        let id = factory.integration_runtime(a.require("name")?);

        let _lock = ctx.locks.by_id(&factory.id()).await;
        let client = ctx.resource_client::<IntegrationRuntimeResource>(API_VERSION);
        if create {
            ensure_absent(&client, &id.id()).await?;
        }

        let action = if create { "creating" } else { "updating" };
        client
            .create_or_update(&id.id(), &expand(a, &id))
            .await
            .map_err(|e| api_error(format!("{} {}", action, id), e))?;
        Ok(id.id())
    }
}

#[async_trait]
impl AzureResource for IntegrationRuntimeAzureSsisResource {
    fn resource_type(&self) -> &'static str {
        "data_factory_integration_runtime_azure_ssis"
    }

    fn schema(&self) -> ResourceSchema {
        let [copy_compute_scale, pipeline_external_compute_scale] = compute_scale_schemas();

        ResourceSchema::new(self.resource_type())
            .with_description("Managed integration runtime running SSIS packages in a Data Factory")
            .with_version(1)
            .attribute(
                AttributeSchema::new("name", validate::integration_runtime_name())
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("description", AttributeType::String))
            .attribute(
                AttributeSchema::new("data_factory_id", id_type::<FactoryId>())
                    .required()
                    .force_new(),
            )
            .attribute(location_schema())
            .attribute(
                AttributeSchema::new("node_size", types::string_in_slice(NODE_SIZES)).required(),
            )
            .attribute(
                AttributeSchema::new("number_of_nodes", types::int_between(1, 10))
                    .with_default(Value::Int(1)),
            )
            .attribute(
                AttributeSchema::new("max_parallel_executions_per_node", types::int_between(1, 16))
                    .with_default(Value::Int(1)),
            )
            .attribute(AttributeSchema::new(
                "credential_name",
                types::string_not_empty(),
            ))
            .attribute(
                AttributeSchema::new(
                    "edition",
                    AttributeType::enumeration(&["Standard", "Enterprise"]),
                )
                .with_default(Value::string("Standard")),
            )
            .attribute(
                AttributeSchema::new(
                    "license_type",
                    AttributeType::enumeration(&["LicenseIncluded", "BasePrice"]),
                )
                .with_default(Value::string("LicenseIncluded")),
            )
            .attribute(copy_compute_scale)
            .attribute(pipeline_external_compute_scale)
            .attribute(
                AttributeSchema::new(
                    "express_vnet_integration",
                    BlockSchema::new()
                        .attribute(
                            AttributeSchema::new("subnet_id", id_type::<SubnetId>()).required(),
                        )
                        .into_type(),
                )
                .max_items(1),
            )
            .attribute(vnet_integration_schema())
            .attribute(
                AttributeSchema::new(
                    "custom_setup_script",
                    BlockSchema::new()
                        .attribute(
                            AttributeSchema::new("blob_container_uri", types::string_not_empty())
                                .required(),
                        )
                        .attribute(
                            AttributeSchema::new("sas_token", types::string_not_empty())
                                .required()
                                .sensitive(),
                        )
                        .into_type(),
                )
                .max_items(1),
            )
            .attribute(catalog_info_schema())
            .attribute(express_custom_setup_schema())
            .attribute(AttributeSchema::new(
                "package_store",
                BlockSchema::new()
                    .attribute(AttributeSchema::new("name", types::string_not_empty()).required())
                    .attribute(
                        AttributeSchema::new("linked_service_name", types::string_not_empty())
                            .required(),
                    )
                    .into_type(),
            ))
            .attribute(
                AttributeSchema::new(
                    "proxy",
                    BlockSchema::new()
                        .attribute(
                            AttributeSchema::new(
                                "self_hosted_integration_runtime_name",
                                types::string_not_empty(),
                            )
                            .required(),
                        )
                        .attribute(
                            AttributeSchema::new(
                                "staging_storage_linked_service_name",
                                types::string_not_empty(),
                            )
                            .required(),
                        )
                        .attribute(AttributeSchema::new("path", types::string_not_empty()))
                        .into_type(),
                )
                .max_items(1),
            )
            .with_timeouts(Timeouts::new(
                minutes(30),
                minutes(5),
                minutes(30),
                minutes(30),
            ))
    }

    fn validate_id(&self, identifier: &str) -> Result<(), String> {
        IntegrationRuntimeId::validate(identifier)
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
        let id = IntegrationRuntimeId::parse(identifier).map_err(parse_error)?;
        let client = ctx.resource_client::<IntegrationRuntimeResource>(API_VERSION);
        let Some(resource) = get_existing(&client, &id.id(), &id).await? else {
            return Ok(None);
        };

        let IntegrationRuntime::Managed(runtime) = resource.properties else {
            return Err(ProviderError::new(format!(
                "asserting `IntegrationRuntime` as `ManagedIntegrationRuntime` for {}",
                id
            )));
        };
        let prior = prior.map(Attrs::new);

        let mut out = Attributes::new();
        set(&mut out, "name", id.integration_runtime_name.as_str());
        set(&mut out, "data_factory_id", id.factory_id().id());
        set(&mut out, "description", runtime.description.unwrap_or_default());

        let properties = runtime.type_properties;
        if let Some(compute) = &properties.compute_properties {
            set(
                &mut out,
                "location",
                normalize_location(compute.location.as_deref().unwrap_or_default()),
            );
            set(&mut out, "node_size", compute.node_size.clone().unwrap_or_default());
            set(
                &mut out,
                "number_of_nodes",
                compute.number_of_nodes.unwrap_or_default(),
            );
            set(
                &mut out,
                "max_parallel_executions_per_node",
                compute.max_parallel_executions_per_node.unwrap_or_default(),
            );
            set(
                &mut out,
                "vnet_integration",
                flatten_vnet(compute.vnet_properties.as_ref()),
            );
            set(
                &mut out,
                "copy_compute_scale",
                flatten_copy_compute_scale(compute.copy_compute_scale_properties.as_ref()),
            );
            set(
                &mut out,
                "pipeline_external_compute_scale",
                flatten_pipeline_external_compute_scale(
                    compute.pipeline_external_compute_scale_properties.as_ref(),
                ),
            );
        }

        if let Some(ssis) = &properties.ssis_properties {
            flatten_ssis(&mut out, ssis, prior);
        }

        let express_vnet = match &properties.customer_virtual_network {
            Some(network) => {
                let mut block = Attributes::new();
                set(
                    &mut block,
                    "subnet_id",
                    network.subnet_id.clone().unwrap_or_default(),
                );
                Value::block(block)
            }
            None => Value::empty_list(),
        };
        set(&mut out, "express_vnet_integration", express_vnet);

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
        let id = IntegrationRuntimeId::parse(identifier).map_err(parse_error)?;
        let _lock = ctx.locks.by_id(&id.factory_id().id()).await;
        let client = ctx.resource_client::<IntegrationRuntimeResource>(API_VERSION);
        match client.delete(&id.id()).await {
            Err(e) if !e.was_not_found() => Err(api_error(format!("deleting {}", id), e)),
            _ => Ok(()),
        }
    }

    fn state_upgraders(&self) -> Vec<Box<dyn StateUpgrader>> {
        vec![Box::new(IntegrationRuntimeAzureSsisV0ToV1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MemoryArmClient, Method};
    use cirrus_core::provider::ErrorKind;
    use serde_json::json;
    use std::sync::Arc;

    const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";
    const FACTORY: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/etl/providers/Microsoft.DataFactory/factories/df1";
    const SUBNET: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/etl/providers/Microsoft.Network/virtualNetworks/vnet1/subnets/ssis";

    fn block(pairs: Vec<(&str, Value)>) -> Value {
        Value::block(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn config() -> Attributes {
        let mut attrs = Attributes::new();
        set(&mut attrs, "name", "ssis-ir1");
        set(&mut attrs, "data_factory_id", FACTORY);
        set(&mut attrs, "location", "West Europe");
        set(&mut attrs, "node_size", "Standard_D8_v3");
        set(&mut attrs, "number_of_nodes", 2);
        set(&mut attrs, "max_parallel_executions_per_node", 8);
        set(&mut attrs, "edition", "Standard");
        set(&mut attrs, "license_type", "LicenseIncluded");
        attrs
    }

    fn with_secrets(mut attrs: Attributes) -> Attributes {
        set(
            &mut attrs,
            "catalog_info",
            block(vec![
                ("server_endpoint", Value::string("sql1.database.windows.net")),
                ("administrator_login", Value::string("ssisadmin")),
                ("administrator_password", Value::string("P@ssw0rd")),
                ("elastic_pool_name", Value::string("pool1")),
            ]),
        );
        set(
            &mut attrs,
            "custom_setup_script",
            block(vec![
                (
                    "blob_container_uri",
                    Value::string("https://store1.blob.core.windows.net/setup"),
                ),
                ("sas_token", Value::string("sv=2020&sig=abc")),
            ]),
        );

        let mut component = Attributes::new();
        set(&mut component, "name", "SentryOne.TaskFactory");
        set(&mut component, "license", "licence-key");
        let mut command_key = Attributes::new();
        set(&mut command_key, "target_name", "share.file.core.windows.net");
        set(&mut command_key, "user_name", "share");
        set(
            &mut command_key,
            "key_vault_password",
            block(vec![
                ("linked_service_name", Value::string("vault_ls")),
                ("secret_name", Value::string("share-key")),
            ]),
        );
        let mut environment = HashMap::new();
        environment.insert("ENV".to_string(), Value::string("prod"));
        set(
            &mut attrs,
            "express_custom_setup",
            block(vec![
                ("environment", Value::Map(environment)),
                ("powershell_version", Value::string("6.2.0")),
                ("component", blocks(vec![component])),
                ("command_key", blocks(vec![command_key])),
            ]),
        );
        attrs
    }

    /// The API masks secrets, drop them from what it stores
    fn strip_secrets(arm: &MemoryArmClient) {
        arm.on_put(|_, body| {
            let ssis = &mut body["properties"]["typeProperties"]["ssisProperties"];
            if let Some(catalog) = ssis["catalogInfo"].as_object_mut() {
                catalog.remove("catalogAdminPassword");
            }
            if let Some(script) = ssis["customSetupScriptProperties"].as_object_mut() {
                script.remove("sasToken");
            }
            if let Some(setups) = ssis["expressCustomSetupProperties"].as_array_mut() {
                for setup in setups {
                    if setup["typeProperties"]["licenseKey"]["type"] == "SecureString"
                        && let Some(props) = setup["typeProperties"].as_object_mut()
                    {
                        props.remove("licenseKey");
                    }
                }
            }
        });
    }

    #[tokio::test]
    async fn create_sends_managed_runtime() {
        let arm = Arc::new(MemoryArmClient::new());
        let ctx = ProviderContext::new(arm.clone(), SUBSCRIPTION);
        let mut attrs = config();
        set(
            &mut attrs,
            "express_vnet_integration",
            block(vec![("subnet_id", Value::string(SUBNET))]),
        );
        set(
            &mut attrs,
            "pipeline_external_compute_scale",
            block(vec![
                ("number_of_external_nodes", Value::Int(3)),
                ("time_to_live", Value::Int(10)),
            ]),
        );

        let id = IntegrationRuntimeAzureSsisResource.create(&ctx, &attrs).await.unwrap();
        assert_eq!(id, format!("{}/integrationRuntimes/ssis-ir1", FACTORY));

        let sent = arm.requests_with(Method::Put)[0].body.clone().unwrap();
        assert_eq!(sent["properties"]["type"], "Managed");
        let type_properties = &sent["properties"]["typeProperties"];
        assert_eq!(
            type_properties["computeProperties"],
            json!({
                "location": "westeurope",
                "nodeSize": "Standard_D8_v3",
                "numberOfNodes": 2,
                "maxParallelExecutionsPerNode": 8,
                "pipelineExternalComputeScaleProperties": {
                    "timeToLive": 10,
                    "numberOfExternalNodes": 3
                }
            })
        );
        assert_eq!(
            type_properties["ssisProperties"],
            json!({"licenseType": "LicenseIncluded", "edition": "Standard"})
        );
        assert_eq!(
            type_properties["customerVirtualNetwork"],
            json!({"subnetId": SUBNET})
        );
    }

    #[tokio::test]
    async fn create_fails_when_runtime_exists() {
        let arm = Arc::new(MemoryArmClient::new());
        let ctx = ProviderContext::new(arm.clone(), SUBSCRIPTION);
        arm.insert(
            &format!("{}/integrationRuntimes/ssis-ir1", FACTORY),
            json!({"properties": {"type": "Managed", "typeProperties": {}}}),
        );

        let err = IntegrationRuntimeAzureSsisResource
            .create(&ctx, &config())
            .await
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::AlreadyExists { .. }));
        assert!(arm.requests_with(Method::Put).is_empty());
    }

    #[tokio::test]
    async fn secrets_are_encoded_and_read_back_from_prior_state() {
        let arm = Arc::new(MemoryArmClient::new());
        let ctx = ProviderContext::new(arm.clone(), SUBSCRIPTION);
        strip_secrets(&arm);
        let desired = with_secrets(config());

        let id = IntegrationRuntimeAzureSsisResource.create(&ctx, &desired).await.unwrap();

        let sent = arm.requests_with(Method::Put)[0].body.clone().unwrap();
        let ssis = &sent["properties"]["typeProperties"]["ssisProperties"];
        assert_eq!(
            ssis["catalogInfo"]["catalogPricingTier"],
            "ELASTIC_POOL(name=\"pool1\")"
        );
        assert_eq!(
            ssis["catalogInfo"]["catalogAdminPassword"],
            json!({"type": "SecureString", "value": "P@ssw0rd"})
        );
        assert_eq!(
            ssis["expressCustomSetupProperties"][0],
            json!({
                "type": "EnvironmentVariableSetup",
                "typeProperties": {"variableName": "ENV", "variableValue": "prod"}
            })
        );
        assert_eq!(
            ssis["expressCustomSetupProperties"][3]["typeProperties"]["password"],
            json!({
                "type": "AzureKeyVaultSecret",
                "store": {"type": "LinkedServiceReference", "referenceName": "vault_ls"},
                "secretName": "share-key"
            })
        );

        let state = IntegrationRuntimeAzureSsisResource
            .read(&ctx, &id, Some(&desired))
            .await
            .unwrap()
            .unwrap();
        let a = Attrs::new(&state);

        let catalog = a.block("catalog_info").unwrap();
        assert_eq!(catalog.str("elastic_pool_name"), Some("pool1"));
        assert_eq!(catalog.str("pricing_tier"), None);
        assert_eq!(catalog.str("administrator_password"), Some("P@ssw0rd"));
        assert_eq!(
            a.block("custom_setup_script").unwrap().str("sas_token"),
            Some("sv=2020&sig=abc")
        );

        let setup = a.block("express_custom_setup").unwrap();
        assert_eq!(setup.str("powershell_version"), Some("6.2.0"));
        assert_eq!(
            setup.string_map("environment").get("ENV").map(String::as_str),
            Some("prod")
        );
        let component = setup.block("component").unwrap();
        assert_eq!(component.str("license"), Some("licence-key"));
        let command_key = setup.block("command_key").unwrap();
        assert_eq!(command_key.str("password"), None);
        assert_eq!(
            command_key
                .block("key_vault_password")
                .and_then(|kv| kv.str("secret_name")),
            Some("share-key")
        );
    }

    #[tokio::test]
    async fn pipeline_external_nodes_read_from_their_own_field() {
        let arm = Arc::new(MemoryArmClient::new());
        let ctx = ProviderContext::new(arm.clone(), SUBSCRIPTION);
        let path = format!("{}/integrationRuntimes/ssis-ir1", FACTORY);
        arm.insert(
            &path,
            json!({"properties": {"type": "Managed", "typeProperties": {
                "computeProperties": {
                    "location": "westeurope",
                    "nodeSize": "Standard_D2_v3",
                    "numberOfNodes": 1,
                    "maxParallelExecutionsPerNode": 1,
                    "pipelineExternalComputeScaleProperties": {
                        "numberOfExternalNodes": 4,
                        "numberOfPipelineNodes": 2,
                        "timeToLive": 5
                    }
                }
            }}}),
        );

        let state = IntegrationRuntimeAzureSsisResource
            .read(&ctx, &path, None)
            .await
            .unwrap()
            .unwrap();
        let scale = Attrs::new(&state)
            .block("pipeline_external_compute_scale")
            .unwrap();
        assert_eq!(scale.int("number_of_external_nodes"), Some(4));
        assert_eq!(scale.int("number_of_pipeline_nodes"), Some(2));
        assert_eq!(state["vnet_integration"], Value::empty_list());
    }

    #[tokio::test]
    async fn read_rejects_self_hosted_runtimes() {
        let arm = Arc::new(MemoryArmClient::new());
        let ctx = ProviderContext::new(arm.clone(), SUBSCRIPTION);
        let path = format!("{}/integrationRuntimes/selfhosted1", FACTORY);
        arm.insert(&path, json!({"properties": {"type": "SelfHosted"}}));

        let err = IntegrationRuntimeAzureSsisResource
            .read(&ctx, &path, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ManagedIntegrationRuntime"));
    }

    #[tokio::test]
    async fn delete_ignores_missing_runtime() {
        let arm = Arc::new(MemoryArmClient::new());
        let ctx = ProviderContext::new(arm.clone(), SUBSCRIPTION);
        let path = format!("{}/integrationRuntimes/ssis-ir1", FACTORY);
        IntegrationRuntimeAzureSsisResource.delete(&ctx, &path).await.unwrap();

        arm.fail_next(Method::Delete, "integrationRuntimes", 500, "InternalError");
        assert!(IntegrationRuntimeAzureSsisResource.delete(&ctx, &path).await.is_err());
    }

    #[test]
    fn schema_constraints() {
        let schema = IntegrationRuntimeAzureSsisResource.schema();
        assert_eq!(schema.version, 1);

        let mut attrs = config();
        set(
            &mut attrs,
            "catalog_info",
            block(vec![
                ("server_endpoint", Value::string("sql1.database.windows.net")),
                ("pricing_tier", Value::string("S0")),
                ("elastic_pool_name", Value::string("pool1")),
            ]),
        );
        assert!(schema.validate(&attrs).is_err());

        let mut attrs = config();
        set(&mut attrs, "express_custom_setup", block(vec![]));
        assert!(schema.validate(&attrs).is_err());

        let mut attrs = config();
        set(
            &mut attrs,
            "copy_compute_scale",
            block(vec![("data_integration_unit", Value::Int(6))]),
        );
        assert!(schema.validate(&attrs).is_err());

        assert!(schema.validate(&with_secrets(config())).is_ok());
    }

    #[test]
    fn elastic_pool_encoding() {
        assert_eq!(format_elastic_pool("pool1"), "ELASTIC_POOL(name=\"pool1\")");
        assert_eq!(parse_elastic_pool("ELASTIC_POOL(name=\"pool1\")"), Some("pool1"));
        assert_eq!(parse_elastic_pool("ELASTIC_POOL(name=\"\")"), None);
        assert_eq!(parse_elastic_pool("S0"), None);
    }

    #[test]
    fn validate_id_requires_integration_runtime() {
        let r = IntegrationRuntimeAzureSsisResource;
        assert!(r.validate_id(&format!("{}/integrationRuntimes/ir", FACTORY)).is_ok());
        assert!(r.validate_id(FACTORY).is_err());
    }
}
