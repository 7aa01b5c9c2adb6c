use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// =============================================================================
// Integration Runtimes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationRuntimeResource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub properties: IntegrationRuntime,
}

/// Integration runtime, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IntegrationRuntime {
    Managed(ManagedIntegrationRuntime),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedIntegrationRuntime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default)]
    pub type_properties: ManagedTypeProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedTypeProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_properties: Option<ComputeProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssis_properties: Option<SsisProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_virtual_network: Option<CustomerVirtualNetwork>,
}

// =============================================================================
// Compute
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_nodes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel_executions_per_node: Option<i64>,
    #[serde(rename = "vNetProperties", skip_serializing_if = "Option::is_none")]
    pub vnet_properties: Option<VnetProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copy_compute_scale_properties: Option<CopyComputeScaleProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_external_compute_scale_properties: Option<PipelineExternalComputeScaleProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VnetProperties {
    #[serde(rename = "vNetId", skip_serializing_if = "Option::is_none")]
    pub vnet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(rename = "publicIPs", skip_serializing_if = "Option::is_none")]
    pub public_ips: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyComputeScaleProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_integration_unit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_live: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineExternalComputeScaleProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_live: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_pipeline_nodes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_external_nodes: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerVirtualNetwork {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
}

// =============================================================================
// SSIS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SsisProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_info: Option<CatalogInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_setup_script_properties: Option<CustomSetupScriptProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_proxy_properties: Option<DataProxyProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub express_custom_setup_properties: Option<Vec<CustomSetup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_stores: Option<Vec<PackageStore>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<CredentialReference>,
}

/// SSISDB catalog; `catalogPricingTier` also carries the elastic pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_server_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_admin_user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_admin_password: Option<Secret>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_pricing_tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dual_standby_pair_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSetupScriptProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_container_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sas_token: Option<Secret>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataProxyProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_via: Option<EntityReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_linked_service: Option<EntityReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageStore {
    pub name: String,
    pub package_store_linked_service: EntityReference,
}

pub const INTEGRATION_RUNTIME_REFERENCE: &str = "IntegrationRuntimeReference";
pub const LINKED_SERVICE_REFERENCE: &str = "LinkedServiceReference";
pub const CREDENTIAL_REFERENCE: &str = "CredentialReference";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_name: Option<String>,
}

impl EntityReference {
    pub fn new(kind: &str, name: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.to_string()),
            reference_name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialReference {
    #[serde(rename = "type")]
    pub kind: String,
    pub reference_name: String,
}

// =============================================================================
// Secrets
// =============================================================================

/// Secret given inline or by reference to a Key Vault linked service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Secret {
    SecureString(SecureString),
    AzureKeyVaultSecret(KeyVaultSecretReference),
}

impl Secret {
    pub fn secure_string(value: impl Into<String>) -> Self {
        Secret::SecureString(SecureString {
            value: value.into(),
        })
    }

    pub fn key_vault_reference(&self) -> Option<&KeyVaultSecretReference> {
        match self {
            Secret::AzureKeyVaultSecret(reference) => Some(reference),
            Secret::SecureString(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecureString {
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyVaultSecretReference {
    pub store: LinkedServiceReference,
    pub secret_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedServiceReference {
    #[serde(rename = "type")]
    pub kind: String,
    pub reference_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<HashMap<String, serde_json::Value>>,
}

// =============================================================================
// Express Custom Setup
// =============================================================================

/// One step of an express custom setup, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CustomSetup {
    EnvironmentVariableSetup {
        #[serde(rename = "typeProperties")]
        type_properties: EnvironmentVariableSetupProperties,
    },
    AzPowerShellSetup {
        #[serde(rename = "typeProperties")]
        type_properties: AzPowerShellSetupProperties,
    },
    ComponentSetup {
        #[serde(rename = "typeProperties")]
        type_properties: ComponentSetupProperties,
    },
    CmdkeySetup {
        #[serde(rename = "typeProperties")]
        type_properties: CmdkeySetupProperties,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVariableSetupProperties {
    pub variable_name: String,
    pub variable_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AzPowerShellSetupProperties {
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSetupProperties {
    pub component_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_key: Option<Secret>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CmdkeySetupProperties {
    pub target_name: String,
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret>,
}
