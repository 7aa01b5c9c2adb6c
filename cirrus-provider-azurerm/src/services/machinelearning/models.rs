use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::Identity;

// =============================================================================
// Workspaces
// =============================================================================

/// A Machine Learning workspace, of which a hub is one kind
///
/// Untyped fields round-trip through `other` so an update can write back
/// exactly what was read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<WorkspaceProperties>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_vault: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_insights: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_registry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_network_access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hbi_workspace: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_user_assigned_identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionProperty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_network: Option<ManagedNetworkSettings>,
    #[serde(rename = "discoveryUrl", skip_serializing_if = "Option::is_none")]
    pub discovery_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

pub const ENCRYPTION_ENABLED: &str = "Enabled";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionProperty {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityForCmk>,
    pub key_vault_properties: EncryptionKeyVaultProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityForCmk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_assigned_identity: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionKeyVaultProperties {
    pub key_vault_arm_id: String,
    pub key_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_client_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedNetworkSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isolation_mode: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Query options for deleting a workspace
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    pub force_to_purge: Option<bool>,
}

impl crate::client::QueryOptions for DeleteOptions {
    fn to_query(&self) -> Vec<(String, String)> {
        self.force_to_purge
            .map(|purge| vec![("forceToPurge".to_string(), purge.to_string())])
            .unwrap_or_default()
    }
}

// =============================================================================
// Datastores
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datastore {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub properties: DatastoreProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatastoreProperties {
    pub datastore_type: String,
    pub account_name: String,
    pub filesystem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_data_access_auth_identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
    pub credentials: DatastoreCredentials,
    /// Read only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "credentialsType")]
pub enum DatastoreCredentials {
    None,
    #[serde(rename_all = "camelCase")]
    ServicePrincipal {
        tenant_id: String,
        client_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        authority_url: Option<String>,
        /// Never returned by the API
        #[serde(skip_serializing_if = "Option::is_none")]
        secrets: Option<ServicePrincipalSecrets>,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "secretsType")]
pub enum ServicePrincipalSecrets {
    #[serde(rename_all = "camelCase")]
    ServicePrincipal { client_secret: String },
}
