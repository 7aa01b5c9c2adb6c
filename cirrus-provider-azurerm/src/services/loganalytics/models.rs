use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A Log Analytics cluster
///
/// Only the fields the key resource touches are typed, everything else is
/// carried through unchanged when the cluster is written back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<ClusterProperties>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_vault_properties: Option<KeyVaultProperties>,
    /// Read only, rejected by the API when sent back
    #[serde(skip_serializing_if = "Option::is_none")]
    pub associated_workspaces: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyVaultProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_vault_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_version: Option<String>,
}

impl KeyVaultProperties {
    pub fn has_key(&self) -> bool {
        self.key_name.as_deref().is_some_and(|name| !name.is_empty())
    }
}
