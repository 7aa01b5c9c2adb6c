//! State file structures for persisting infrastructure state

use cirrus_core::resource::{ResourceId, State, attributes_from_json, attributes_to_json};
use serde::{Deserialize, Serialize};

/// The main state file structure that persists to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Monotonically increasing number for each state modification
    pub serial: u64,
    /// Unique identifier for this state lineage (prevents accidental overwrites)
    pub lineage: String,
    /// Version of Cirrus that last modified this state
    pub cirrus_version: String,
    /// All managed resources and their current state
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    /// Current state file format version
    pub const CURRENT_VERSION: u32 = 1;

    /// Create a new empty state file
    pub fn new() -> Self {
        Self::with_lineage(uuid::Uuid::new_v4().to_string())
    }

    /// Create a new state file with a specific lineage
    pub fn with_lineage(lineage: String) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage,
            cirrus_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
        }
    }

    /// Increment serial and update the writer version for a new state write
    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.cirrus_version = env!("CARGO_PKG_VERSION").to_string();
    }

    /// Find a resource by type and name
    pub fn find_resource(&self, resource_type: &str, name: &str) -> Option<&ResourceState> {
        self.resources
            .iter()
            .find(|r| r.resource_type == resource_type && r.name == name)
    }

    /// Find a resource mutably by type and name
    pub fn find_resource_mut(
        &mut self,
        resource_type: &str,
        name: &str,
    ) -> Option<&mut ResourceState> {
        self.resources
            .iter_mut()
            .find(|r| r.resource_type == resource_type && r.name == name)
    }

    /// Add or update a resource in the state
    pub fn upsert_resource(&mut self, resource: ResourceState) {
        if let Some(existing) = self.find_resource_mut(&resource.resource_type, &resource.name) {
            *existing = resource;
        } else {
            self.resources.push(resource);
        }
    }

    /// Remove a resource from the state
    pub fn remove_resource(&mut self, resource_type: &str, name: &str) -> Option<ResourceState> {
        let pos = self
            .resources
            .iter()
            .position(|r| r.resource_type == resource_type && r.name == name)?;
        Some(self.resources.remove(pos))
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// State of a single managed resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type (e.g., "private_dns_a_record")
    pub resource_type: String,
    /// Resource name from configuration
    pub name: String,
    /// Provider name (e.g., "azurerm")
    pub provider: String,
    /// Azure Resource Manager ID of the remote entity
    pub identifier: String,
    /// Schema version the attributes were written with
    #[serde(default)]
    pub schema_version: u32,
    /// All attributes of the resource as JSON values
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl ResourceState {
    /// Create a new resource state
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            provider: provider.into(),
            identifier: identifier.into(),
            schema_version: 0,
            attributes: serde_json::Map::new(),
        }
    }

    /// Record an observed state; `None` when the remote entity is gone
    pub fn from_state(state: &State, provider: impl Into<String>) -> Option<Self> {
        if !state.exists {
            return None;
        }
        let identifier = state.identifier.as_ref()?;
        Some(Self {
            resource_type: state.id.resource_type.clone(),
            name: state.id.name.clone(),
            provider: provider.into(),
            identifier: identifier.clone(),
            schema_version: state.schema_version,
            attributes: attributes_to_json(&state.attributes),
        })
    }

    pub fn resource_id(&self) -> ResourceId {
        ResourceId::new(&self.resource_type, &self.name)
    }

    /// Observed state as the provider reported it when it was recorded
    pub fn to_state(&self) -> State {
        State::existing(self.resource_id(), attributes_from_json(&self.attributes))
            .with_identifier(&self.identifier)
            .with_schema_version(self.schema_version)
    }

    /// Set an attribute value
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_core::resource::Value;
    use serde_json::json;

    const RECORD: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/dns/providers/Microsoft.Network/privateDnsZones/example.internal/A/www";

    #[test]
    fn test_state_file_new() {
        let state = StateFile::new();
        assert_eq!(state.version, StateFile::CURRENT_VERSION);
        assert_eq!(state.serial, 0);
        assert!(!state.lineage.is_empty());
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_state_file_increment_serial() {
        let mut state = StateFile::new();
        state.increment_serial();
        state.increment_serial();
        assert_eq!(state.serial, 2);
    }

    #[test]
    fn test_state_file_upsert_resource() {
        let mut state = StateFile::new();

        state.upsert_resource(
            ResourceState::new("private_dns_a_record", "www", "azurerm", RECORD)
                .with_attribute("ttl", json!(300)),
        );
        state.upsert_resource(
            ResourceState::new("private_dns_a_record", "www", "azurerm", RECORD)
                .with_attribute("ttl", json!(60)),
        );

        assert_eq!(state.resources.len(), 1);
        assert_eq!(state.resources[0].attributes.get("ttl"), Some(&json!(60)));
    }

    #[test]
    fn test_state_file_remove_resource() {
        let mut state = StateFile::new();
        state.upsert_resource(ResourceState::new(
            "private_dns_a_record",
            "www",
            "azurerm",
            RECORD,
        ));

        assert!(state.remove_resource("private_dns_a_record", "www").is_some());
        assert!(state.resources.is_empty());
        assert!(state.remove_resource("private_dns_a_record", "api").is_none());
    }

    #[test]
    fn test_state_conversion_keeps_identifier_and_version() {
        let observed = State::existing(
            ResourceId::new("private_dns_a_record", "www"),
            [
                ("ttl".to_string(), Value::Int(300)),
                (
                    "records".to_string(),
                    Value::List(vec![Value::string("10.0.0.4")]),
                ),
            ]
            .into_iter()
            .collect(),
        )
        .with_identifier(RECORD)
        .with_schema_version(1);

        let recorded = ResourceState::from_state(&observed, "azurerm").unwrap();
        assert_eq!(recorded.identifier, RECORD);
        assert_eq!(recorded.schema_version, 1);
        assert_eq!(recorded.attributes["records"], json!(["10.0.0.4"]));
        assert_eq!(recorded.to_state(), observed);
    }

    #[test]
    fn test_missing_state_is_not_recorded() {
        let gone = State::not_found(ResourceId::new("private_dns_a_record", "www"));
        assert!(ResourceState::from_state(&gone, "azurerm").is_none());
    }

    #[test]
    fn test_legacy_entries_default_to_version_zero() {
        let entry: ResourceState = serde_json::from_value(json!({
            "resource_type": "log_analytics_cluster_customer_managed_key",
            "name": "cmk",
            "provider": "azurerm",
            "identifier": "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/logs/providers/Microsoft.OperationalInsights/clusters/cluster1/CMK"
        }))
        .unwrap();
        assert_eq!(entry.schema_version, 0);
        assert!(entry.attributes.is_empty());
    }

    #[test]
    fn test_state_file_serialization() {
        let mut state = StateFile::new();
        state.upsert_resource(
            ResourceState::new("private_dns_a_record", "www", "azurerm", RECORD)
                .with_schema_version(1)
                .with_attribute("ttl", json!(300)),
        );

        let json = serde_json::to_string_pretty(&state).unwrap();
        let deserialized: StateFile = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.lineage, state.lineage);
        assert_eq!(deserialized.resources, state.resources);
    }
}
