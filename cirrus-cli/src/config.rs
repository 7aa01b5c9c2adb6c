//! The `cirrus.json` configuration file

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use cirrus_core::resource::{Resource, ResourceId, attributes_from_json};
use cirrus_provider_azurerm::ProviderConfig;
use cirrus_state::{BackendConfig, LocalBackend};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CirrusConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceConfig {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl CirrusConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let mut config = Self::parse(&content)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;

        let base_dir = path.parent().unwrap_or(Path::new("."));
        config.backend = resolve_backend_path(config.backend, base_dir);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        serde_json::from_str(content).map_err(|e| e.to_string())
    }

    /// Declared resources; addresses must be unique
    pub fn resources(&self) -> Result<Vec<Resource>, String> {
        let mut seen = HashSet::new();
        let mut resources = Vec::with_capacity(self.resources.len());

        for r in &self.resources {
            let id = ResourceId::new(&r.resource_type, &r.name);
            if r.name.is_empty() || r.name.contains('.') {
                return Err(format!(
                    "{}: resource names must be non-empty and must not contain '.'",
                    id
                ));
            }
            if !seen.insert(id.clone()) {
                return Err(format!("{} is declared more than once", id));
            }
            resources.push(Resource {
                id,
                attributes: attributes_from_json(&r.attributes),
            });
        }
        Ok(resources)
    }
}

/// Local state paths are relative to the configuration file
fn resolve_backend_path(mut backend: BackendConfig, base_dir: &Path) -> BackendConfig {
    if backend.backend_type != "local" {
        return backend;
    }
    let path = PathBuf::from(
        backend
            .get_string("path")
            .unwrap_or(LocalBackend::DEFAULT_STATE_FILE),
    );
    if path.is_relative() {
        backend.attributes.insert(
            "path".to_string(),
            serde_json::Value::String(base_dir.join(path).to_string_lossy().into_owned()),
        );
    }
    backend
}
