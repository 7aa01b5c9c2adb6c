//! Key Vault nested item IDs (`https://<vault>/keys/<name>[/<version>]`)

use std::fmt;

use reqwest::Url;

use super::IdParseError;

const KIND: &str = "Key Vault Nested Item";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NestedItemType {
    Key,
    Secret,
    Certificate,
}

impl NestedItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NestedItemType::Key => "keys",
            NestedItemType::Secret => "secrets",
            NestedItemType::Certificate => "certificates",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "keys" => Some(NestedItemType::Key),
            "secrets" => Some(NestedItemType::Secret),
            "certificates" => Some(NestedItemType::Certificate),
            _ => None,
        }
    }
}

/// Whether a version segment must, may, or must not be present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionType {
    Versioned,
    Optional,
    Versionless,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NestedItemId {
    /// e.g. `https://example.vault.azure.net/`
    pub key_vault_base_url: String,
    pub nested_item_type: NestedItemType,
    pub name: String,
    /// Empty when the ID is versionless
    pub version: String,
}

impl NestedItemId {
    pub fn new(
        key_vault_base_url: &str,
        nested_item_type: NestedItemType,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, IdParseError> {
        let url = Url::parse(key_vault_base_url).map_err(|e| IdParseError::Invalid {
            kind: KIND,
            input: key_vault_base_url.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            key_vault_base_url: base_url(&url, key_vault_base_url)?,
            nested_item_type,
            name: name.into(),
            version: version.into(),
        })
    }

    pub fn id(&self) -> String {
        let mut out = format!(
            "{}{}/{}",
            self.key_vault_base_url,
            self.nested_item_type.as_str(),
            self.name
        );
        if !self.version.is_empty() {
            out.push('/');
            out.push_str(&self.version);
        }
        out
    }

    /// ID without the version segment
    pub fn versionless_id(&self) -> String {
        format!(
            "{}{}/{}",
            self.key_vault_base_url,
            self.nested_item_type.as_str(),
            self.name
        )
    }

    pub fn parse(input: &str, version_type: VersionType) -> Result<Self, IdParseError> {
        if input.is_empty() {
            return Err(IdParseError::Empty { kind: KIND });
        }
        let invalid = |message: String| IdParseError::Invalid {
            kind: KIND,
            input: input.to_string(),
            message,
        };

        let url = Url::parse(input).map_err(|e| invalid(e.to_string()))?;
        let base = base_url(&url, input)?;

        let segments: Vec<&str> = url.path().trim_start_matches('/').split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("the path contains an empty segment".to_string()));
        }

        let (item_type, name, version) = match (segments.as_slice(), version_type) {
            ([t, n, v], VersionType::Versioned | VersionType::Optional) => (*t, *n, *v),
            ([t, n], VersionType::Versionless | VersionType::Optional) => (*t, *n, ""),
            _ => {
                let expected = match version_type {
                    VersionType::Versioned => "/<type>/<name>/<version>",
                    VersionType::Optional => "/<type>/<name>[/<version>]",
                    VersionType::Versionless => "/<type>/<name>",
                };
                return Err(invalid(format!(
                    "expected the path to be {}, got {:?}",
                    expected,
                    url.path()
                )));
            }
        };

        let nested_item_type = NestedItemType::parse(item_type)
            .ok_or_else(|| invalid(format!("unsupported nested item type {:?}", item_type)))?;

        Ok(Self {
            key_vault_base_url: base,
            nested_item_type,
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    pub fn validate(input: &str) -> Result<(), String> {
        Self::parse(input, VersionType::Versioned)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    pub fn validate_optional_version(input: &str) -> Result<(), String> {
        Self::parse(input, VersionType::Optional)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

fn base_url(url: &Url, input: &str) -> Result<String, IdParseError> {
    let host = url.host_str().ok_or_else(|| IdParseError::Invalid {
        kind: KIND,
        input: input.to_string(),
        message: "missing the Key Vault host".to_string(),
    })?;
    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}/", url.scheme(), host, port),
        None => format!("{}://{}/", url.scheme(), host),
    })
}

impl fmt::Display for NestedItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Base URL: {:?} / Type: {:?} / Name: {:?} / Version: {:?})",
            KIND,
            self.key_vault_base_url,
            self.nested_item_type.as_str(),
            self.name,
            self.version
        )
    }
}
