//! Helpers shared by resources: location, tags, managed identity

use std::collections::HashMap;

use cirrus_core::provider::ProviderResult;
use cirrus_core::resource::Value;
use cirrus_core::schema::{AttributeSchema, AttributeType, BlockSchema, types};
use serde::{Deserialize, Serialize};

use crate::ids::{UserAssignedIdentityId, id_type};
use crate::resources::{Attributes, Attrs, parse_error, set};
use crate::validate;

// =============================================================================
// Location
// =============================================================================

/// Normalize a location (e.g., "West Europe" -> "westeurope")
pub fn normalize_location(s: &str) -> String {
    s.replace(' ', "").to_lowercase()
}

pub fn location_schema() -> AttributeSchema {
    AttributeSchema::new("location", types::string_not_empty())
        .required()
        .force_new()
        .normalized_with(normalize_location)
}

pub fn resource_group_name_schema() -> AttributeSchema {
    AttributeSchema::new("resource_group_name", validate::resource_group_name())
        .required()
        .force_new()
}

// =============================================================================
// Tags
// =============================================================================

pub fn tags_schema() -> AttributeSchema {
    AttributeSchema::new("tags", types::tags())
}

/// Tags to send, `None` when none are configured
pub fn expand_tags(attrs: Attrs<'_>) -> Option<HashMap<String, String>> {
    let tags = attrs.string_map("tags");
    if tags.is_empty() { None } else { Some(tags) }
}

pub fn flatten_tags(tags: Option<&HashMap<String, String>>) -> Value {
    Value::Map(
        tags.into_iter()
            .flatten()
            .map(|(k, v)| (k.clone(), Value::string(v)))
            .collect(),
    )
}

// =============================================================================
// Managed Identity
// =============================================================================

pub const SYSTEM_ASSIGNED: &str = "SystemAssigned";
pub const USER_ASSIGNED: &str = "UserAssigned";
pub const SYSTEM_ASSIGNED_USER_ASSIGNED: &str = "SystemAssigned, UserAssigned";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_assigned_identities: Option<HashMap<String, UserAssignedIdentityDetails>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignedIdentityDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// `identity` block accepting system and/or user assigned identities
pub fn identity_schema() -> AttributeSchema {
    let block = BlockSchema::new()
        .attribute(
            AttributeSchema::new(
                "type",
                AttributeType::enumeration(&[
                    SYSTEM_ASSIGNED,
                    USER_ASSIGNED,
                    SYSTEM_ASSIGNED_USER_ASSIGNED,
                ]),
            )
            .required(),
        )
        .attribute(AttributeSchema::new(
            "identity_ids",
            AttributeType::List(Box::new(id_type::<UserAssignedIdentityId>())),
        ))
        .attribute(AttributeSchema::new("principal_id", AttributeType::String).read_only())
        .attribute(AttributeSchema::new("tenant_id", AttributeType::String).read_only());

    AttributeSchema::new("identity", block.into_type())
        .max_items(1)
        .min_items(1)
}

/// Build the identity payload from an `identity` block
pub fn expand_identity(block: Option<Attrs<'_>>) -> ProviderResult<Option<Identity>> {
    let Some(block) = block else {
        return Ok(None);
    };
    let kind = block.require("type")?.to_string();
    let ids = block.strings("identity_ids");

    let uses_user_assigned = kind.contains(USER_ASSIGNED);
    if !uses_user_assigned && !ids.is_empty() {
        return Err(parse_error(format!(
            "`identity_ids` can only be specified when `type` includes `{}`",
            USER_ASSIGNED
        )));
    }
    if uses_user_assigned && ids.is_empty() {
        return Err(parse_error(format!(
            "`identity_ids` must be specified when `type` is {:?}",
            kind
        )));
    }

    let user_assigned_identities = if ids.is_empty() {
        None
    } else {
        let mut map = HashMap::new();
        for id in ids {
            let parsed = UserAssignedIdentityId::parse(&id).map_err(parse_error)?;
            map.insert(parsed.id(), UserAssignedIdentityDetails::default());
        }
        Some(map)
    };

    Ok(Some(Identity {
        kind,
        principal_id: None,
        tenant_id: None,
        user_assigned_identities,
    }))
}

/// Flatten an identity response into an `identity` block
pub fn flatten_identity(identity: Option<&Identity>) -> ProviderResult<Value> {
    let Some(identity) = identity.filter(|i| !i.kind.eq_ignore_ascii_case("None")) else {
        return Ok(Value::empty_list());
    };

    let mut ids = Vec::new();
    for raw in identity.user_assigned_identities.iter().flat_map(|m| m.keys()) {
        // ARM returns these IDs with inconsistent casing
        let parsed = UserAssignedIdentityId::parse_insensitively(raw).map_err(parse_error)?;
        ids.push(parsed.id());
    }
    ids.sort();

    let kind = match identity.kind.replace(' ', "").to_lowercase().as_str() {
        "systemassigned" => SYSTEM_ASSIGNED,
        "userassigned" => USER_ASSIGNED,
        _ => SYSTEM_ASSIGNED_USER_ASSIGNED,
    };

    let mut block = Attributes::new();
    set(&mut block, "type", kind);
    set(&mut block, "identity_ids", ids);
    set(
        &mut block,
        "principal_id",
        identity.principal_id.clone().unwrap_or_default(),
    );
    set(
        &mut block,
        "tenant_id",
        identity.tenant_id.clone().unwrap_or_default(),
    );
    Ok(Value::block(block))
}
