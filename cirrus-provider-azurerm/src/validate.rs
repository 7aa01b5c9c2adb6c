//! Validation functions for Azure naming rules and value formats

use std::net::Ipv4Addr;

use cirrus_core::schema::{AttributeType, types};

pub fn resource_group_name() -> AttributeType {
    types::string_with("ResourceGroupName", |value| {
        if value.is_empty() || value.len() > 90 {
            return Err(format!(
                "resource group name must be between 1 and 90 characters, got {}",
                value.len()
            ));
        }
        if value.ends_with('.') {
            return Err("resource group name cannot end with a period".to_string());
        }
        let valid = value
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '(' | ')'));
        if !valid {
            return Err(format!(
                "resource group name can only contain alphanumeric characters, periods, underscores, hyphens and parenthesis, got {:?}",
                value
            ));
        }
        Ok(())
    })
}

/// Name of a Machine Learning workspace (hubs included)
pub fn workspace_name() -> AttributeType {
    types::string_matches(
        "WorkspaceName",
        r"^[a-zA-Z0-9][\w-]{2,32}$",
        "workspace name must be between 3 and 33 characters, start with an alphanumeric character and contain only alphanumerics, underscores and hyphens",
    )
}

pub fn data_store_name() -> AttributeType {
    types::string_matches(
        "DataStoreName",
        r"^[a-zA-Z0-9_]{1,255}$",
        "datastore name can only contain alphanumerics and underscores and be at most 255 characters",
    )
}

pub fn integration_runtime_name() -> AttributeType {
    types::string_matches(
        "IntegrationRuntimeName",
        r"^([a-zA-Z0-9](-|-?[a-zA-Z0-9]+)+[a-zA-Z0-9])$",
        "Invalid name for Managed Integration Runtime: minimum 3 characters, must start and end with a number or a letter, may only consist of letters, numbers and dashes and no consecutive dashes.",
    )
}

pub fn elastic_pool_name() -> AttributeType {
    types::string_matches(
        "ElasticPoolName",
        r"^[^<>*%&:\\/?]{0,127}[^\s.<>*%&:\\/?]$",
        "elastic pool name cannot contain <>*%&:\\/? or end with a period or whitespace, and must be at most 128 characters",
    )
}

/// Names of NetApp accounts, vaults, policies and quota rules
pub fn netapp_name() -> AttributeType {
    types::string_matches(
        "NetAppName",
        r"^[a-zA-Z0-9][-_\da-zA-Z]{0,63}$",
        "name must start with an alphanumeric character, contain only alphanumerics, underscores and hyphens, and be at most 64 characters",
    )
}

/// Relative name of a private DNS record set ("@" is the zone apex)
pub fn record_set_name() -> AttributeType {
    types::string_with("RecordSetName", |value| {
        if value.is_empty() || value.len() > 253 {
            return Err("record set name must be between 1 and 253 characters".to_string());
        }
        if value.ends_with('.') {
            return Err("record set name cannot end with a period".to_string());
        }
        Ok(())
    })
}

pub fn ipv4_address() -> AttributeType {
    types::string_with("IPv4Address", |value| {
        value
            .parse::<Ipv4Addr>()
            .map(|_| ())
            .map_err(|_| format!("expected an IPv4 address, got {:?}", value))
    })
}

/// 24-hour clock time, e.g. "08:30"
pub fn time_of_day() -> AttributeType {
    types::string_matches(
        "TimeOfDay",
        r"^([01]\d|2[0-3]):[0-5]\d$",
        "expected a time in the format HH:MM",
    )
}

pub fn day_of_week() -> AttributeType {
    types::string_in_slice(&[
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
        "Sunday",
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_core::resource::Value;

    fn check(t: &AttributeType, value: &str) -> bool {
        t.validate(&Value::string(value)).is_ok()
    }

    #[test]
    fn test_resource_group_name() {
        let t = resource_group_name();
        assert!(check(&t, "my-rg_(1)"));
        assert!(!check(&t, ""));
        assert!(!check(&t, "rg."));
        assert!(!check(&t, "rg/1"));
        assert!(!check(&t, &"a".repeat(91)));
    }

    #[test]
    fn test_integration_runtime_name() {
        let t = integration_runtime_name();
        assert!(check(&t, "ssis-ir1"));
        assert!(!check(&t, "ab"));
        assert!(!check(&t, "a--b"));
        assert!(!check(&t, "-abc"));
        assert!(!check(&t, "abc-"));
    }

    #[test]
    fn test_workspace_name() {
        let t = workspace_name();
        assert!(check(&t, "hub-01"));
        assert!(!check(&t, "_hub"));
        assert!(!check(&t, "ab"));
    }

    #[test]
    fn test_elastic_pool_name() {
        let t = elastic_pool_name();
        assert!(check(&t, "pool1"));
        assert!(!check(&t, "pool."));
        assert!(!check(&t, "po?ol"));
    }

    #[test]
    fn test_ipv4_and_time() {
        assert!(check(&ipv4_address(), "10.0.0.4"));
        assert!(!check(&ipv4_address(), "10.0.0.256"));
        assert!(check(&time_of_day(), "23:59"));
        assert!(!check(&time_of_day(), "24:00"));
        assert!(!check(&time_of_day(), "8:00"));
    }

    #[test]
    fn test_netapp_name() {
        let t = netapp_name();
        assert!(check(&t, "vault_1"));
        assert!(!check(&t, "-vault"));
    }
}
