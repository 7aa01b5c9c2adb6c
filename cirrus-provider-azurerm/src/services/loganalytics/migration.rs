use cirrus_core::provider::ProviderResult;

use crate::ids::LogAnalyticsClusterId;
use crate::resources::{Attributes, StateUpgrader, parse_error, set};

/// Version 0 identified the key as `<cluster id>/CMK`
pub struct ClusterCustomerManagedKeyV0ToV1;

const LEGACY_SUFFIX: &str = "/cmk";

impl StateUpgrader for ClusterCustomerManagedKeyV0ToV1 {
    fn from_version(&self) -> u32 {
        0
    }

    fn upgrade(
        &self,
        identifier: &str,
        mut attrs: Attributes,
    ) -> ProviderResult<(String, Attributes)> {
        let trimmed = identifier.trim_end_matches('/');
        let cluster = match trimmed.len().checked_sub(LEGACY_SUFFIX.len()) {
            Some(split)
                if trimmed.is_char_boundary(split)
                    && trimmed[split..].eq_ignore_ascii_case(LEGACY_SUFFIX) =>
            {
                &trimmed[..split]
            }
            _ => trimmed,
        };

        let id = LogAnalyticsClusterId::parse_insensitively(cluster).map_err(parse_error)?;
        set(&mut attrs, "log_analytics_cluster_id", id.id());
        Ok((id.id(), attrs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_core::resource::Value;

    const CLUSTER: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/logs/providers/Microsoft.OperationalInsights/clusters/cluster1";

    #[test]
    fn strips_legacy_suffix() {
        let legacy = format!("{}/CMK", CLUSTER.replace("resourceGroups", "resourcegroups"));
        let (id, attrs) = ClusterCustomerManagedKeyV0ToV1
            .upgrade(&legacy, Attributes::new())
            .unwrap();
        assert_eq!(id, CLUSTER);
        assert_eq!(attrs["log_analytics_cluster_id"], Value::string(CLUSTER));
    }

    #[test]
    fn accepts_ids_without_suffix() {
        let (id, _) = ClusterCustomerManagedKeyV0ToV1
            .upgrade(CLUSTER, Attributes::new())
            .unwrap();
        assert_eq!(id, CLUSTER);
    }

    #[test]
    fn rejects_other_ids() {
        let result = ClusterCustomerManagedKeyV0ToV1.upgrade(
            "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/logs/CMK",
            Attributes::new(),
        );
        assert!(result.is_err());
    }
}
