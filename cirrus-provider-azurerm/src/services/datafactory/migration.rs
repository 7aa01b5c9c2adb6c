use cirrus_core::provider::ProviderResult;

use crate::ids::IntegrationRuntimeId;
use crate::resources::{Attributes, StateUpgrader, parse_error, set};

/// Version 0 addressed the factory by `data_factory_name` and
/// `resource_group_name`, and stored IDs with a lowercase `integrationruntimes`
pub struct IntegrationRuntimeAzureSsisV0ToV1;

impl StateUpgrader for IntegrationRuntimeAzureSsisV0ToV1 {
    fn from_version(&self) -> u32 {
        0
    }

    fn upgrade(
        &self,
        identifier: &str,
        mut attrs: Attributes,
    ) -> ProviderResult<(String, Attributes)> {
        let id = IntegrationRuntimeId::parse_insensitively(identifier).map_err(parse_error)?;

        attrs.remove("data_factory_name");
        attrs.remove("resource_group_name");
        set(&mut attrs, "data_factory_id", id.factory_id().id());
        Ok((id.id(), attrs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_core::resource::Value;

    #[test]
    fn replaces_name_fields_with_factory_id() {
        let mut attrs = Attributes::new();
        set(&mut attrs, "name", "ssis-ir1");
        set(&mut attrs, "data_factory_name", "df1");
        set(&mut attrs, "resource_group_name", "etl");

        let (id, attrs) = IntegrationRuntimeAzureSsisV0ToV1
            .upgrade(
                "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/etl/providers/Microsoft.DataFactory/factories/df1/integrationruntimes/ssis-ir1",
                attrs,
            )
            .unwrap();

        assert_eq!(
            id,
            "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/etl/providers/Microsoft.DataFactory/factories/df1/integrationRuntimes/ssis-ir1"
        );
        assert_eq!(
            attrs["data_factory_id"],
            Value::string(
                "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/etl/providers/Microsoft.DataFactory/factories/df1"
            )
        );
        assert!(!attrs.contains_key("data_factory_name"));
        assert!(!attrs.contains_key("resource_group_name"));
        assert_eq!(attrs["name"], Value::string("ssis-ir1"));
    }

    #[test]
    fn rejects_other_ids() {
        let result = IntegrationRuntimeAzureSsisV0ToV1.upgrade(
            "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/etl",
            Attributes::new(),
        );
        assert!(result.is_err());
    }
}
