use super::resource_id;

resource_id! {
    /// Data Factory
    FactoryId, "Data Factory" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.DataFactory/factories" => factory_name: "Factory Name",
    }
}

resource_id! {
    /// Integration runtime of a Data Factory
    IntegrationRuntimeId, "Integration Runtime" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.DataFactory/factories" => factory_name: "Factory Name",
        "integrationRuntimes" => integration_runtime_name: "Integration Runtime Name",
    }
}

impl FactoryId {
    pub fn integration_runtime(&self, name: impl Into<String>) -> IntegrationRuntimeId {
        IntegrationRuntimeId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.factory_name,
            name,
        )
    }
}

impl IntegrationRuntimeId {
    pub fn factory_id(&self) -> FactoryId {
        FactoryId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.factory_name,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_lowercase_segment_needs_insensitive_parse() {
        let legacy = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.DataFactory/factories/df/integrationruntimes/ssis";
        assert!(IntegrationRuntimeId::parse(legacy).is_err());

        let id = IntegrationRuntimeId::parse_insensitively(legacy).unwrap();
        assert_eq!(
            id.id(),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.DataFactory/factories/df/integrationRuntimes/ssis"
        );
        assert_eq!(id.factory_id().integration_runtime("ssis"), id);
    }
}
