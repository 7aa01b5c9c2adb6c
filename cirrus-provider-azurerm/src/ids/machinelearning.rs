use super::resource_id;

resource_id! {
    /// Machine Learning workspace
    WorkspaceId, "Machine Learning Workspace" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.MachineLearningServices/workspaces" => workspace_name: "Workspace Name",
    }
}

resource_id! {
    /// Datastore within a Machine Learning workspace
    DataStoreId, "Machine Learning Datastore" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.MachineLearningServices/workspaces" => workspace_name: "Workspace Name",
        "datastores" => data_store_name: "Data Store Name",
    }
}

impl WorkspaceId {
    pub fn data_store(&self, name: impl Into<String>) -> DataStoreId {
        DataStoreId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.workspace_name,
            name,
        )
    }
}

impl DataStoreId {
    pub fn workspace_id(&self) -> WorkspaceId {
        WorkspaceId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.workspace_name,
        )
    }
}
