use super::resource_id;

resource_id! {
    /// Log Analytics cluster
    LogAnalyticsClusterId, "Log Analytics Cluster" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.OperationalInsights/clusters" => cluster_name: "Cluster Name",
    }
}
