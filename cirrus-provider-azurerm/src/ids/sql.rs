use super::resource_id;

resource_id! {
    /// SQL managed instance
    ManagedInstanceId, "SQL Managed Instance" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.Sql/managedInstances" => managed_instance_name: "Managed Instance Name",
    }
}

resource_id! {
    /// Start/stop schedule of a SQL managed instance
    ManagedInstanceStartStopScheduleId, "Managed Instance Start Stop Schedule" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.Sql/managedInstances" => managed_instance_name: "Managed Instance Name",
        "startStopSchedules" => start_stop_schedule_name: "Start Stop Schedule Name",
    }
}

impl ManagedInstanceId {
    pub fn start_stop_schedule(&self, name: impl Into<String>) -> ManagedInstanceStartStopScheduleId {
        ManagedInstanceStartStopScheduleId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.managed_instance_name,
            name,
        )
    }
}

impl ManagedInstanceStartStopScheduleId {
    pub fn managed_instance_id(&self) -> ManagedInstanceId {
        ManagedInstanceId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.managed_instance_name,
        )
    }
}
