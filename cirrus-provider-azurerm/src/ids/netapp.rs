use super::resource_id;

resource_id! {
    NetAppAccountId, "NetApp Account" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.NetApp/netAppAccounts" => net_app_account_name: "Net App Account Name",
    }
}

resource_id! {
    NetAppVolumeId, "NetApp Volume" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.NetApp/netAppAccounts" => net_app_account_name: "Net App Account Name",
        "capacityPools" => capacity_pool_name: "Capacity Pool Name",
        "volumes" => volume_name: "Volume Name",
    }
}

resource_id! {
    NetAppBackupVaultId, "NetApp Backup Vault" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.NetApp/netAppAccounts" => net_app_account_name: "Net App Account Name",
        "backupVaults" => backup_vault_name: "Backup Vault Name",
    }
}

resource_id! {
    NetAppBackupPolicyId, "NetApp Backup Policy" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.NetApp/netAppAccounts" => net_app_account_name: "Net App Account Name",
        "backupPolicies" => backup_policy_name: "Backup Policy Name",
    }
}

resource_id! {
    VolumeQuotaRuleId, "NetApp Volume Quota Rule" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.NetApp/netAppAccounts" => net_app_account_name: "Net App Account Name",
        "capacityPools" => capacity_pool_name: "Capacity Pool Name",
        "volumes" => volume_name: "Volume Name",
        "volumeQuotaRules" => volume_quota_rule_name: "Volume Quota Rule Name",
    }
}

impl NetAppAccountId {
    pub fn backup_vault(&self, name: impl Into<String>) -> NetAppBackupVaultId {
        NetAppBackupVaultId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.net_app_account_name,
            name,
        )
    }

    pub fn backup_policy(&self, name: impl Into<String>) -> NetAppBackupPolicyId {
        NetAppBackupPolicyId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.net_app_account_name,
            name,
        )
    }
}

impl NetAppVolumeId {
    pub fn quota_rule(&self, name: impl Into<String>) -> VolumeQuotaRuleId {
        VolumeQuotaRuleId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.net_app_account_name,
            &self.capacity_pool_name,
            &self.volume_name,
            name,
        )
    }
}

impl VolumeQuotaRuleId {
    pub fn volume_id(&self) -> NetAppVolumeId {
        NetAppVolumeId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.net_app_account_name,
            &self.capacity_pool_name,
            &self.volume_name,
        )
    }
}

impl NetAppBackupVaultId {
    pub fn account_id(&self) -> NetAppAccountId {
        NetAppAccountId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.net_app_account_name,
        )
    }
}

impl NetAppBackupPolicyId {
    pub fn account_id(&self) -> NetAppAccountId {
        NetAppAccountId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.net_app_account_name,
        )
    }
}
