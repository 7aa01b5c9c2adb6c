//! IDs shared across services

use super::resource_id;

resource_id! {
    /// Subscription
    SubscriptionId, "Subscription" {
        "subscriptions" => subscription_id: "Subscription",
    }
}

resource_id! {
    /// Resource group
    ResourceGroupId, "Resource Group" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
    }
}

resource_id! {
    VirtualNetworkId, "Virtual Network" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.Network/virtualNetworks" => virtual_network_name: "Virtual Network Name",
    }
}

resource_id! {
    SubnetId, "Subnet" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.Network/virtualNetworks" => virtual_network_name: "Virtual Network Name",
        "subnets" => subnet_name: "Subnet Name",
    }
}

resource_id! {
    PublicIpAddressId, "Public IP Address" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.Network/publicIPAddresses" => public_ip_address_name: "Public IP Address Name",
    }
}

resource_id! {
    KeyVaultId, "Key Vault" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.KeyVault/vaults" => vault_name: "Vault Name",
    }
}

resource_id! {
    StorageAccountId, "Storage Account" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.Storage/storageAccounts" => storage_account_name: "Storage Account Name",
    }
}

resource_id! {
    /// Storage container in its Resource Manager form
    StorageContainerId, "Storage Container" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.Storage/storageAccounts" => storage_account_name: "Storage Account Name",
        "blobServices/default/containers" => container_name: "Container Name",
    }
}

resource_id! {
    UserAssignedIdentityId, "User Assigned Identity" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.ManagedIdentity/userAssignedIdentities" => identity_name: "Identity Name",
    }
}

resource_id! {
    ApplicationInsightsId, "Application Insights" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.Insights/components" => component_name: "Component Name",
    }
}

resource_id! {
    ContainerRegistryId, "Container Registry" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.ContainerRegistry/registries" => registry_name: "Registry Name",
    }
}

impl SubnetId {
    pub fn virtual_network_id(&self) -> VirtualNetworkId {
        VirtualNetworkId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.virtual_network_name,
        )
    }
}

impl StorageContainerId {
    pub fn storage_account_id(&self) -> StorageAccountId {
        StorageAccountId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.storage_account_name,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_container_uses_blob_services_segment() {
        let id = StorageContainerId::new("sub", "rg", "acct", "data");
        assert_eq!(
            id.id(),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/acct/blobServices/default/containers/data"
        );
        assert_eq!(StorageContainerId::parse(&id.id()).unwrap(), id);
        assert_eq!(id.storage_account_id().storage_account_name, "acct");
    }

    #[test]
    fn subnet_parent() {
        let id = SubnetId::parse(
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/vnet/subnets/default",
        )
        .unwrap();
        assert_eq!(id.virtual_network_id().virtual_network_name, "vnet");
    }

    #[test]
    fn wrong_provider_is_rejected() {
        let err = KeyVaultId::parse(
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/acct",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Microsoft.KeyVault"));
    }
}
