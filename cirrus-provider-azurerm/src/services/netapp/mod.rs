//! Azure NetApp Files

mod backup_policy;
mod backup_vault;
mod models;
mod volume_quota_rule;

pub use backup_policy::BackupPolicyResource;
pub use backup_vault::BackupVaultResource;
pub use volume_quota_rule::VolumeQuotaRuleResource;

use crate::resources::AzureResource;

pub const API_VERSION: &str = "2025-01-01";

pub fn resources() -> Vec<Box<dyn AzureResource>> {
    vec![
        Box::new(BackupVaultResource),
        Box::new(BackupPolicyResource),
        Box::new(VolumeQuotaRuleResource),
    ]
}
