//! Log Analytics

mod cluster_customer_managed_key;
mod migration;
mod models;

pub use cluster_customer_managed_key::ClusterCustomerManagedKeyResource;

use crate::resources::AzureResource;

pub const API_VERSION: &str = "2022-10-01";

pub fn resources() -> Vec<Box<dyn AzureResource>> {
    vec![Box::new(ClusterCustomerManagedKeyResource)]
}
