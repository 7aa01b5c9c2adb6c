//! Azure Data Factory

mod integration_runtime_azure_ssis;
mod migration;
mod models;

pub use integration_runtime_azure_ssis::IntegrationRuntimeAzureSsisResource;

use crate::resources::AzureResource;

pub const API_VERSION: &str = "2018-06-01";

pub fn resources() -> Vec<Box<dyn AzureResource>> {
    vec![Box::new(IntegrationRuntimeAzureSsisResource)]
}
