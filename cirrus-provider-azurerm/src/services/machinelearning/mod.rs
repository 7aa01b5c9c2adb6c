//! Machine Learning services

mod ai_foundry;
mod datastore_datalake_gen2;
mod models;

pub use ai_foundry::AiFoundryResource;
pub use datastore_datalake_gen2::DatastoreDataLakeGen2Resource;

use crate::resources::AzureResource;

pub const API_VERSION: &str = "2025-06-01";

pub fn resources() -> Vec<Box<dyn AzureResource>> {
    vec![
        Box::new(AiFoundryResource),
        Box::new(DatastoreDataLakeGen2Resource),
    ]
}
