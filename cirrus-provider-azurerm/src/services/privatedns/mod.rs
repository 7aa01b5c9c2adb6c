//! Private DNS

mod a_record;
mod models;

pub use a_record::ARecordResource;

use crate::resources::AzureResource;

pub const API_VERSION: &str = "2024-06-01";

pub fn resources() -> Vec<Box<dyn AzureResource>> {
    vec![Box::new(ARecordResource)]
}
