//! SQL Managed Instance

mod models;
mod start_stop_schedule;

pub use start_stop_schedule::ManagedInstanceStartStopScheduleResource;

use crate::resources::AzureResource;

pub const API_VERSION: &str = "2023-08-01-preview";

pub fn resources() -> Vec<Box<dyn AzureResource>> {
    vec![Box::new(ManagedInstanceStartStopScheduleResource)]
}
