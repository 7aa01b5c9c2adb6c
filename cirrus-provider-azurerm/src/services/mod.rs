//! One module per Azure service, each exposing its managed resources

pub mod datafactory;
pub mod loganalytics;
pub mod machinelearning;
pub mod mssql;
pub mod netapp;
pub mod privatedns;
