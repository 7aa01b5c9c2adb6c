//! Cirrus Core
//!
//! Core library for declarative infrastructure management: resources, schemas,
//! the provider contract, and the diff/plan/apply pipeline

pub mod differ;
pub mod effect;
pub mod interpreter;
pub mod locks;
pub mod plan;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod timeouts;
