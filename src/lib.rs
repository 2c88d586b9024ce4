// Library root — exposes the reporter layer for integration tests and embedders.
// The binary entry point is src/main.rs.

pub mod agent;
pub mod check;
pub mod config;
pub mod error;
pub mod fields;
pub mod json;
pub mod logger;
pub mod report;
pub mod reporter;
pub mod service;
