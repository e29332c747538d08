pub mod config;
pub mod service;
pub mod store;
pub mod telemetry;
