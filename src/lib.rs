pub mod api;
pub mod clients;
pub mod config;
pub mod domain;
pub mod orchestrator;
pub mod store;
pub mod telemetry;
