pub mod config;
pub mod reservation;
pub mod service;
pub mod telemetry;
