pub mod config;
pub mod error;
pub mod notices;
pub mod telemetry;
