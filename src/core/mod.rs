pub mod config;
pub mod metrics;
pub mod retry;
pub mod shutdown;
pub mod telemetry;
pub mod time;
