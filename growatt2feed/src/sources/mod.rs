pub mod fake;
pub mod telemetry;
