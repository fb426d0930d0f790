// [apps/control-plane/src/handlers/mod.rs]
pub mod commands;
pub mod devices;
pub mod miners;
pub mod scan;
pub mod secrets;
pub mod telemetry;
