// [libs/core/miner-proto/src/lib.rs]
//! Cliente TCP endurecido para la API de control CGMiner (C1).
//!
//! Capa L1 pura: no conoce bases de datos, adaptadores ni el
//! protocolo edge-cloud. Sólo sabe hablar con un firmware CGMiner real.

pub mod client;
pub mod errors;
pub mod telemetry;

pub use client::{MinerProtoClient, ALLOWED_COMMANDS, CONTROL_COMMANDS, DEFAULT_PORT};
pub use errors::MinerProtoError;
pub use telemetry::{get_normalized_telemetry, quick_probe, MinerOnlineStatus, QuickProbeResult, TelemetryRecord};
