// [libs/infra/db/src/repositories/mod.rs]
pub mod audit_repository;
pub mod command_repository;
pub mod device_repository;
pub mod miner_repository;
pub mod scan_repository;
pub mod secret_repository;
pub mod telemetry_repository;

pub use audit_repository::AuditRepository;
pub use command_repository::CommandRepository;
pub use device_repository::DeviceRepository;
pub use miner_repository::MinerRepository;
pub use scan_repository::ScanRepository;
pub use secret_repository::SecretRepository;
pub use telemetry_repository::{TelemetryRepository, UnifiedHistory};
