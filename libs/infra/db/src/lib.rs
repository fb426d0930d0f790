/*!
 * =================================================================
 * APARATO: PERSISTENCIA SOBERANA DEL PLANO DE CONTROL (V1.0)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: DISPOSITIVOS, SECRETOS, MINERS, TELEMETRÍA DE CUATRO
 * CAPAS, COMANDOS Y AUDITORÍA SOBRE libSQL/TURSO
 *
 * `DbClient` es el único punto de entrada de conexión; cada repositorio
 * lo envuelve y expone sólo las operaciones que su agregado permite.
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::DbClient;
pub use errors::DbError;
pub use repositories::{
    AuditRepository, CommandRepository, DeviceRepository, MinerRepository, ScanRepository, SecretRepository,
    TelemetryRepository, UnifiedHistory,
};
