// [libs/domain/models/src/lib.rs]
/*!
 * =================================================================
 * APARATO: MODELOS DE DOMINIO DEL PLANO DE CONTROL (V1.0)
 * CLASIFICACIÓN: DOMAIN LAYER (ESTRATO L2)
 * RESPONSABILIDAD: ENTIDADES PLANAS, NAVEGABLES POR ID, SIN GRAFOS CÍCLICOS
 *
 * Siguiendo la bandera de rediseño de la especificación ("cyclic references
 * between EdgeDevice, MinerSecret and HostingMiner"), ninguna entidad aquí
 * contiene referencias a objetos vivos de otra: todas navegan por id y son
 * resueltas mediante el repositorio correspondiente en `fleetctl-infra-db`.
 * =================================================================
 */

pub mod audit;
pub mod command;
pub mod device;
pub mod gate;
pub mod miner;
pub mod scan;
pub mod secret;
pub mod telemetry;

pub use audit::{AuditResult, DeviceAuditEvent};
pub use command::{CommandRecord, CommandStatus, TargetResult, TargetStatus};
pub use device::{DeviceStatus, EdgeDevice};
pub use gate::{check_capability, AuthContext, GateDenial};
pub use miner::{CapabilityLevel, HostingMiner, IpEncryptionMode};
pub use scan::{DiscoveredMinerRecord, IpScanJob, ScanJobStatus};
pub use secret::MinerSecret;
pub use telemetry::{DailyRow, History5MinRow, HistoryResolution, LiveSnapshot, RawReading};
