// [apps/control-plane/src/state.rs]
/*!
 * =================================================================
 * APARATO: ESTADO COMPARTIDO DEL PLANO DE CONTROL (V1.0)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: INYECCIÓN DE REPOSITORIOS EN CADA HANDLER AXUM
 * =================================================================
 */

use fleetctl_infra_db::{
    AuditRepository, CommandRepository, DbClient, DeviceRepository, MinerRepository, ScanRepository,
    SecretRepository, TelemetryRepository,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: DbClient,
    pub devices: Arc<DeviceRepository>,
    pub miners: Arc<MinerRepository>,
    pub secrets: Arc<SecretRepository>,
    pub scans: Arc<ScanRepository>,
    pub telemetry: Arc<TelemetryRepository>,
    pub commands: Arc<CommandRepository>,
    pub audit: Arc<AuditRepository>,
}

impl AppState {
    pub fn new(db: DbClient) -> Self {
        Self {
            devices: Arc::new(DeviceRepository::new(db.clone())),
            miners: Arc::new(MinerRepository::new(db.clone())),
            secrets: Arc::new(SecretRepository::new(db.clone())),
            scans: Arc::new(ScanRepository::new(db.clone())),
            telemetry: Arc::new(TelemetryRepository::new(db.clone())),
            commands: Arc::new(CommandRepository::new(db.clone())),
            audit: Arc::new(AuditRepository::new(db.clone())),
            db,
        }
    }
}
