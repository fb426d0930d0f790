// [libs/domain/models/src/scan.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Registro persistido de un escaneo de rango IP (spec §3). El trabajo en
/// memoria vivo (progreso atómico, cancelación cooperativa) vive en
/// `fleetctl-infra-discovery::ScanSession`; esta fila es su proyección
/// durable para consulta por el operador.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpScanJob {
    pub id: String,
    pub site_id: i64,
    /// Dispositivo que reclamó este job (spec §4.3: "picked up by an
    /// edge"). `None` hasta que un edge lo reclama vía `claim_pending`.
    pub device_id: Option<i64>,
    pub ip_range_start: String,
    pub ip_range_end: String,
    pub total_ips: i64,
    pub scanned_ips: i64,
    pub discovered_miners: i64,
    pub status: ScanJobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Identidad única: `(scan_job_id, ip_address)`. `is_imported` es una
/// transición de sentido único `false -> true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredMinerRecord {
    pub scan_job_id: String,
    pub ip_address: String,
    pub detected_model: String,
    pub detected_type: String,
    pub is_imported: bool,
    pub imported_miner_id: Option<i64>,
    pub discovered_at: DateTime<Utc>,
}
