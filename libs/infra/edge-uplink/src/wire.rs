// [libs/infra/edge-uplink/src/wire.rs]
//! Formas on-the-wire exactas de spec §6. `fleetctl_core_envelope_crypto::SealedEnvelope`
//! ya cubre el cuerpo de un secreto individual; este módulo cubre los
//! sobres de respuesta que lo envuelven.

use fleetctl_core_envelope_crypto::SealedEnvelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct DevicePubkeyResponse {
    pub device_id: i64,
    pub public_key: String,
    pub key_version: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatResponse {
    pub last_seen_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeSecretsResponse {
    pub device_id: i64,
    pub key_version: i32,
    pub secrets: Vec<NamedEnvelope>,
    pub total: i64,
    #[serde(default)]
    pub skipped_capability: i64,
    #[serde(default)]
    pub skipped_bound: i64,
}

/// `SealedEnvelope` más el `miner_id` propietario, ya que el pull masivo
/// devuelve secretos de varios miners en un mismo array (spec §4.8
/// SUPPLEMENT: contadores `skipped_*` acompañan la respuesta).
#[derive(Debug, Clone, Deserialize)]
pub struct NamedEnvelope {
    pub miner_id: i64,
    #[serde(flatten)]
    pub envelope: SealedEnvelope,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeStatusResponse {
    pub device_id: i64,
    pub key_version: i32,
    pub secret_count: i64,
    pub last_seen_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AckReceipt {
    pub miner_id: i64,
    pub counter: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeAckRequest {
    pub receipts: Vec<AckReceipt>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeAckResponse {
    pub acknowledged: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolledCommand {
    pub command_id: String,
    pub command_type: String,
    pub payload: Value,
    pub target_ids: Vec<i64>,
    #[serde(default)]
    pub encrypted_credentials: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandPollResponse {
    pub commands: Vec<PolledCommand>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetResultWire {
    pub miner_id: i64,
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub metrics: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandAckRequest {
    pub results: Vec<TargetResultWire>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandAckResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanClaimRequest {
    pub site_id: i64,
    #[serde(default)]
    pub scan_job_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaimedScanJob {
    pub id: String,
    pub site_id: i64,
    pub ip_range_start: String,
    pub ip_range_end: String,
    pub total_ips: i64,
}

/// `None` `scan_job` means "no pending scan jobs" (spec §6); `ip_list` is
/// the cloud's own expansion of the claimed job's range, so the edge
/// never has to re-derive it.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanClaimResponse {
    #[serde(default)]
    pub scan_job: Option<ClaimedScanJob>,
    #[serde(default)]
    pub ip_list: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanProgressReport {
    pub scanned_ips: i64,
    pub discovered_miners: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResultsReport {
    pub discovered: Vec<ScanResultEntry>,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResultEntry {
    pub ip_address: String,
    pub detected_model: String,
    pub detected_type: String,
}
