// [libs/domain/models/src/secret.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sobre cifrado guardado por el cloud para un par `(miner_id, device_id)`.
/// Identidad única: cada miner tiene a lo sumo un secreto por dispositivo
/// destino. `counter` debe crecer estrictamente en cada actualización;
/// escrituras con `key_version` distinto al del dispositivo se rechazan
/// (ver `fleetctl-infra-db::secret_repository`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerSecret {
    pub miner_id: i64,
    pub device_id: i64,
    pub encrypted_payload: String,
    pub wrapped_dek: String,
    pub nonce: String,
    pub aad: Value,
    pub counter: i64,
    pub schema_version: i32,
    pub key_version: i32,
    pub created_at: DateTime<Utc>,
}
