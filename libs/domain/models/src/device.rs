// [libs/domain/models/src/device.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ciclo de vida: `PENDING -> ACTIVE` en el registro; `ACTIVE -> REVOKED`
/// por acción de operador. `REVOKED` es terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceStatus {
    Pending,
    Active,
    Revoked,
}

/// El dispositivo de borde de un sitio. Identidad: `(tenant_id, id)`.
/// `device_token` se revela una única vez en la creación y nunca es
/// recuperable; sólo se persiste su hash (ver `fleetctl-infra-db`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDevice {
    pub id: i64,
    pub tenant_id: i64,
    pub site_id: Option<i64>,
    pub device_name: String,
    pub public_key: [u8; 32],
    pub key_version: i32,
    pub status: DeviceStatus,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl EdgeDevice {
    pub fn is_active(&self) -> bool {
        self.status == DeviceStatus::Active
    }
}
