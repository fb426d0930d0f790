// [libs/domain/models/src/audit.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditResult {
    Success,
    Error,
    Denied,
}

/// Entrada de auditoría append-only (spec §3/§4.9). Nunca se muta tras
/// escribirse; la redacción de campos sensibles ocurre en el camino de
/// lectura, no en el de escritura.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAuditEvent {
    pub id: i64,
    pub event_type: String,
    pub tenant_id: i64,
    pub device_id: Option<i64>,
    pub miner_id: Option<i64>,
    pub actor_id: Option<String>,
    pub actor_type: String,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub event_data: Value,
    pub result: AuditResult,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Claves de `event_data` (insensibles a mayúsculas) redactadas al leer,
/// además de los octetos 3-4 de cualquier IP presente.
const SENSITIVE_KEY_FRAGMENTS: &[&str] =
    &["password", "secret", "token", "credential", "key", "private"];

const REDACTED_PLACEHOLDER: &str = "***REDACTED***";

pub fn redact_event_data(data: &Value) -> Value {
    match data {
        Value::Object(map) => {
            let mut redacted = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                let lowered = key.to_lowercase();
                if SENSITIVE_KEY_FRAGMENTS.iter().any(|fragment| lowered.contains(fragment)) {
                    redacted.insert(key.clone(), Value::String(REDACTED_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_event_data(value));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_event_data).collect()),
        other => other.clone(),
    }
}

impl DeviceAuditEvent {
    /// Proyección de lectura con redacción aplicada: IP enmascarada y
    /// claves sensibles de `event_data` reemplazadas.
    pub fn redacted(&self) -> DeviceAuditEvent {
        DeviceAuditEvent {
            source_ip: self.source_ip.as_deref().map(crate::miner::mask_ipv4_octets),
            event_data: redact_event_data(&self.event_data),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_nested_sensitive_keys() {
        let data = json!({"ssh_password": "hunter2", "note": "fine", "nested": {"api_token": "abc"}});
        let redacted = redact_event_data(&data);
        assert_eq!(redacted["ssh_password"], REDACTED_PLACEHOLDER);
        assert_eq!(redacted["note"], "fine");
        assert_eq!(redacted["nested"]["api_token"], REDACTED_PLACEHOLDER);
    }
}
