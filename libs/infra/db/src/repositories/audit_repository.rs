// [libs/infra/db/src/repositories/audit_repository.rs]
use crate::errors::DbError;
use crate::DbClient;
use fleetctl_domain_models::{AuditResult, DeviceAuditEvent};
use libsql::{params, Row};
use tracing::instrument;

pub struct AuditRepository {
    client: DbClient,
}

fn result_from_str(raw: &str) -> AuditResult {
    match raw {
        "error" => AuditResult::Error,
        "denied" => AuditResult::Denied,
        _ => AuditResult::Success,
    }
}

fn result_as_str(result: AuditResult) -> &'static str {
    match result {
        AuditResult::Success => "success",
        AuditResult::Error => "error",
        AuditResult::Denied => "denied",
    }
}

fn row_to_event(row: &Row) -> Result<DeviceAuditEvent, DbError> {
    let event_data_text: String = row.get(9)?;
    let event_data = serde_json::from_str(&event_data_text).map_err(|e| DbError::MappingError(e.to_string()))?;
    let created_text: String = row.get(12)?;
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_text)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now());

    Ok(DeviceAuditEvent {
        id: row.get(0)?,
        event_type: row.get(1)?,
        tenant_id: row.get(2)?,
        device_id: row.get(3)?,
        miner_id: row.get(4)?,
        actor_id: row.get(5)?,
        actor_type: row.get(6)?,
        source_ip: row.get(7)?,
        user_agent: row.get(8)?,
        event_data,
        result: result_from_str(&row.get::<String>(10)?),
        error_message: row.get(11)?,
        created_at,
    })
}

const SELECT_COLUMNS: &str =
    "id, event_type, tenant_id, device_id, miner_id, actor_id, actor_type, source_ip, user_agent, event_data_json, result, error_message, created_at";

impl AuditRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    /// Escritura append-only; nunca se expone una ruta de actualización
    /// o borrado (spec §3/§4.9). El llamador decide el `result` a partir
    /// de lo que observó -- p.ej. un `GateDenial` mapea a `AuditResult::Denied`.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, event_data))]
    pub async fn record(
        &self,
        event_type: &str,
        tenant_id: i64,
        device_id: Option<i64>,
        miner_id: Option<i64>,
        actor_id: Option<&str>,
        actor_type: &str,
        source_ip: Option<&str>,
        user_agent: Option<&str>,
        event_data: &serde_json::Value,
        result: AuditResult,
        error_message: Option<&str>,
    ) -> Result<i64, DbError> {
        let connection = self.client.get_connection()?;
        let event_data_text = serde_json::to_string(event_data).map_err(|e| DbError::MappingError(e.to_string()))?;

        connection
            .execute(
                "INSERT INTO device_audit_events (event_type, tenant_id, device_id, miner_id, actor_id, actor_type, source_ip, user_agent, event_data_json, result, error_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    event_type,
                    tenant_id,
                    device_id,
                    miner_id,
                    actor_id,
                    actor_type,
                    source_ip,
                    user_agent,
                    event_data_text,
                    result_as_str(result),
                    error_message
                ],
            )
            .await?;

        Ok(connection.last_insert_rowid())
    }

    /// Lectura redactada por defecto: el operador que consulta auditoría
    /// no es necesariamente el actor original de la acción.
    pub async fn list_by_tenant(&self, tenant_id: i64, limit: i64) -> Result<Vec<DeviceAuditEvent>, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM device_audit_events WHERE tenant_id = ?1 ORDER BY created_at DESC LIMIT ?2"
                ),
                params![tenant_id, limit],
            )
            .await?;

        let mut events = Vec::new();
        while let Some(row) = rows.next().await? {
            events.push(row_to_event(&row)?.redacted());
        }
        Ok(events)
    }

    pub async fn list_by_device(&self, device_id: i64, limit: i64) -> Result<Vec<DeviceAuditEvent>, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM device_audit_events WHERE device_id = ?1 ORDER BY created_at DESC LIMIT ?2"
                ),
                params![device_id, limit],
            )
            .await?;

        let mut events = Vec::new();
        while let Some(row) = rows.next().await? {
            events.push(row_to_event(&row)?.redacted());
        }
        Ok(events)
    }
}
