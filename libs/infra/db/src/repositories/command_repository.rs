// [libs/infra/db/src/repositories/command_repository.rs]
use crate::errors::DbError;
use crate::DbClient;
use chrono::Utc;
use fleetctl_domain_models::{CommandRecord, CommandStatus, TargetResult};
use libsql::{params, Row};
use tracing::{info, instrument, warn};

pub struct CommandRepository {
    client: DbClient,
}

fn status_from_str(raw: &str) -> CommandStatus {
    match raw {
        "PULLED" => CommandStatus::Pulled,
        "SUCCEEDED" => CommandStatus::Succeeded,
        "FAILED" => CommandStatus::Failed,
        "PARTIAL" => CommandStatus::Partial,
        _ => CommandStatus::Queued,
    }
}

fn status_as_str(status: CommandStatus) -> &'static str {
    match status {
        CommandStatus::Queued => "QUEUED",
        CommandStatus::Pulled => "PULLED",
        CommandStatus::Succeeded => "SUCCEEDED",
        CommandStatus::Failed => "FAILED",
        CommandStatus::Partial => "PARTIAL",
    }
}

fn parse_rfc3339(raw: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

fn row_to_command(row: &Row) -> Result<CommandRecord, DbError> {
    let payload_text: String = row.get(5)?;
    let payload = serde_json::from_str(&payload_text).map_err(|e| DbError::MappingError(e.to_string()))?;
    let target_ids_text: String = row.get(6)?;
    let target_ids = serde_json::from_str(&target_ids_text).map_err(|e| DbError::MappingError(e.to_string()))?;
    let results_text: String = row.get(8)?;
    let results: Vec<TargetResult> =
        serde_json::from_str(&results_text).map_err(|e| DbError::MappingError(e.to_string()))?;
    let pulled_text: Option<String> = row.get(10)?;
    let completed_text: Option<String> = row.get(11)?;

    Ok(CommandRecord {
        command_id: row.get(0)?,
        tenant_id: row.get(1)?,
        site_id: row.get(2)?,
        device_id: row.get(3)?,
        command_type: row.get(4)?,
        payload,
        target_ids,
        status: status_from_str(&row.get::<String>(7)?),
        results,
        created_at: parse_rfc3339(&row.get::<String>(9)?),
        pulled_at: pulled_text.map(|t| parse_rfc3339(&t)),
        completed_at: completed_text.map(|t| parse_rfc3339(&t)),
    })
}

const SELECT_COLUMNS: &str =
    "command_id, tenant_id, site_id, device_id, command_type, payload_json, target_ids_json, status, results_json, created_at, pulled_at, completed_at";

impl CommandRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, payload))]
    pub async fn enqueue(
        &self,
        tenant_id: i64,
        site_id: i64,
        device_id: i64,
        command_type: &str,
        payload: &serde_json::Value,
        target_ids: &[i64],
    ) -> Result<CommandRecord, DbError> {
        let connection = self.client.get_connection()?;
        let command_id = format!("cmd_{}", uuid::Uuid::new_v4().simple());
        let payload_text = serde_json::to_string(payload).map_err(|e| DbError::MappingError(e.to_string()))?;
        let target_ids_text = serde_json::to_string(target_ids).map_err(|e| DbError::MappingError(e.to_string()))?;

        connection
            .execute(
                "INSERT INTO commands (command_id, tenant_id, site_id, device_id, command_type, payload_json, target_ids_json, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'QUEUED')",
                params![command_id.clone(), tenant_id, site_id, device_id, command_type, payload_text, target_ids_text],
            )
            .await?;

        info!(command_id = %command_id, device_id, command_type, "command enqueued");
        self.get(&command_id).await
    }

    pub async fn get(&self, command_id: &str) -> Result<CommandRecord, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(&format!("SELECT {SELECT_COLUMNS} FROM commands WHERE command_id = ?1"), params![command_id])
            .await?;
        match rows.next().await? {
            Some(row) => row_to_command(&row),
            None => Err(DbError::CommandNotFound),
        }
    }

    /// Poll exactly-once por dispositivo: sólo devuelve comandos en
    /// `QUEUED` y los transiciona atómicamente a `PULLED` en la misma
    /// llamada (spec §4.7). La deduplicación fina por `command_id` vive
    /// en el fichero `.edge_executed_commands.json` del edge, no aquí.
    #[instrument(skip(self))]
    pub async fn poll_queued(&self, device_id: i64, limit: i64) -> Result<Vec<CommandRecord>, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM commands WHERE device_id = ?1 AND status = 'QUEUED' ORDER BY created_at LIMIT ?2"
                ),
                params![device_id, limit],
            )
            .await?;

        let mut commands = Vec::new();
        while let Some(row) = rows.next().await? {
            commands.push(row_to_command(&row)?);
        }

        for command in &commands {
            connection
                .execute(
                    "UPDATE commands SET status = 'PULLED', pulled_at = ?2 WHERE command_id = ?1 AND status = 'QUEUED'",
                    params![command.command_id.clone(), Utc::now().to_rfc3339()],
                )
                .await?;
        }

        if !commands.is_empty() {
            info!(device_id, pulled = commands.len(), "commands pulled");
        }
        Ok(commands)
    }

    /// ACK del edge tras la ejecución: resuelve el estado final desde el
    /// multiset de resultados por objetivo (`CommandRecord::resolve_status`).
    #[instrument(skip(self, results))]
    pub async fn ack(&self, command_id: &str, results: Vec<TargetResult>) -> Result<CommandRecord, DbError> {
        let command = self.get(command_id).await?;
        if command.status != CommandStatus::Pulled {
            warn!(command_id, status = ?command.status, "ack received for command not in PULLED state");
        }

        let final_status = CommandRecord::resolve_status(&results);
        let results_text = serde_json::to_string(&results).map_err(|e| DbError::MappingError(e.to_string()))?;

        let connection = self.client.get_connection()?;
        connection
            .execute(
                "UPDATE commands SET status = ?2, results_json = ?3, completed_at = ?4 WHERE command_id = ?1",
                params![command_id, status_as_str(final_status), results_text, Utc::now().to_rfc3339()],
            )
            .await?;

        info!(command_id, status = status_as_str(final_status), "command acknowledged");
        self.get(command_id).await
    }

    pub async fn list_by_site(&self, site_id: i64, limit: i64) -> Result<Vec<CommandRecord>, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM commands WHERE site_id = ?1 ORDER BY created_at DESC LIMIT ?2"),
                params![site_id, limit],
            )
            .await?;
        let mut commands = Vec::new();
        while let Some(row) = rows.next().await? {
            commands.push(row_to_command(&row)?);
        }
        Ok(commands)
    }
}
