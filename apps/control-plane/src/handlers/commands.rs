// [apps/control-plane/src/handlers/commands.rs]
/*!
 * `/admin/commands` (alta de operador) y `/edge/v1/commands/*` (pull y
 * ACK del edge, spec §4.7). El estado final se resuelve a partir del
 * multiset de resultados por objetivo (`CommandRecord::resolve_status`).
 */

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use fleetctl_domain_adapters::CommandType;
use fleetctl_domain_models::{AuditResult, TargetResult};
use serde::Deserialize;
use serde_json::json;

use crate::errors::ApiError;
use crate::middleware::DeviceIdentity;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EnqueueCommandRequest {
    pub tenant_id: i64,
    pub site_id: i64,
    pub device_id: i64,
    pub command_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub target_ids: Vec<i64>,
}

/// `POST /admin/commands` -- el operador encola un comando para uno o
/// más miners destinados a exactamente un dispositivo (spec §3).
pub async fn enqueue(
    State(state): State<AppState>,
    Json(request): Json<EnqueueCommandRequest>,
) -> Result<Json<fleetctl_domain_models::CommandRecord>, ApiError> {
    if CommandType::parse(&request.command_type).is_none() {
        return Err(ApiError::BadRequest(format!("unknown command_type: {}", request.command_type)));
    }

    let command = state
        .commands
        .enqueue(request.tenant_id, request.site_id, request.device_id, &request.command_type, &request.payload, &request.target_ids)
        .await?;

    state
        .audit
        .record(
            "COMMAND_QUEUED",
            request.tenant_id,
            Some(request.device_id),
            None,
            None,
            "operator",
            None,
            None,
            &json!({"command_id": command.command_id, "command_type": request.command_type, "target_ids": request.target_ids}),
            AuditResult::Success,
            None,
        )
        .await?;

    Ok(Json(command))
}

#[derive(Debug, Deserialize)]
pub struct PollCommandsQuery {
    pub site_id: i64,
    #[serde(default = "default_poll_limit")]
    pub limit: i64,
}

fn default_poll_limit() -> i64 {
    10
}

/// `GET /edge/v1/commands/poll?site_id=&limit=` -- transiciona
/// atómicamente `QUEUED -> PULLED` (spec §4.7). Cada comando viaja con
/// el sobre cifrado de cada miner objetivo bajo `encrypted_credentials`
/// (spec §6): el edge nunca debe pedir credenciales por separado para
/// ejecutar un comando CONTROL ya despachado.
pub async fn poll(
    State(state): State<AppState>,
    Extension(DeviceIdentity(device)): Extension<DeviceIdentity>,
    Query(query): Query<PollCommandsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let commands = state.commands.poll_queued(device.id, query.limit).await?;
    let mut out = Vec::with_capacity(commands.len());
    for command in commands.into_iter().filter(|c| c.site_id == query.site_id) {
        let mut encrypted_credentials = serde_json::Map::with_capacity(command.target_ids.len());
        for target_id in &command.target_ids {
            if let Some(secret) = state.secrets.get(*target_id, device.id).await? {
                encrypted_credentials.insert(
                    target_id.to_string(),
                    json!({
                        "encrypted_payload": secret.encrypted_payload,
                        "wrapped_dek": secret.wrapped_dek,
                        "nonce": secret.nonce,
                        "aad": secret.aad,
                        "counter": secret.counter,
                        "schema_version": secret.schema_version,
                        "key_version": secret.key_version,
                    }),
                );
            }
        }
        out.push(json!({
            "command_id": command.command_id,
            "command_type": command.command_type,
            "payload": command.payload,
            "target_ids": command.target_ids,
            "encrypted_credentials": encrypted_credentials,
        }));
    }
    let commands = out;

    if !commands.is_empty() {
        state
            .audit
            .record(
                "COMMAND_PULLED",
                device.tenant_id,
                Some(device.id),
                None,
                Some(&device.id.to_string()),
                "device",
                None,
                None,
                &json!({"count": commands.len()}),
                AuditResult::Success,
                None,
            )
            .await?;
    }

    Ok(Json(json!({"commands": commands})))
}

#[derive(Debug, Deserialize)]
pub struct AckCommandRequest {
    pub results: Vec<TargetResult>,
}

/// `POST /edge/v1/commands/{id}/ack` -- resuelve `SUCCEEDED`/`FAILED`/
/// `PARTIAL` y audita el resultado completo (spec §4.7/§4.9).
pub async fn ack(
    State(state): State<AppState>,
    Extension(DeviceIdentity(device)): Extension<DeviceIdentity>,
    Path(command_id): Path<String>,
    Json(request): Json<AckCommandRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let command = state.commands.ack(&command_id, request.results.clone()).await?;

    state
        .audit
        .record(
            "COMMAND_ACKED",
            device.tenant_id,
            Some(device.id),
            None,
            Some(&device.id.to_string()),
            "device",
            None,
            None,
            &json!({"command_id": command.command_id, "status": command.status, "results": request.results}),
            AuditResult::Success,
            None,
        )
        .await?;

    Ok(Json(json!({"ok": true})))
}

pub async fn list_by_site(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<fleetctl_domain_models::CommandRecord>>, ApiError> {
    Ok(Json(state.commands.list_by_site(query.site_id, query.limit).await?))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub site_id: i64,
    #[serde(default = "default_poll_limit")]
    pub limit: i64,
}
