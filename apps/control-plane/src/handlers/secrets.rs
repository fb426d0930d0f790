// [apps/control-plane/src/handlers/secrets.rs]
/*!
 * `/edge/secrets*`, `/edge/status`, `/edge/ack` y el alta de secretos de
 * operador (spec §4.5/§4.8). Todo pull pasa por `check_capability` (C8)
 * antes de tocar la fila; toda denegación y todo pull exitoso se audita
 * (spec §4.9).
 */

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use fleetctl_domain_models::{check_capability, AuditResult, AuthContext, GateDenial};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::ApiError;
use crate::middleware::DeviceIdentity;
use crate::state::AppState;

fn denial_event_type(denial: GateDenial) -> &'static str {
    match denial {
        GateDenial::DeviceRevoked => "DEVICE_REVOKED",
        GateDenial::CapabilityDenied => "CAPABILITY_DENIED",
        GateDenial::BoundDeviceDenied => "BOUND_DEVICE_DENIED",
        GateDenial::KeyVersionMismatch => "KEY_VERSION_MISMATCH",
    }
}

#[derive(Debug, Deserialize)]
pub struct PullSecretsQuery {
    #[serde(default)]
    pub since_counter: i64,
    pub site_id: i64,
}

#[derive(Debug, Serialize)]
struct NamedEnvelopeOut {
    miner_id: i64,
    encrypted_payload: String,
    wrapped_dek: String,
    nonce: String,
    aad: serde_json::Value,
    counter: i64,
    schema_version: i32,
    key_version: i32,
}

/// `GET /edge/secrets?since_counter=&site_id=` -- pull masivo incremental.
/// El filtro de capacidad/vínculo se aplica por-miner; los excluidos se
/// cuentan en `skipped_capability`/`skipped_bound` (spec §4.8 SUPPLEMENT)
/// para que el edge distingue "vacío a propósito" de un error de red.
pub async fn pull_bulk(
    State(state): State<AppState>,
    Extension(DeviceIdentity(device)): Extension<DeviceIdentity>,
    Query(query): Query<PullSecretsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let candidates = state.secrets.list_for_device_since(device.id, query.since_counter).await?;

    let mut secrets = Vec::with_capacity(candidates.len());
    let mut skipped_capability = 0i64;
    let mut skipped_bound = 0i64;

    for secret in candidates {
        let miner = match state.miners.get_by_id(secret.miner_id).await {
            Ok(miner) => miner,
            Err(_) => continue,
        };
        if miner.site_id != query.site_id {
            continue;
        }

        let auth = AuthContext::from_device(&device, secret.key_version);
        match check_capability(&auth, &miner) {
            Ok(()) => secrets.push(NamedEnvelopeOut {
                miner_id: secret.miner_id,
                encrypted_payload: secret.encrypted_payload,
                wrapped_dek: secret.wrapped_dek,
                nonce: secret.nonce,
                aad: secret.aad,
                counter: secret.counter,
                schema_version: secret.schema_version,
                key_version: secret.key_version,
            }),
            Err(GateDenial::CapabilityDenied) => skipped_capability += 1,
            Err(GateDenial::BoundDeviceDenied) => skipped_bound += 1,
            Err(_) => {}
        }
    }

    state
        .audit
        .record(
            "SECRET_PULLED_BULK",
            device.tenant_id,
            Some(device.id),
            None,
            Some(&device.id.to_string()),
            "device",
            None,
            None,
            &json!({"site_id": query.site_id, "count": secrets.len(), "skipped_capability": skipped_capability, "skipped_bound": skipped_bound}),
            AuditResult::Success,
            None,
        )
        .await?;

    Ok(Json(json!({
        "device_id": device.id,
        "key_version": device.key_version,
        "secrets": secrets,
        "total": secrets.len(),
        "skipped_capability": skipped_capability,
        "skipped_bound": skipped_bound,
    })))
}

/// `GET /edge/secrets/{miner_id}` -- pull de un único sobre; 403 con
/// razón si el gate de capacidad (C8) lo deniega (spec §8, escenario 3).
pub async fn pull_single(
    State(state): State<AppState>,
    Extension(DeviceIdentity(device)): Extension<DeviceIdentity>,
    Path(miner_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let miner = state.miners.get_by_id(miner_id).await?;
    let secret = state
        .secrets
        .get(miner_id, device.id)
        .await?
        .ok_or(ApiError::NotFound("no secret for this miner/device pair"))?;

    let auth = AuthContext::from_device(&device, secret.key_version);
    if let Err(denial) = check_capability(&auth, &miner) {
        state
            .audit
            .record(
                denial_event_type(denial),
                device.tenant_id,
                Some(device.id),
                Some(miner_id),
                Some(&device.id.to_string()),
                "device",
                None,
                None,
                &json!({}),
                AuditResult::Denied,
                Some(&denial.to_string()),
            )
            .await?;
        return Err(ApiError::GateDenied {
            denial,
            required_level: fleetctl_domain_models::CapabilityLevel::Control.as_i32(),
            miner_level: miner.capability_level.as_i32(),
        });
    }

    state
        .audit
        .record(
            "SECRET_PULLED_SINGLE",
            device.tenant_id,
            Some(device.id),
            Some(miner_id),
            Some(&device.id.to_string()),
            "device",
            None,
            None,
            &json!({}),
            AuditResult::Success,
            None,
        )
        .await?;

    Ok(Json(json!({
        "miner_id": secret.miner_id,
        "encrypted_payload": secret.encrypted_payload,
        "wrapped_dek": secret.wrapped_dek,
        "nonce": secret.nonce,
        "aad": secret.aad,
        "counter": secret.counter,
        "schema_version": secret.schema_version,
        "key_version": secret.key_version,
    })))
}

/// `GET /edge/status` -- resumen ligero para el loop de salud del edge.
pub async fn status(
    State(state): State<AppState>,
    Extension(DeviceIdentity(device)): Extension<DeviceIdentity>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let secret_count = state.secrets.list_for_device_since(device.id, 0).await?.len();
    Ok(Json(json!({
        "device_id": device.id,
        "key_version": device.key_version,
        "secret_count": secret_count,
        "last_seen_at": device.last_seen_at.map(|t| t.to_rfc3339()),
    })))
}

#[derive(Debug, Deserialize)]
pub struct AckReceipt {
    pub miner_id: i64,
    pub counter: i64,
}

#[derive(Debug, Deserialize)]
pub struct AckSecretsRequest {
    pub receipts: Vec<AckReceipt>,
}

/// `POST /edge/ack` -- recibo de que el edge decifró con éxito N sobres;
/// puramente informativo para la auditoría (spec §6).
pub async fn ack(
    State(state): State<AppState>,
    Extension(DeviceIdentity(device)): Extension<DeviceIdentity>,
    Json(request): Json<AckSecretsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let acknowledged = request.receipts.len() as i64;
    state
        .audit
        .record(
            "SECRET_ACK",
            device.tenant_id,
            Some(device.id),
            None,
            Some(&device.id.to_string()),
            "device",
            None,
            None,
            &json!({"receipts": request.receipts.iter().map(|r| json!({"miner_id": r.miner_id, "counter": r.counter})).collect::<Vec<_>>()}),
            AuditResult::Success,
            None,
        )
        .await?;
    Ok(Json(json!({"acknowledged": acknowledged})))
}

#[derive(Debug, Deserialize)]
pub struct UpsertSecretRequest {
    pub device_id: i64,
    pub encrypted_payload: String,
    pub wrapped_dek: String,
    pub nonce: String,
    pub aad: serde_json::Value,
    pub counter: i64,
    pub schema_version: i32,
    pub key_version: i32,
}

/// `POST /admin/miners/{id}/secret` -- el operador (o el propio dashboard
/// vía el camino de passphrase de C4) sube un sobre ya cifrado. Nunca
/// recibe ni ve plaintext en esta ruta.
pub async fn upsert(
    State(state): State<AppState>,
    Path(miner_id): Path<i64>,
    Json(request): Json<UpsertSecretRequest>,
) -> Result<Json<fleetctl_domain_models::MinerSecret>, ApiError> {
    let device = state.devices.get_by_id(request.device_id).await?;
    let result = state
        .secrets
        .upsert(
            miner_id,
            request.device_id,
            &request.encrypted_payload,
            &request.wrapped_dek,
            &request.nonce,
            &request.aad,
            request.counter,
            request.schema_version,
            request.key_version,
            device.key_version,
        )
        .await;

    match result {
        Ok(secret) => {
            state
                .audit
                .record(
                    "SECRET_UPDATED",
                    device.tenant_id,
                    Some(request.device_id),
                    Some(miner_id),
                    None,
                    "operator",
                    None,
                    None,
                    &json!({"counter": secret.counter}),
                    AuditResult::Success,
                    None,
                )
                .await?;
            Ok(Json(secret))
        }
        Err(err) => {
            state
                .audit
                .record(
                    "SECRET_UPDATE_REJECTED",
                    device.tenant_id,
                    Some(request.device_id),
                    Some(miner_id),
                    None,
                    "operator",
                    None,
                    None,
                    &json!({"attempted_counter": request.counter}),
                    AuditResult::Error,
                    Some(&err.to_string()),
                )
                .await?;
            Err(err.into())
        }
    }
}
