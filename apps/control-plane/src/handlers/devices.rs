// [apps/control-plane/src/handlers/devices.rs]
/*!
 * `/devices/*`: identidad del dispositivo de borde (spec §6). El registro
 * y la revocación son operaciones de operador (sin `device_auth_guard`);
 * `pubkey`/`heartbeat` son llamadas del propio dispositivo sobre sí mismo.
 */

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::ApiError;
use crate::middleware::DeviceIdentity;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterDeviceRequest {
    pub tenant_id: i64,
    pub site_id: Option<i64>,
    pub device_name: String,
    pub public_key: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterDeviceResponse {
    pub device_id: i64,
    pub device_token: String,
    pub key_version: i32,
}

/// `POST /admin/devices` -- un operador aprovisiona un dispositivo nuevo y
/// recibe el `device_token` en claro exactamente una vez (spec §3).
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterDeviceRequest>,
) -> Result<Json<RegisterDeviceResponse>, ApiError> {
    let public_key_bytes = BASE64
        .decode(&request.public_key)
        .map_err(|e| ApiError::BadRequest(format!("public_key must be base64: {e}")))?;
    let public_key: [u8; 32] = public_key_bytes
        .try_into()
        .map_err(|_| ApiError::BadRequest("public_key must decode to exactly 32 bytes".into()))?;

    let (device, device_token) = state
        .devices
        .register(request.tenant_id, request.site_id, &request.device_name, &public_key)
        .await?;

    state
        .audit
        .record(
            "DEVICE_REGISTERED",
            request.tenant_id,
            Some(device.id),
            None,
            None,
            "operator",
            None,
            None,
            &json!({"device_name": request.device_name}),
            fleetctl_domain_models::AuditResult::Success,
            None,
        )
        .await?;

    Ok(Json(RegisterDeviceResponse { device_id: device.id, device_token, key_version: device.key_version }))
}

/// `POST /admin/devices/{id}/revoke` -- `ACTIVE -> REVOKED`, terminal.
pub async fn revoke(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<serde_json::Value>, ApiError> {
    let device = state.devices.get_by_id(id).await?;
    state.devices.revoke(id).await?;
    state
        .audit
        .record(
            "DEVICE_REVOKED",
            device.tenant_id,
            Some(id),
            None,
            None,
            "operator",
            None,
            None,
            &json!({}),
            fleetctl_domain_models::AuditResult::Success,
            None,
        )
        .await?;
    Ok(Json(json!({"device_id": id, "status": "REVOKED"})))
}

#[derive(Debug, Deserialize)]
pub struct RotateKeyRequest {
    pub public_key: String,
}

/// `POST /admin/devices/{id}/rotate-key` -- incrementa `key_version`;
/// todo secreto cifrado bajo la versión previa queda inutilizable.
pub async fn rotate_key(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<RotateKeyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let public_key_bytes = BASE64
        .decode(&request.public_key)
        .map_err(|e| ApiError::BadRequest(format!("public_key must be base64: {e}")))?;
    let public_key: [u8; 32] = public_key_bytes
        .try_into()
        .map_err(|_| ApiError::BadRequest("public_key must decode to exactly 32 bytes".into()))?;

    let device = state.devices.rotate_key(id, &public_key).await?;
    state
        .audit
        .record(
            "DEVICE_KEY_ROTATED",
            device.tenant_id,
            Some(id),
            None,
            None,
            "operator",
            None,
            None,
            &json!({"key_version": device.key_version}),
            fleetctl_domain_models::AuditResult::Success,
            None,
        )
        .await?;
    Ok(Json(json!({"device_id": id, "key_version": device.key_version})))
}

/// `GET /devices/{id}/pubkey` -- el dispositivo sólo puede consultar su
/// propia clave pública vigente.
pub async fn get_pubkey(
    Path(id): Path<i64>,
    Extension(DeviceIdentity(caller)): Extension<DeviceIdentity>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if caller.id != id {
        return Err(ApiError::Unauthorized);
    }
    Ok(Json(json!({
        "device_id": caller.id,
        "public_key": BASE64.encode(caller.public_key),
        "key_version": caller.key_version,
    })))
}

/// `POST /devices/{id}/heartbeat` -- actualiza `last_seen_at` del
/// dispositivo que llama (nunca el de un tercero).
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(DeviceIdentity(caller)): Extension<DeviceIdentity>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if caller.id != id {
        return Err(ApiError::Unauthorized);
    }
    let last_seen_at = state.devices.touch_heartbeat(id).await?;
    Ok(Json(json!({"last_seen_at": last_seen_at.to_rfc3339()})))
}
