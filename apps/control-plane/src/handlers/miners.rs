// [apps/control-plane/src/handlers/miners.rs]
/*!
 * `/admin/miners/*`: administración de `HostingMiner` -- alta, listado
 * por sitio, cambio de nivel de capacidad y vínculo a dispositivo. Estas
 * rutas son de operador (fuera del alcance de auth del núcleo, spec §1).
 */

use axum::extract::{Path, Query, State};
use axum::Json;
use fleetctl_domain_models::{CapabilityLevel, IpEncryptionMode};
use serde::Deserialize;
use serde_json::json;

use crate::errors::ApiError;
use crate::state::AppState;

/// `GET /admin/miners/{id}/reveal-ip` -- un miner en modo `E2EE` jamás
/// revela su IP, sin importar el rol del operador que la pida (spec §9,
/// Open Question resuelta): la IP viaja únicamente dentro del propio
/// sobre cifrado que el edge decifra localmente, nunca en claro por el
/// cloud. `MASK`/`SERVER_ENCRYPT` devuelven la IP en claro aquí (la capa
/// de gestión de usuarios/RBAC que decidiría *quién* puede llamar esta
/// ruta es responsabilidad externa, fuera de alcance del núcleo). Todo
/// intento se audita, exitoso o denegado (spec §4.9).
pub async fn reveal_ip(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let miner = state.miners.get_by_id(id).await?;

    if miner.ip_encryption_mode == IpEncryptionMode::E2ee {
        state
            .audit
            .record(
                "IP_REVEALED",
                0,
                None,
                Some(id),
                None,
                "operator",
                None,
                None,
                &json!({"site_id": miner.site_id, "ip_encryption_mode": "E2EE"}),
                fleetctl_domain_models::AuditResult::Denied,
                Some("E2EE miners never reveal their IP through the cloud"),
            )
            .await?;
        return Err(ApiError::BadRequest("IP reveal denied: miner is in E2EE mode".into()));
    }

    state
        .audit
        .record(
            "IP_REVEALED",
            0,
            None,
            Some(id),
            None,
            "operator",
            None,
            None,
            &json!({"site_id": miner.site_id, "ip_encryption_mode": format!("{:?}", miner.ip_encryption_mode).to_uppercase()}),
            fleetctl_domain_models::AuditResult::Success,
            None,
        )
        .await?;

    Ok(Json(json!({"miner_id": id, "ip_address": miner.ip_address})))
}

#[derive(Debug, Deserialize)]
pub struct CreateMinerRequest {
    pub site_id: i64,
    pub ip_address: String,
    #[serde(default = "default_ip_mode")]
    pub ip_encryption_mode: String,
    #[serde(default = "default_capability")]
    pub capability_level: String,
    pub bound_device_id: Option<i64>,
}

fn default_ip_mode() -> String {
    "MASK".into()
}

fn default_capability() -> String {
    "DISCOVERY".into()
}

fn parse_ip_mode(raw: &str) -> Result<IpEncryptionMode, ApiError> {
    match raw.to_uppercase().as_str() {
        "MASK" => Ok(IpEncryptionMode::Mask),
        "SERVER_ENCRYPT" => Ok(IpEncryptionMode::ServerEncrypt),
        "E2EE" => Ok(IpEncryptionMode::E2ee),
        other => Err(ApiError::BadRequest(format!("unknown ip_encryption_mode: {other}"))),
    }
}

fn parse_capability(raw: &str) -> Result<CapabilityLevel, ApiError> {
    match raw.to_uppercase().as_str() {
        "DISCOVERY" => Ok(CapabilityLevel::Discovery),
        "TELEMETRY" => Ok(CapabilityLevel::Telemetry),
        "CONTROL" => Ok(CapabilityLevel::Control),
        other => Err(ApiError::BadRequest(format!("unknown capability_level: {other}"))),
    }
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateMinerRequest>,
) -> Result<Json<fleetctl_domain_models::HostingMiner>, ApiError> {
    let ip_encryption_mode = parse_ip_mode(&request.ip_encryption_mode)?;
    let capability_level = parse_capability(&request.capability_level)?;
    let miner = state
        .miners
        .create(request.site_id, &request.ip_address, ip_encryption_mode, capability_level, request.bound_device_id)
        .await?;
    Ok(Json(miner))
}

#[derive(Debug, Deserialize)]
pub struct ListMinersQuery {
    pub site_id: i64,
}

pub async fn list_by_site(
    State(state): State<AppState>,
    Query(query): Query<ListMinersQuery>,
) -> Result<Json<Vec<fleetctl_domain_models::HostingMiner>>, ApiError> {
    Ok(Json(state.miners.list_by_site(query.site_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SetCapabilityRequest {
    pub capability_level: String,
}

/// `POST /admin/miners/{id}/capability` -- auditado, ya que cambia qué
/// secretos puede recibir el miner (spec §4.9).
pub async fn set_capability(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<SetCapabilityRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let level = parse_capability(&request.capability_level)?;
    let miner = state.miners.get_by_id(id).await?;
    state.miners.set_capability_level(id, level).await?;
    // `hosting_miners` carries no `tenant_id` column (site-scoped only);
    // `0` marks an audit entry with no attributable tenant.
    state
        .audit
        .record(
            "CAPABILITY_UPDATED",
            0,
            None,
            Some(id),
            None,
            "operator",
            None,
            None,
            &json!({"site_id": miner.site_id, "new_level": request.capability_level}),
            fleetctl_domain_models::AuditResult::Success,
            None,
        )
        .await?;
    Ok(Json(json!({"miner_id": id, "capability_level": request.capability_level})))
}

#[derive(Debug, Deserialize)]
pub struct BindDeviceRequest {
    pub device_id: Option<i64>,
}

pub async fn bind_device(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<BindDeviceRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.miners.bind_device(id, request.device_id).await?;
    Ok(Json(json!({"miner_id": id, "bound_device_id": request.device_id})))
}
