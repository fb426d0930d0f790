// [apps/control-plane/src/handlers/scan.rs]
/*!
 * `/admin/scan*` y `/edge/scan*` (spec §4.3/§6): el operador crea un job
 * de escaneo de rango IP en `PENDING`; el edge lo reclama (lo que lo
 * transiciona a `RUNNING` y le entrega la lista de IPs a sondear) y
 * reporta progreso/resultados a medida que su pool de workers los
 * produce. Semántica de reclamo calcada de
 * `original_source/api/scan_api.py`'s `start_edge_scan`: job explícito
 * por id si se pide uno, si no el más antiguo ya asignado a este
 * dispositivo, y si no hay ninguno el más antiguo sin asignar del sitio.
 */

use axum::extract::{Extension, Path, State};
use axum::Json;
use fleetctl_domain_models::{DiscoveredMinerRecord, IpScanJob, ScanJobStatus};
use fleetctl_infra_discovery::parse_ip_range;
use serde::Deserialize;
use serde_json::json;

use crate::errors::ApiError;
use crate::middleware::DeviceIdentity;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateScanRequest {
    pub site_id: i64,
    #[serde(default)]
    pub device_id: Option<i64>,
    pub ip_range_start: String,
    pub ip_range_end: String,
}

/// `POST /admin/scan` -- valida el rango (tamaño acotado por
/// `fleetctl_infra_discovery::MAX_IPS`, spec §4.3) y crea el job en
/// `PENDING`, opcionalmente preasignado a un dispositivo.
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateScanRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let addresses = parse_ip_range(&request.ip_range_start, &request.ip_range_end)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let job: IpScanJob = state
        .scans
        .create_job(request.site_id, request.device_id, &request.ip_range_start, &request.ip_range_end, addresses.len() as i64)
        .await?;

    Ok(Json(json!({"scan_job_id": job.id})))
}

#[derive(Debug, Deserialize)]
pub struct ClaimScanRequest {
    #[serde(default)]
    pub site_id: i64,
    #[serde(default)]
    pub scan_job_id: Option<String>,
}

/// `POST /edge/scan` -- el edge reclama el siguiente job `PENDING` de su
/// sitio (o uno específico por id); devuelve `ip_list` ya expandida para
/// que el edge no tenga que reimplementar el parseo de rango.
pub async fn claim(
    State(state): State<AppState>,
    Extension(DeviceIdentity(device)): Extension<DeviceIdentity>,
    Json(request): Json<ClaimScanRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let job = state
        .scans
        .claim_pending(request.site_id, device.id, request.scan_job_id.as_deref())
        .await?;

    let Some(job) = job else {
        return Ok(Json(json!({"message": "No pending scan jobs"})));
    };

    let ip_list = parse_ip_range(&job.ip_range_start, &job.ip_range_end)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
        .into_iter()
        .map(|ip| ip.to_string())
        .collect::<Vec<_>>();

    Ok(Json(json!({"scan_job": job, "ip_list": ip_list})))
}

#[derive(Debug, Deserialize)]
pub struct ScanProgressRequest {
    pub scanned_ips: i64,
    pub discovered_miners: i64,
}

/// `POST /edge/scan/{id}/progress` -- el primer reporte transiciona
/// implícitamente `PENDING -> RUNNING` (spec §4.3).
pub async fn progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ScanProgressRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let job = state.scans.get_job(&id).await?;
    if job.status == ScanJobStatus::Pending {
        state.scans.finish_job(&id, ScanJobStatus::Running, None).await.ok();
    }
    state.scans.update_progress(&id, request.scanned_ips, request.discovered_miners).await?;
    Ok(Json(json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct ScanResultEntry {
    pub ip_address: String,
    pub detected_model: String,
    pub detected_type: String,
}

#[derive(Debug, Deserialize)]
pub struct ScanResultsRequest {
    pub discovered: Vec<ScanResultEntry>,
    #[serde(default)]
    pub completed: bool,
}

/// `POST /edge/scan/{id}/results` -- upsert de `DiscoveredMiner` por
/// `(scan_job_id, ip_address)`; `completed=true` cierra el job.
pub async fn results(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ScanResultsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    for entry in &request.discovered {
        state.scans.record_discovered(&id, &entry.ip_address, &entry.detected_model, &entry.detected_type).await?;
    }

    if request.completed {
        state.scans.finish_job(&id, ScanJobStatus::Completed, None).await?;
    }

    Ok(Json(json!({"ok": true, "recorded": request.discovered.len()})))
}

pub async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<IpScanJob>, ApiError> {
    Ok(Json(state.scans.get_job(&id).await?))
}

pub async fn list_discovered(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<DiscoveredMinerRecord>>, ApiError> {
    Ok(Json(state.scans.list_discovered(&id).await?))
}
