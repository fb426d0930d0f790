// [apps/control-plane/src/handlers/telemetry.rs]
/*!
 * `/edge/telemetry` (ingesta, SUPPLEMENT) y el lector unificado
 * `live`/`history`/`site_summary` (spec §4.6). El flujo de datos de
 * telemetría (spec §2) exige que el edge entregue lecturas crudas al
 * cloud; spec §6 no nombra un endpoint dedicado para ello, así que se
 * añade aquí como `POST /edge/telemetry` junto al resto del contrato
 * Bearer `device_token`.
 */

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use fleetctl_domain_models::{LiveSnapshot, RawReading};
use serde::Deserialize;
use serde_json::json;

use crate::errors::ApiError;
use crate::middleware::DeviceIdentity;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestTelemetryRequest {
    pub site_id: i64,
    pub miner_id: i64,
    pub status: String,
    pub hashrate_ths: f64,
    pub temperature_c: f64,
    pub power_w: f64,
    pub fan_rpm: i64,
    #[serde(default)]
    pub reject_rate: f64,
    #[serde(default)]
    pub pool_url: String,
    #[serde(default)]
    pub worker_name: String,
}

/// `POST /edge/telemetry` -- escribe en `raw_24h` y refresca `live` en el
/// mismo paso (spec §4.6 "raw layer"/"live layer").
pub async fn ingest(
    State(state): State<AppState>,
    Extension(DeviceIdentity(_device)): Extension<DeviceIdentity>,
    Json(request): Json<IngestTelemetryRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let reading = RawReading {
        ts: Utc::now(),
        site_id: request.site_id,
        miner_id: request.miner_id,
        status: request.status,
        hashrate_ths: request.hashrate_ths,
        temperature_c: request.temperature_c,
        power_w: request.power_w,
        fan_rpm: request.fan_rpm,
        reject_rate: request.reject_rate,
        pool_url: request.pool_url,
    };
    state.telemetry.ingest_raw(&reading, &request.worker_name).await?;
    Ok(Json(json!({"ok": true})))
}

pub async fn live(State(state): State<AppState>, Path(miner_id): Path<i64>) -> Result<Json<serde_json::Value>, ApiError> {
    let snapshot: Option<LiveSnapshot> = state.telemetry.get_live(miner_id).await?;
    match snapshot {
        Some(snapshot) => Ok(Json(snapshot.to_response())),
        None => Err(ApiError::NotFound("no live telemetry for this miner")),
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub site_id: i64,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// `GET /miners/{id}/telemetry/history?site_id=&from=&to=` -- resolución
/// auto-seleccionada (5min/hourly/daily) por `HistoryResolution::select`.
pub async fn history(
    State(state): State<AppState>,
    Path(miner_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let unified = state.telemetry.read_history(query.site_id, miner_id, query.from, query.to).await?;
    let (resolution, rows) = match unified {
        fleetctl_infra_db::UnifiedHistory::FiveMin(rows) => ("5min", serde_json::to_value(rows)),
        fleetctl_infra_db::UnifiedHistory::Hourly(rows) => ("hourly", serde_json::to_value(rows)),
        fleetctl_infra_db::UnifiedHistory::Daily(rows) => ("daily", serde_json::to_value(rows)),
    };
    let rows = rows.map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(Json(json!({
        "source": "history_store",
        "resolution": resolution,
        "start": query.from,
        "end": query.to,
        "rows": rows,
    })))
}

/// `GET /sites/{id}/telemetry/summary` -- SUPPLEMENT portado de
/// `telemetry_service.py::get_site_summary` (SPEC_FULL §4.6): un
/// agregado de todos los miners de un sitio sobre la capa `live`.
pub async fn site_summary(State(state): State<AppState>, Path(site_id): Path<i64>) -> Result<Json<serde_json::Value>, ApiError> {
    let miners = state.telemetry.list_live_by_site(site_id).await?;

    let total = miners.len();
    let online = miners.iter().filter(|m| m.status.eq_ignore_ascii_case("online")).count();
    let total_hashrate_ths: f64 = miners.iter().map(|m| m.hashrate_ths).sum();
    let total_power_w: f64 = miners.iter().map(|m| m.power_w).sum();
    let avg_temperature_c = if total > 0 {
        miners.iter().map(|m| m.temperature_c).sum::<f64>() / total as f64
    } else {
        0.0
    };

    Ok(Json(json!({
        "site_id": site_id,
        "total_miners": total,
        "online_miners": online,
        "offline_miners": total - online,
        "total_hashrate_ths": total_hashrate_ths,
        "total_power_w": total_power_w,
        "avg_temperature_c": avg_temperature_c,
    })))
}
