// [libs/core/miner-proto/src/telemetry.rs]
/*!
 * =================================================================
 * APARATO: NORMALIZED TELEMETRY RECORD (V1.0)
 * CLASIFICACIÓN: CORE LAYER (ESTRATO L1)
 * RESPONSABILIDAD: FRONTERA DE NORMALIZACIÓN ENTRE FIRMWARE Y DOMINIO
 *
 * Ninguna capa aguas abajo debe inspeccionar el JSON crudo del
 * fabricante: todo pasa por este struct fijo (REDESIGN FLAG §9,
 * "dynamic, duck-typed telemetry payloads").
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MinerOnlineStatus {
    Online,
    Offline,
    Error,
}

impl MinerOnlineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MinerOnlineStatus::Online => "online",
            MinerOnlineStatus::Offline => "offline",
            MinerOnlineStatus::Error => "error",
        }
    }
}

/// Telemetría normalizada de un único miner, producida por
/// [`crate::client::get_normalized_telemetry`]. Unidades fijas: GH/s, Celsius, RPM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub hashrate_5s_ghs: f64,
    pub hashrate_avg_ghs: f64,
    pub uptime_seconds: u64,
    pub accepted_shares: u64,
    pub rejected_shares: u64,
    pub temp_avg_c: f64,
    pub temp_max_c: f64,
    pub fan_speeds_rpm: Vec<i64>,
    pub pool_url: String,
    pub worker: String,
    pub status: MinerOnlineStatus,
    pub as_of: DateTime<Utc>,
    pub latency_ms: f64,
    pub error: Option<String>,
}

impl Default for TelemetryRecord {
    fn default() -> Self {
        Self {
            hashrate_5s_ghs: 0.0,
            hashrate_avg_ghs: 0.0,
            uptime_seconds: 0,
            accepted_shares: 0,
            rejected_shares: 0,
            temp_avg_c: 0.0,
            temp_max_c: 0.0,
            fan_speeds_rpm: Vec::new(),
            pool_url: String::new(),
            worker: String::new(),
            status: MinerOnlineStatus::Offline,
            as_of: Utc::now(),
            latency_ms: 0.0,
            error: None,
        }
    }
}

/// Resultado compacto para sondas rápidas (CLI / scanner), ver spec §6 exit codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickProbeResult {
    pub result: String, // "OK" | "FAIL"
    pub host: String,
    pub port: u16,
    pub latency_ms: f64,
    pub hashrate_ghs: f64,
    pub temp_max_c: f64,
    pub status: String,
    pub as_of: DateTime<Utc>,
    pub error: Option<String>,
}

/// Interroga `summary`/`stats`/`pools` y colapsa el resultado en un
/// [`TelemetryRecord`] fijo. Ningún fallo parcial (stats o pools
/// inalcanzables) invalida el resto: sólo `summary` es obligatorio.
pub async fn get_normalized_telemetry(client: &mut crate::client::MinerProtoClient) -> TelemetryRecord {
    let mut record = TelemetryRecord::default();

    let summary = match client.send_command("summary", "").await {
        Ok(value) => value,
        Err(err) => {
            record.status = MinerOnlineStatus::Error;
            record.error = Some(err.to_string());
            return record;
        }
    };

    record.latency_ms = client.last_latency_ms();

    if let Some(entry) = summary.get("SUMMARY").and_then(|s| s.get(0)) {
        record.hashrate_5s_ghs = ghs_or_mhs(entry, "GHS 5s", "MHS 5s");
        record.hashrate_avg_ghs = ghs_or_mhs(entry, "GHS av", "MHS av");
        record.uptime_seconds = entry.get("Elapsed").and_then(|v| v.as_u64()).unwrap_or(0);
        record.accepted_shares = entry.get("Accepted").and_then(|v| v.as_u64()).unwrap_or(0);
        record.rejected_shares = entry.get("Rejected").and_then(|v| v.as_u64()).unwrap_or(0);
        record.status = MinerOnlineStatus::Online;
    }

    if let Ok(stats) = client.send_command("stats", "").await {
        if let Some(entries) = stats.get("STATS").and_then(|v| v.as_array()) {
            let mut temps = Vec::new();
            let mut fans = Vec::new();
            for entry in entries {
                if let Some(obj) = entry.as_object() {
                    for (key, value) in obj {
                        let key_lower = key.to_lowercase();
                        let Some(number) = value.as_f64() else { continue };
                        if key_lower.contains("temp") && number > 0.0 {
                            temps.push(number);
                        }
                        if key_lower.contains("fan") && number > 0.0 {
                            fans.push(number as i64);
                        }
                    }
                }
            }
            if !temps.is_empty() {
                record.temp_avg_c = temps.iter().sum::<f64>() / temps.len() as f64;
                record.temp_max_c = temps.iter().cloned().fold(f64::MIN, f64::max);
            }
            if !fans.is_empty() {
                record.fan_speeds_rpm = fans;
            }
        }
    }

    if let Ok(pools) = client.send_command("pools", "").await {
        if let Some(entries) = pools.get("POOLS").and_then(|v| v.as_array()) {
            let active = entries
                .iter()
                .find(|p| {
                    p.get("Status").and_then(|v| v.as_str()) == Some("Alive")
                        && p.get("Stratum Active").and_then(|v| v.as_bool()).unwrap_or(false)
                })
                .or_else(|| entries.first());
            if let Some(pool) = active {
                record.pool_url = pool.get("URL").and_then(|v| v.as_str()).unwrap_or("").to_string();
                record.worker = pool.get("User").and_then(|v| v.as_str()).unwrap_or("").to_string();
            }
        }
    }

    record.as_of = client.last_response_time().unwrap_or(record.as_of);
    record
}

fn ghs_or_mhs(entry: &serde_json::Value, ghs_key: &str, mhs_key: &str) -> f64 {
    if let Some(ghs) = entry.get(ghs_key).and_then(|v| v.as_f64()) {
        return ghs;
    }
    entry.get(mhs_key).and_then(|v| v.as_f64()).unwrap_or(0.0) / 1000.0
}

/// Sondeo mínimo de un host:port. Usado por el escáner (C3) y el CLI
/// probe: abre una conexión, pide `version`, y cierra — sin reintentos
/// largos, pensado para barridos masivos.
pub async fn quick_probe(host: &str, port: u16, timeout_secs: u64) -> QuickProbeResult {
    let as_of = Utc::now();
    let client = crate::client::MinerProtoClient::with_options(host, port, timeout_secs, 1, false);

    let mut client = match client {
        Ok(c) => c,
        Err(err) => {
            return QuickProbeResult {
                result: "FAIL".into(),
                host: host.to_string(),
                port,
                latency_ms: 0.0,
                hashrate_ghs: 0.0,
                temp_max_c: 0.0,
                status: "error".into(),
                as_of,
                error: Some(err.to_string()),
            };
        }
    };

    match client.send_command("version", "").await {
        Ok(_) => {
            let telemetry = get_normalized_telemetry(&mut client).await;
            QuickProbeResult {
                result: "OK".into(),
                host: host.to_string(),
                port,
                latency_ms: client.last_latency_ms(),
                hashrate_ghs: telemetry.hashrate_5s_ghs,
                temp_max_c: telemetry.temp_max_c,
                status: telemetry.status.as_str().to_string(),
                as_of: telemetry.as_of,
                error: None,
            }
        }
        Err(err) => QuickProbeResult {
            result: "FAIL".into(),
            host: host.to_string(),
            port,
            latency_ms: client.last_latency_ms(),
            hashrate_ghs: 0.0,
            temp_max_c: 0.0,
            status: "offline".into(),
            as_of,
            error: Some(err.to_string()),
        },
    }
}
