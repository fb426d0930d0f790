// [libs/infra/discovery/src/scanner.rs]
/*!
 * =================================================================
 * APARATO: ESCÁNER DE RANGOS IP (V1.0)
 * CLASIFICACIÓN: INFRA LAYER (ESTRATO L3)
 * RESPONSABILIDAD: DESCUBRIMIENTO CONCURRENTE Y ACOTADO DE MINERS
 *
 * El escaneo se despacha como una tarea tokio supervisada (no un hilo
 * daemon suelto): el llamador conserva el `JoinHandle` y puede pedir
 * cancelación cooperativa vía un `watch` channel.
 * =================================================================
 */

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fleetctl_core_miner_proto::{quick_probe, MinerProtoClient};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info};
use uuid::Uuid;

use crate::range::{parse_cidr, parse_ip_range, RangeParseError};
use crate::signatures::{identify_type_from_string, MinerType, HTTP_PORTS, MINER_SIGNATURES};

pub const CGMINER_PORT: u16 = 4028;
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;
pub const MAX_WORKERS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanStatus {
    Pending,
    Scanning,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredMiner {
    pub ip_address: String,
    pub port: u16,
    pub miner_type: String,
    pub model: String,
    pub firmware: String,
    pub hashrate_ths: f64,
    pub temperature: f64,
    pub online: bool,
    pub mac_address: String,
    pub worker: String,
    pub pool_url: String,
    pub uptime_hours: f64,
    pub latency_ms: f64,
    pub scan_time: DateTime<Utc>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    pub scan_id: String,
    pub site_id: i64,
    pub total_ips: usize,
    pub scanned_ips: u64,
    pub discovered_miners: u64,
    pub status: ScanStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ScanProgress {
    pub fn progress_percent(&self) -> f64 {
        if self.total_ips == 0 {
            return 0.0;
        }
        ((self.scanned_ips as f64 / self.total_ips as f64) * 1000.0).round() / 10.0
    }
}

pub fn generate_scan_id(site_id: i64) -> String {
    format!("scan_{site_id}_{}", Uuid::new_v4().simple())
}

struct ScanCounters {
    scanned: AtomicU64,
    discovered: AtomicU64,
}

/// Un escaneo en curso o terminado. Clonable barato: comparte el estado
/// interno vía `Arc`, de modo que el handle del caller y la tarea
/// `tokio::spawn`'d apuntan a la misma fuente de verdad.
pub struct ScanSession {
    progress: Arc<tokio::sync::Mutex<ScanProgress>>,
    counters: Arc<ScanCounters>,
    cancel_tx: watch::Sender<bool>,
}

impl ScanSession {
    pub async fn snapshot(&self) -> ScanProgress {
        let mut progress = self.progress.lock().await.clone();
        progress.scanned_ips = self.counters.scanned.load(Ordering::Relaxed);
        progress.discovered_miners = self.counters.discovered.load(Ordering::Relaxed);
        progress
    }

    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }
}

/// Inicia un escaneo de `start_ip..=end_ip` como tarea supervisada.
/// Devuelve de inmediato el `ScanSession` (para sondear progreso/cancelar)
/// y el `JoinHandle` que resuelve con la lista final de miners descubiertos.
pub fn spawn_range_scan(
    start_ip: &str,
    end_ip: &str,
    site_id: i64,
    credentials: (String, String),
) -> Result<(ScanSession, tokio::task::JoinHandle<Vec<DiscoveredMiner>>), RangeParseError> {
    let ip_list = parse_ip_range(start_ip, end_ip)?;
    Ok(spawn_scan(ip_list, site_id, credentials))
}

/// Igual que [`spawn_range_scan`] pero a partir de notación CIDR.
pub fn spawn_cidr_scan(
    cidr: &str,
    site_id: i64,
    credentials: (String, String),
) -> Result<(ScanSession, tokio::task::JoinHandle<Vec<DiscoveredMiner>>), RangeParseError> {
    let ip_list = parse_cidr(cidr)?;
    Ok(spawn_scan(ip_list, site_id, credentials))
}

fn spawn_scan(
    ip_list: Vec<Ipv4Addr>,
    site_id: i64,
    credentials: (String, String),
) -> (ScanSession, tokio::task::JoinHandle<Vec<DiscoveredMiner>>) {
    let scan_id = generate_scan_id(site_id);
    let total_ips = ip_list.len();

    let progress = Arc::new(tokio::sync::Mutex::new(ScanProgress {
        scan_id: scan_id.clone(),
        site_id,
        total_ips,
        scanned_ips: 0,
        discovered_miners: 0,
        status: ScanStatus::Pending,
        start_time: Utc::now(),
        end_time: None,
        error: None,
    }));

    let counters = Arc::new(ScanCounters {
        scanned: AtomicU64::new(0),
        discovered: AtomicU64::new(0),
    });

    let (cancel_tx, cancel_rx) = watch::channel(false);

    let session = ScanSession {
        progress: Arc::clone(&progress),
        counters: Arc::clone(&counters),
        cancel_tx,
    };

    let handle = tokio::spawn(run_scan(
        ip_list,
        progress,
        Arc::clone(&counters),
        cancel_rx,
        credentials,
        scan_id,
    ));

    (session, handle)
}

async fn run_scan(
    ip_list: Vec<Ipv4Addr>,
    progress: Arc<tokio::sync::Mutex<ScanProgress>>,
    counters: Arc<ScanCounters>,
    mut cancel_rx: watch::Receiver<bool>,
    credentials: (String, String),
    scan_id: String,
) -> Vec<DiscoveredMiner> {
    {
        let mut guard = progress.lock().await;
        guard.status = ScanStatus::Scanning;
    }

    let semaphore = Arc::new(Semaphore::new(MAX_WORKERS));
    let mut handles = Vec::with_capacity(ip_list.len());

    for ip in ip_list {
        if *cancel_rx.borrow() {
            break;
        }
        let permit_semaphore = Arc::clone(&semaphore);
        let (username, password) = credentials.clone();
        let counters = Arc::clone(&counters);
        let mut cancel_rx = cancel_rx.clone();

        handles.push(tokio::spawn(async move {
            let _permit = permit_semaphore.acquire_owned().await.ok();
            if *cancel_rx.borrow() {
                return None;
            }
            let result = probe_single_ip(ip, &username, &password).await;
            counters.scanned.fetch_add(1, Ordering::Relaxed);
            if result.is_some() {
                counters.discovered.fetch_add(1, Ordering::Relaxed);
            }
            result
        }));
    }

    let mut discovered = Vec::new();
    for handle in handles {
        if let Ok(Some(miner)) = handle.await {
            info!(scan_id = %scan_id, ip = %miner.ip_address, model = %miner.model, "discovered miner");
            discovered.push(miner);
        }
    }

    let mut guard = progress.lock().await;
    guard.status = if *cancel_rx.borrow() {
        ScanStatus::Cancelled
    } else {
        ScanStatus::Completed
    };
    guard.end_time = Some(Utc::now());

    discovered
}

async fn probe_single_ip(ip: Ipv4Addr, username: &str, password: &str) -> Option<DiscoveredMiner> {
    let ip_string = ip.to_string();
    let scan_time = Utc::now();

    let probe = quick_probe(&ip_string, CGMINER_PORT, DEFAULT_TIMEOUT_SECS).await;

    if probe.result != "OK" {
        return probe_http_fallback(&ip_string, username, password, scan_time).await;
    }

    let mut miner = DiscoveredMiner {
        ip_address: ip_string.clone(),
        port: CGMINER_PORT,
        miner_type: MinerType::Unknown.as_str().to_string(),
        model: "Unknown".into(),
        firmware: "Unknown".into(),
        hashrate_ths: probe.hashrate_ghs / 1000.0,
        temperature: probe.temp_max_c,
        online: true,
        mac_address: String::new(),
        worker: String::new(),
        pool_url: String::new(),
        uptime_hours: 0.0,
        latency_ms: probe.latency_ms,
        scan_time,
        error: None,
    };

    if let Ok(mut client) = MinerProtoClient::with_options(&ip_string, CGMINER_PORT, DEFAULT_TIMEOUT_SECS, 1, false) {
        if let Ok(version) = client.send_command("version", "").await {
            if let Some(entry) = version.get("VERSION").and_then(|v| v.get(0)) {
                let type_string = entry
                    .get("Type")
                    .or_else(|| entry.get("Miner"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                miner.miner_type = identify_type_from_string(type_string).as_str().to_string();
                miner.model = type_string.to_string();
                miner.firmware = entry
                    .get("CGMiner")
                    .or_else(|| entry.get("API"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("Unknown")
                    .to_string();
            }
        }

        if let Ok(stats) = client.send_command("stats", "").await {
            if let Some(entries) = stats.get("STATS").and_then(|v| v.as_array()) {
                for entry in entries {
                    if let Some(id) = entry.get("miner_id").and_then(|v| v.as_str()) {
                        miner.mac_address = id.to_string();
                    }
                    if miner.model == "Unknown" || miner.model.is_empty() {
                        if let Some(type_str) = entry
                            .get("Type")
                            .or_else(|| entry.get("ID"))
                            .and_then(|v| v.as_str())
                        {
                            miner.model = type_str.to_string();
                            miner.miner_type = identify_type_from_string(type_str).as_str().to_string();
                        }
                    }
                }
            }
        }

        if let Ok(pools) = client.send_command("pools", "").await {
            if let Some(entries) = pools.get("POOLS").and_then(|v| v.as_array()) {
                for pool in entries {
                    let alive = pool.get("Status").and_then(|v| v.as_str()) == Some("Alive");
                    let active = pool.get("Stratum Active").and_then(|v| v.as_bool()).unwrap_or(false);
                    if alive || active {
                        miner.pool_url = pool.get("URL").and_then(|v| v.as_str()).unwrap_or("").to_string();
                        miner.worker = pool.get("User").and_then(|v| v.as_str()).unwrap_or("").to_string();
                        break;
                    }
                }
            }
        }

        if let Ok(summary) = client.send_command("summary", "").await {
            if let Some(entry) = summary.get("SUMMARY").and_then(|v| v.get(0)) {
                let elapsed = entry.get("Elapsed").and_then(|v| v.as_f64()).unwrap_or(0.0);
                miner.uptime_hours = elapsed / 3600.0;
            }
        }
    } else {
        debug!(ip = %ip_string, "failed to open detail connection after successful quick probe");
    }

    if miner.miner_type == MinerType::Unknown.as_str() {
        if let Some(http_match) = probe_http_fallback(&ip_string, username, password, scan_time).await {
            if http_match.online {
                miner.miner_type = http_match.miner_type;
                if miner.model == "Unknown" {
                    miner.model = http_match.model;
                }
                if http_match.port != CGMINER_PORT {
                    miner.port = http_match.port;
                }
            }
        }
    }

    Some(miner)
}

async fn probe_http_fallback(
    ip: &str,
    username: &str,
    password: &str,
    scan_time: DateTime<Utc>,
) -> Option<DiscoveredMiner> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .danger_accept_invalid_certs(true)
        .build()
        .ok()?;

    for &port in HTTP_PORTS {
        for signature in MINER_SIGNATURES {
            let url = format!("http://{ip}:{port}{}", signature.http_path);

            let response = match client
                .get(&url)
                .basic_auth(username, Some(password))
                .send()
                .await
            {
                Ok(response) => response,
                Err(_) => continue,
            };

            if response.status().as_u16() != 200 {
                continue;
            }

            let Ok(body) = response.text().await else { continue };
            let body_lower = body.to_lowercase();

            let matched = signature
                .http_contains
                .iter()
                .any(|keyword| body_lower.contains(&keyword.to_lowercase()));

            if matched {
                let mut hashrate_ths = 0.0;
                let mut model = "Unknown".to_string();
                if let Ok(json) = serde_json::from_str::<serde_json::Value>(&body) {
                    if let Some(m) = json.get("model").and_then(|v| v.as_str()) {
                        model = m.to_string();
                    }
                    if let Some(h) = json.get("hashrate").and_then(|v| v.as_f64()) {
                        hashrate_ths = h / 1000.0;
                    }
                }

                return Some(DiscoveredMiner {
                    ip_address: ip.to_string(),
                    port,
                    miner_type: signature.miner_type.as_str().to_string(),
                    model,
                    firmware: "Unknown".into(),
                    hashrate_ths,
                    temperature: 0.0,
                    online: true,
                    mac_address: String::new(),
                    worker: String::new(),
                    pool_url: String::new(),
                    uptime_hours: 0.0,
                    latency_ms: 0.0,
                    scan_time,
                    error: None,
                });
            }
        }
    }

    None
}
