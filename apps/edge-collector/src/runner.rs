// [apps/edge-collector/src/runner.rs]
/*!
 * Composición raíz del runtime de borde (C10, spec §4.10): heartbeat,
 * pull incremental de secretos, poll/ejecución/ACK de comandos y reclamo/
 * ejecución de escaneos de IP corren como tareas `tokio::spawn`
 * independientes, cada una supervisada y coordinada por un único `watch`
 * de apagado cooperativo (REDESIGN FLAG, spec §9) -- nunca un hilo daemon
 * suelto.
 *
 * La falla de un miner objetivo nunca aborta el lote (spec §4.7/§7): cada
 * objetivo se ejecuta en su propio `try`-equivalente y su resultado se
 * agrega al multiset reportado en el ACK.
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fleetctl_core_envelope_crypto::SealedEnvelope;
use fleetctl_domain_adapters::{CgminerAdapter, MinerAdapter, SimulatedAdapter};
use fleetctl_infra_discovery::spawn_range_scan;
use fleetctl_infra_edge_uplink::{
    wire::{AckReceipt, CommandAckRequest, EdgeAckRequest, ScanClaimRequest, ScanProgressReport, ScanResultEntry, ScanResultsReport, TargetResultWire},
    EdgeUplinkClient,
};
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use crate::config::EdgeConfig;
use crate::crypto_context::CryptoContext;
use crate::dedup::CommandDeduplicator;

const CGMINER_PORT: u16 = 4028;

/// Credencial plaintext de un miner, resuelta vía C4 a partir del sobre
/// sellado o de la passphrase de sitio. `ip_address`/`port` resuelven el
/// paso "resolve its IP/port" de spec §4.7: en modo E2EE la IP del miner
/// viaja dentro del propio sobre cifrado, nunca en claro en el cloud.
#[derive(Debug, Clone, serde::Deserialize)]
struct MinerCredential {
    #[serde(default = "default_ip")]
    ip_address: String,
    #[serde(default = "default_port")]
    port: u16,
}

fn default_ip() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    CGMINER_PORT
}

pub struct EdgeRuntime {
    config: EdgeConfig,
    uplink: EdgeUplinkClient,
    crypto: CryptoContext,
    dedup: CommandDeduplicator,
    secret_cache: Mutex<HashMap<i64, Value>>,
    since_counter: AtomicI64,
}

impl EdgeRuntime {
    pub fn new(config: EdgeConfig, uplink: EdgeUplinkClient, crypto: CryptoContext, dedup: CommandDeduplicator) -> Self {
        Self {
            config,
            uplink,
            crypto,
            dedup,
            secret_cache: Mutex::new(HashMap::new()),
            since_counter: AtomicI64::new(0),
        }
    }

    pub fn is_once(&self) -> bool {
        self.config.once
    }

    /// Lanza las cuatro tareas supervisadas y bloquea hasta que
    /// `shutdown_rx` reciba la señal de apagado. En modo `--once` corre un
    /// solo ciclo de cada tarea y retorna sin esperar la señal.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        if self.config.once {
            self.heartbeat_tick().await;
            self.secret_pull_tick().await;
            self.command_poll_tick().await;
            self.scan_claim_tick().await;
            return;
        }

        let interval = Duration::from_secs(self.config.poll_interval_secs);

        let heartbeat = tokio::spawn({
            let this = Arc::clone(&self);
            let mut shutdown = shutdown_rx.clone();
            async move { supervised_loop("heartbeat", interval, &mut shutdown, || this.heartbeat_tick()).await }
        });
        let secret_pull = tokio::spawn({
            let this = Arc::clone(&self);
            let mut shutdown = shutdown_rx.clone();
            async move { supervised_loop("secret_pull", interval, &mut shutdown, || this.secret_pull_tick()).await }
        });
        let command_poll = tokio::spawn({
            let this = Arc::clone(&self);
            let mut shutdown = shutdown_rx.clone();
            async move { supervised_loop("command_poll", interval, &mut shutdown, || this.command_poll_tick()).await }
        });
        let scan_claim = tokio::spawn({
            let this = Arc::clone(&self);
            let mut shutdown = shutdown_rx.clone();
            async move { supervised_loop("scan_claim", interval, &mut shutdown, || this.scan_claim_tick()).await }
        });

        let _ = shutdown_rx.changed().await;
        let _ = (heartbeat.await, secret_pull.await, command_poll.await, scan_claim.await);
    }

    async fn heartbeat_tick(&self) {
        match self.uplink.send_heartbeat().await {
            Ok(response) => info!(last_seen_at = %response.last_seen_at, "heartbeat sent"),
            Err(err) => warn!(error = %err, "heartbeat failed"),
        }
    }

    /// Pull incremental de secretos por `since_counter` (spec §4.5):
    /// decifra cada sobre recibido y lo guarda en la caché local, que el
    /// poll de comandos consulta cuando un comando no trae su propio
    /// `encrypted_credentials` inline.
    async fn secret_pull_tick(&self) {
        let since_counter = self.since_counter.load(Ordering::Relaxed);
        let response = match self.uplink.pull_secrets(self.config.site_id, since_counter).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "secret pull failed");
                return;
            }
        };

        let mut max_counter = since_counter;
        let mut cache = self.secret_cache.lock().await;
        for named in &response.secrets {
            max_counter = max_counter.max(named.envelope.counter);
            match self.crypto.unseal_sealed_box(&named.envelope) {
                Ok(plaintext) => {
                    cache.insert(named.miner_id, plaintext);
                }
                Err(err) => warn!(miner_id = named.miner_id, error = %err, "failed to decrypt pulled secret"),
            }
        }
        drop(cache);

        if max_counter != since_counter {
            self.since_counter.store(max_counter, Ordering::Relaxed);
        }

        let receipts = response.secrets.iter().map(|s| AckReceipt { miner_id: s.miner_id, counter: s.envelope.counter }).collect();
        if !receipts.is_empty() {
            if let Err(err) = self.uplink.ack_secret_receipts(&EdgeAckRequest { receipts }).await {
                warn!(error = %err, "secret ack failed");
            }
        }
    }

    /// Un ciclo completo de poll -> decifrado -> ejecución -> ACK (spec
    /// §4.7). Los comandos ya vistos por `CommandDeduplicator` se
    /// reconocen (ACK inmediato con el resultado previamente calculado no
    /// se reintenta; se omiten silenciosamente, ya que el cloud sólo
    /// reentrega un `PULLED` tras perder su propio ACK).
    async fn command_poll_tick(&self) {
        let response = match self.uplink.poll_commands(self.config.site_id, 10).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "command poll failed");
                return;
            }
        };

        for command in response.commands {
            if self.dedup.is_executed(&command.command_id).await {
                continue;
            }

            let mut results = Vec::with_capacity(command.target_ids.len());
            for target_id in &command.target_ids {
                let result = self.execute_one(&command.command_type, &command.payload, *target_id, &command.encrypted_credentials).await;
                results.push(result);
            }

            self.dedup.mark_executed(command.command_id.clone()).await;

            if let Err(err) = self.uplink.ack_command(&command.command_id, &CommandAckRequest { results }).await {
                error!(command_id = %command.command_id, error = %err, "command ack failed");
            }
        }
    }

    async fn execute_one(&self, command_type: &str, payload: &Value, target_id: i64, encrypted_credentials: &Option<Value>) -> TargetResultWire {
        let credential = match self.resolve_credential(target_id, encrypted_credentials).await {
            Ok(credential) => credential,
            Err(message) => {
                return TargetResultWire { miner_id: target_id, status: "FAILED".into(), message, metrics: Default::default() }
            }
        };

        if !self.config.execution_enabled {
            return TargetResultWire {
                miner_id: target_id,
                status: "FAILED".into(),
                message: "execution disabled on this edge (EDGE_EXECUTION_ENABLED=false)".into(),
                metrics: Default::default(),
            };
        }

        let adapter = self.build_adapter(&credential);
        let outcome = adapter.execute(command_type, payload).await;

        TargetResultWire {
            miner_id: target_id,
            status: outcome.status_label().to_string(),
            message: outcome.message,
            metrics: outcome.metrics.into_iter().collect(),
        }
    }

    async fn resolve_credential(&self, target_id: i64, encrypted_credentials: &Option<Value>) -> Result<MinerCredential, String> {
        if let Some(bundle) = encrypted_credentials.as_ref().and_then(|v| v.get(target_id.to_string())) {
            let envelope: SealedEnvelope = serde_json::from_value(bundle.clone()).map_err(|e| format!("malformed inline envelope: {e}"))?;
            let plaintext = self.crypto.unseal_sealed_box(&envelope).map_err(|e| format!("decrypt failed: {e}"))?;
            return serde_json::from_value(plaintext).map_err(|e| format!("malformed credential payload: {e}"));
        }

        let cache = self.secret_cache.lock().await;
        match cache.get(&target_id) {
            Some(plaintext) => serde_json::from_value(plaintext.clone()).map_err(|e| format!("malformed cached credential: {e}")),
            None => Err("no credential available for this miner".to_string()),
        }
    }

    fn build_adapter(&self, credential: &MinerCredential) -> Box<dyn MinerAdapter> {
        match self.config.miner_mode.as_str() {
            "cgminer" => Box::new(CgminerAdapter::new(credential.ip_address.clone(), credential.port)),
            _ => Box::new(SimulatedAdapter::new(credential.ip_address.clone())),
        }
    }

    /// Reclama el siguiente job `PENDING` del sitio (spec §4.3 "picked up
    /// by an edge") y, si hay uno, lo ejecuta localmente con el escáner
    /// de C3 (único componente con alcance de red a los miners): fan-out
    /// acotado a `MAX_WORKERS`, progreso reportado cada segundo mientras
    /// corre, resultados y cierre reportados al terminar. Si no hay jobs
    /// pendientes, el tick es un no-op silencioso.
    async fn scan_claim_tick(&self) {
        let request = ScanClaimRequest { site_id: self.config.site_id, scan_job_id: None };
        let response = match self.uplink.claim_scan(&request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "scan claim failed");
                return;
            }
        };

        let Some(job) = response.scan_job else { return };
        info!(scan_job_id = %job.id, total_ips = job.total_ips, "claimed scan job, starting local probe");

        let credentials = (self.config.scan_http_user.clone(), self.config.scan_http_password.clone());
        let (session, handle) = match spawn_range_scan(&job.ip_range_start, &job.ip_range_end, job.site_id, credentials) {
            Ok(pair) => pair,
            Err(err) => {
                warn!(scan_job_id = %job.id, error = %err, "failed to start local scan");
                return;
            }
        };

        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        tokio::pin!(handle);
        let discovered = loop {
            tokio::select! {
                biased;
                result = &mut handle => {
                    break result.unwrap_or_default();
                }
                _ = ticker.tick() => {
                    let progress = session.snapshot().await;
                    let report = ScanProgressReport {
                        scanned_ips: progress.scanned_ips as i64,
                        discovered_miners: progress.discovered_miners as i64,
                    };
                    if let Err(err) = self.uplink.report_scan_progress(&job.id, &report).await {
                        warn!(scan_job_id = %job.id, error = %err, "scan progress report failed");
                    }
                }
            }
        };

        let entries: Vec<ScanResultEntry> = discovered
            .iter()
            .map(|miner| ScanResultEntry {
                ip_address: miner.ip_address.clone(),
                detected_model: miner.model.clone(),
                detected_type: miner.miner_type.clone(),
            })
            .collect();

        info!(scan_job_id = %job.id, discovered = entries.len(), "local scan finished, reporting results");
        let report = ScanResultsReport { discovered: entries, completed: true };
        if let Err(err) = self.uplink.report_scan_results(&job.id, &report).await {
            warn!(scan_job_id = %job.id, error = %err, "scan results report failed");
        }
    }
}

async fn supervised_loop<F, Fut>(name: &'static str, interval: Duration, shutdown: &mut watch::Receiver<bool>, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => tick().await,
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!(task = name, "edge task stopping");
                    break;
                }
            }
        }
    }
}
