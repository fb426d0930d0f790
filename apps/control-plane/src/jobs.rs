// [apps/control-plane/src/jobs.rs]
/*!
 * Promociones periódicas de la capa de telemetría (spec §4.6): cada
 * cadencia corre como su propia tarea `tokio::spawn` supervisada, nunca
 * como un hilo suelto, y todas comparten un único `watch` de apagado
 * cooperativo (REDESIGN FLAGS, spec §9: nada de loops desatendidos).
 */

use std::time::Duration;

use chrono::Utc;
use fleetctl_infra_db::TelemetryRepository;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

const HISTORY_5MIN_INTERVAL: Duration = Duration::from_secs(60);
const DAILY_INTERVAL: Duration = Duration::from_secs(60 * 60 * 24);
const PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Lanza las tres tareas de mantenimiento de `raw_24h -> live -> history_5min
/// -> daily` y devuelve sus `JoinHandle`s junto con el extremo emisor del
/// apagado cooperativo.
pub fn spawn_telemetry_jobs(telemetry: Arc<TelemetryRepository>) -> (watch::Sender<bool>, Vec<tokio::task::JoinHandle<()>>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handles = vec![
        tokio::spawn(run_periodic(
            "promote_history_5min",
            HISTORY_5MIN_INTERVAL,
            shutdown_rx.clone(),
            {
                let telemetry = Arc::clone(&telemetry);
                move || {
                    let telemetry = Arc::clone(&telemetry);
                    async move { telemetry.promote_history_5min(Utc::now()).await.map(|n| n as u64) }
                }
            },
        )),
        tokio::spawn(run_periodic("promote_daily", DAILY_INTERVAL, shutdown_rx.clone(), {
            let telemetry = Arc::clone(&telemetry);
            move || {
                let telemetry = Arc::clone(&telemetry);
                async move { telemetry.promote_daily(Utc::now()).await.map(|n| n as u64) }
            }
        })),
        tokio::spawn(run_periodic("prune_expired", PRUNE_INTERVAL, shutdown_rx.clone(), {
            let telemetry = Arc::clone(&telemetry);
            move || {
                let telemetry = Arc::clone(&telemetry);
                async move { telemetry.prune_expired(Utc::now()).await.map(|_| 0u64) }
            }
        })),
    ];

    (shutdown_tx, handles)
}

/// Corre `task` cada `interval` hasta que `shutdown` se marque en `true`.
/// Un error de una pasada individual se registra y no detiene la tarea
/// siguiente: promociones fallidas son reintentadas en la próxima marca.
async fn run_periodic<F, Fut>(name: &'static str, interval: Duration, mut shutdown: watch::Receiver<bool>, task: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<u64, fleetctl_infra_db::DbError>>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match task().await {
                    Ok(affected) => info!(job = name, affected, "telemetry maintenance job completed"),
                    Err(err) => error!(job = name, error = %err, "telemetry maintenance job failed"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!(job = name, "telemetry maintenance job stopping");
                    break;
                }
            }
        }
    }
}
