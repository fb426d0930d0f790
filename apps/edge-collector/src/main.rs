// [apps/edge-collector/src/main.rs]
/*!
 * =================================================================
 * APARATO: PUNTO DE ENTRADA DEL RUNTIME DE BORDE (V1.0)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1-APP)
 * RESPONSABILIDAD: IGNICIÓN DE CryptoContext, UPLINK Y TAREAS SUPERVISADAS
 * =================================================================
 */

mod config;
mod crypto_context;
mod dedup;
mod runner;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use fleetctl_infra_edge_uplink::EdgeUplinkClient;
use fleetctl_shared_heimdall::init_tracing;
use tokio::signal;
use tracing::info;

use config::EdgeConfig;
use crypto_context::CryptoContext;
use dedup::CommandDeduplicator;
use runner::EdgeRuntime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing("fleetctl_edge_collector");

    let config = EdgeConfig::parse();
    let crypto = CryptoContext::from_config(&config).context("crypto context initialization failed")?;
    let dedup = CommandDeduplicator::load(&config.dedup_store_path).await;
    let uplink = EdgeUplinkClient::new(config.api_base_url.clone(), config.auth_token.clone(), config.device_id);

    info!(device_id = config.device_id, site_id = config.site_id, mode = %config.miner_mode, "edge collector igniting");

    let runtime = Arc::new(EdgeRuntime::new(config, uplink, crypto, dedup));
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let run_handle = tokio::spawn({
        let runtime = Arc::clone(&runtime);
        async move { runtime.run(shutdown_rx).await }
    });

    if runtime.is_once() {
        run_handle.await?;
        return Ok(());
    }

    signal::ctrl_c().await.context("failed to install Ctrl+C handler")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    run_handle.await?;

    Ok(())
}
