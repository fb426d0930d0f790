// [apps/control-plane/src/main.rs]
/*!
 * =================================================================
 * APARATO: PUNTO DE ENTRADA DEL PLANO DE CONTROL (V1.0)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1-APP)
 * RESPONSABILIDAD: IGNICIÓN DE DB, RUTAS AXUM Y TAREAS DE MANTENIMIENTO
 * =================================================================
 */

use std::net::SocketAddr;

use anyhow::Context;
use dotenvy::dotenv;
use fleetctl_control_plane::{jobs, routes, state::AppState};
use fleetctl_infra_db::DbClient;
use fleetctl_shared_heimdall::init_tracing;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing("fleetctl_control_plane");

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let database_token = std::env::var("TURSO_AUTH_TOKEN").ok();
    let listen_port: u16 = std::env::var("PORT").unwrap_or_else(|_| "3000".into()).parse().context("PORT must be a u16")?;

    let db = DbClient::connect(&database_url, database_token).await.context("failed to connect to database")?;
    let state = AppState::new(db);

    let (telemetry_shutdown, telemetry_handles) = jobs::spawn_telemetry_jobs(state.telemetry.clone());

    let router = routes::build_router(state);
    let address = SocketAddr::from(([0, 0, 0, 0], listen_port));
    let listener = tokio::net::TcpListener::bind(address).await.with_context(|| format!("failed to bind {address}"))?;

    info!(%address, "control plane listening");
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    let _ = telemetry_shutdown.send(true);
    for handle in telemetry_handles {
        let _ = handle.await;
    }

    Ok(())
}

/// Espera `Ctrl+C` o `SIGTERM` (contenedores) para iniciar el apagado
/// cooperativo del servidor y de las tareas de mantenimiento (spec §9).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
