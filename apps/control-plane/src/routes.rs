// [apps/control-plane/src/routes.rs]
/*!
 * Árbol de rutas completo del plano de control (spec §6). Dos grupos:
 * uno de operador (sin guardia, asumido detrás de un panel de
 * administración propio) y uno Bearer `device_token` para todo lo que
 * el propio dispositivo de borde invoca sobre sí mismo o su sitio.
 */

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::{commands, devices, miners, scan, secrets, telemetry};
use crate::middleware::device_auth_guard;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let operator_routes = Router::new()
        .route("/admin/devices", post(devices::register))
        .route("/admin/devices/:id/revoke", post(devices::revoke))
        .route("/admin/devices/:id/rotate-key", post(devices::rotate_key))
        .route("/admin/miners", post(miners::create).get(miners::list_by_site))
        .route("/admin/miners/:id/capability", post(miners::set_capability))
        .route("/admin/miners/:id/bind-device", post(miners::bind_device))
        .route("/admin/miners/:id/reveal-ip", get(miners::reveal_ip))
        .route("/admin/miners/:id/secret", post(secrets::upsert))
        .route("/admin/commands", post(commands::enqueue))
        .route("/commands", get(commands::list_by_site))
        .route("/admin/scan", post(scan::create))
        .route("/scan/:id", get(scan::get_job))
        .route("/scan/:id/discovered", get(scan::list_discovered))
        .route("/miners/:id/telemetry/live", get(telemetry::live))
        .route("/miners/:id/telemetry/history", get(telemetry::history))
        .route("/sites/:id/telemetry/summary", get(telemetry::site_summary));

    let device_routes = Router::new()
        .route("/devices/:id/pubkey", get(devices::get_pubkey))
        .route("/devices/:id/heartbeat", post(devices::heartbeat))
        .route("/edge/secrets", get(secrets::pull_bulk))
        .route("/edge/secrets/:miner_id", get(secrets::pull_single))
        .route("/edge/status", get(secrets::status))
        .route("/edge/ack", post(secrets::ack))
        .route("/edge/scan", post(scan::claim))
        .route("/edge/scan/:id/progress", post(scan::progress))
        .route("/edge/scan/:id/results", post(scan::results))
        .route("/edge/telemetry", post(telemetry::ingest))
        .route("/edge/v1/commands/poll", get(commands::poll))
        .route("/edge/v1/commands/:id/ack", post(commands::ack))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), device_auth_guard));

    Router::new()
        .merge(operator_routes)
        .merge(device_routes)
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}
