// [apps/control-plane/src/middleware/auth.rs]
/*!
 * Portero Bearer `device_token` de todas las rutas `/devices/*` y
 * `/edge/*` (spec §6). Inyecta el `EdgeDevice` resuelto en las
 * extensiones de la petición para que cada handler construya su
 * propio `AuthContext` sin volver a tocar la base de datos.
 */

use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use fleetctl_domain_models::EdgeDevice;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct DeviceIdentity(pub EdgeDevice);

pub async fn device_auth_guard(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let auth_header = req.headers().get(header::AUTHORIZATION).and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(value) if value.starts_with("Bearer ") => &value[7..],
        _ => {
            warn!("rejected request with missing or malformed Authorization header");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    match state.devices.authenticate_by_token(token).await {
        Ok(device) => {
            req.extensions_mut().insert(DeviceIdentity(device));
            Ok(next.run(req).await)
        }
        Err(_) => {
            warn!("rejected request with unrecognized device token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
