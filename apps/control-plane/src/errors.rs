// [apps/control-plane/src/errors.rs]
/*!
 * Unifica los `DbError` de `fleetctl-infra-db` y los `GateDenial` de C8 en
 * una única respuesta HTTP. Cada handler devuelve `Result<_, ApiError>` en
 * vez de construir su propio `match` sobre `StatusCode`, como hace el
 * orquestador legado -- aquí el volumen de endpoints (§6 completo) hace
 * que ese patrón ad hoc se repita demasiado para valer la pena.
 */

use axum::{http::StatusCode, response::IntoResponse, Json};
use fleetctl_domain_models::GateDenial;
use fleetctl_infra_db::DbError;
use serde_json::json;

pub enum ApiError {
    Db(DbError),
    GateDenied { denial: GateDenial, required_level: i32, miner_level: i32 },
    NotFound(&'static str),
    BadRequest(String),
    Unauthorized,
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ApiError::Db(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::Db(DbError::DeviceNotFound) => (StatusCode::NOT_FOUND, Json(json!({"error": "device not found"}))).into_response(),
            ApiError::Db(DbError::MinerNotFound) => (StatusCode::NOT_FOUND, Json(json!({"error": "miner not found"}))).into_response(),
            ApiError::Db(DbError::ScanJobNotFound) => (StatusCode::NOT_FOUND, Json(json!({"error": "scan job not found"}))).into_response(),
            ApiError::Db(DbError::CommandNotFound) => (StatusCode::NOT_FOUND, Json(json!({"error": "command not found"}))).into_response(),
            ApiError::Db(DbError::KeyVersionMismatch { expected, provided }) => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "key version mismatch", "expected": expected, "provided": provided})),
            )
                .into_response(),
            ApiError::Db(DbError::CounterRegression { current, attempted }) => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "counter regression", "current": current, "attempted": attempted})),
            )
                .into_response(),
            ApiError::Db(other) => {
                tracing::error!(error = %other, "unhandled database fault");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "internal error"}))).into_response()
            }
            ApiError::GateDenied { denial, required_level, miner_level } => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": gate_denial_message(denial),
                    "required_level": required_level,
                    "miner_level": miner_level,
                })),
            )
                .into_response(),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, Json(json!({"error": what}))).into_response(),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, Json(json!({"error": message}))).into_response(),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"}))).into_response(),
        }
    }
}

fn gate_denial_message(denial: GateDenial) -> &'static str {
    match denial {
        GateDenial::DeviceRevoked => "Device is revoked",
        GateDenial::CapabilityDenied => "Capability level insufficient",
        GateDenial::BoundDeviceDenied => "Miner is bound to a different device",
        GateDenial::KeyVersionMismatch => "Key version mismatch",
    }
}
