// [libs/core/miner-proto/src/errors.rs]
/*!
 * =================================================================
 * APARATO: MINER PROTOCOL ERROR CATALOG (V1.0)
 * CLASIFICACIÓN: CORE LAYER (ESTRATO L1)
 * RESPONSABILIDAD: TAXONOMÍA DE FALLOS DEL ENLACE CGMINER
 * =================================================================
 */

use thiserror::Error;

/// Taxonomía de fallos del cliente CGMiner, alineada 1:1 con spec §4.1/§7.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MinerProtoError {
    #[error("[MINER_PROTO_TIMEOUT]: connection to {host}:{port} timed out after {timeout_secs}s")]
    Timeout {
        host: String,
        port: u16,
        timeout_secs: u64,
    },

    #[error("[MINER_PROTO_CONNECTION]: {0}")]
    Connection(String),

    #[error("[MINER_PROTO_DNS]: DNS resolution failed for {0}")]
    Dns(String),

    #[error("[MINER_PROTO_PARSE]: {reason} (preview: {preview})")]
    Parse { reason: String, preview: String },

    #[error("[MINER_PROTO_VALIDATION]: {0}")]
    Validation(String),

    #[error("[MINER_PROTO_UNKNOWN]: {0}")]
    Unknown(String),
}

impl MinerProtoError {
    /// Etiqueta de error canónica del §4.1: {timeout, connection, dns, parse, unknown}.
    pub fn error_type(&self) -> &'static str {
        match self {
            MinerProtoError::Timeout { .. } => "timeout",
            MinerProtoError::Connection(_) => "connection",
            MinerProtoError::Dns(_) => "dns",
            MinerProtoError::Parse { .. } => "parse",
            MinerProtoError::Validation(_) => "validation",
            MinerProtoError::Unknown(_) => "unknown",
        }
    }

    /// §4.1: retried on timeout/connection only, never on validation/parse.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MinerProtoError::Timeout { .. } | MinerProtoError::Connection(_))
    }
}
