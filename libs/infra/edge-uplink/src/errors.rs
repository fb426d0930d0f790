// [libs/infra/edge-uplink/src/errors.rs]
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UplinkError {
    #[error("network fault reaching control plane: {0}")]
    NetworkFault(#[from] reqwest::Error),

    #[error("control plane rejected the request: {0}")]
    ServerRejection(String),

    #[error("capability denied: {reason}")]
    CapabilityDenied { reason: String, required_level: Option<i32>, miner_level: Option<i32> },

    #[error("response decoding failed: {0}")]
    DecodingFault(#[from] serde_json::Error),

    #[error("device token unauthorized or revoked")]
    Unauthorized,
}
