// [libs/core/envelope-crypto/src/errors.rs]
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("[ENVELOPE_VALIDATION]: {0}")]
    Validation(String),

    #[error("[ENVELOPE_DECRYPT]: authentication failed, payload rejected")]
    AuthenticationFailed,

    #[error("[ENVELOPE_ENCODING]: {0}")]
    Encoding(String),

    #[error("[ENVELOPE_SERIALIZATION]: {0}")]
    Serialization(String),
}
