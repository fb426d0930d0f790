// [libs/infra/db/src/errors.rs]
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("[L3_DB_NET_FAULT]: database uplink severed -> {0}")]
    ConnectionError(String),

    #[error("[L3_DB_CONFIG_FAULT]: environment configuration void -> {0}")]
    ConfigurationError(String),

    #[error("[L3_DB_QUERY_FAULT]: query rejected -> {0}")]
    QueryError(#[from] libsql::Error),

    #[error("[L3_DB_MAPPING_FAULT]: row mapping violation -> {0}")]
    MappingError(String),

    #[error("device not found")]
    DeviceNotFound,

    #[error("miner not found")]
    MinerNotFound,

    #[error("scan job not found")]
    ScanJobNotFound,

    #[error("command not found")]
    CommandNotFound,

    /// La versión de clave de la escritura no coincide con la vigente
    /// del dispositivo (spec §3, invariante de `MinerSecret`).
    #[error("key version mismatch: expected {expected}, got {provided}")]
    KeyVersionMismatch { expected: i32, provided: i32 },

    /// El contador de la escritura no es estrictamente mayor al vigente
    /// (spec §3/§8, anti-rollback).
    #[error("counter regression: current {current}, attempted {attempted}")]
    CounterRegression { current: i64, attempted: i64 },
}
