// [libs/infra/edge-uplink/src/lib.rs]
//! Cliente HTTP soberano del runtime de borde (C10) hacia el plano de
//! control (C7-cloud). Cada método envuelve exactamente un endpoint de
//! spec §6, bajo el header `Authorization: Bearer` más `X-Edge-Device-ID`.

pub mod client;
pub mod errors;
pub mod wire;

pub use client::EdgeUplinkClient;
pub use errors::UplinkError;
