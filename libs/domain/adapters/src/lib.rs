// [libs/domain/adapters/src/lib.rs]
//! Puerto de control de miners (C2) y sus dos implementaciones.
//!
//! Estrato L2 de dominio: conoce el vocabulario de comandos pero
//! delega toda comunicación de red al cliente de `fleetctl-core-miner-proto`.

pub mod base;
pub mod cgminer_adapter;
pub mod simulated_adapter;

pub use base::{AdapterResult, CommandType, MinerAdapter};
pub use cgminer_adapter::CgminerAdapter;
pub use simulated_adapter::SimulatedAdapter;
