// [libs/infra/discovery/src/lib.rs]
//! Descubrimiento de miners en rangos IP/CIDR (C3).
//!
//! Estrato L3: combina el cliente de `fleetctl-core-miner-proto` con
//! un respaldo HTTP para identificar fabricantes que no exponen la
//! API CGMiner clásica.

pub mod range;
pub mod scanner;
pub mod signatures;

pub use range::{parse_cidr, parse_ip_range, RangeParseError, MAX_IPS};
pub use scanner::{
    generate_scan_id, spawn_cidr_scan, spawn_range_scan, DiscoveredMiner, ScanProgress, ScanSession,
    ScanStatus, CGMINER_PORT, MAX_WORKERS,
};
pub use signatures::{identify_type_from_string, MinerType, MINER_SIGNATURES};
