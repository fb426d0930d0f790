// [libs/domain/models/src/miner.rs]
use serde::{Deserialize, Serialize};

/// DISCOVERY(1) <= TELEMETRY(2) <= CONTROL(3). Determina qué operaciones
/// puede ejecutar un dispositivo sobre un miner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CapabilityLevel {
    Discovery = 1,
    Telemetry = 2,
    Control = 3,
}

impl CapabilityLevel {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Discovery),
            2 => Some(Self::Telemetry),
            3 => Some(Self::Control),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Gobierna cómo se almacena `HostingMiner::ip_address`.
///
/// `E2EE` preserva textualmente el marcador `"E2EE:pending-client-encryption"`
/// hasta que un cliente suministre un sobre cifrado — comportamiento heredado
/// que se conserva por compatibilidad (spec §9, Open Questions). Cualquier
/// revelación de una IP en modo E2EE se deniega incondicionalmente,
/// independientemente de RBAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IpEncryptionMode {
    Mask = 1,
    ServerEncrypt = 2,
    E2ee = 3,
}

pub const E2EE_PENDING_MARKER: &str = "E2EE:pending-client-encryption";

/// Un miner físico alojado en un sitio. `bound_device_id` nulo significa
/// que cualquier dispositivo activo del sitio puede recibir su secreto,
/// siempre que el nivel de capacidad lo permita (ver [`crate::gate`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostingMiner {
    pub id: i64,
    pub site_id: i64,
    pub ip_address: String,
    pub ip_encryption_mode: IpEncryptionMode,
    pub capability_level: CapabilityLevel,
    pub bound_device_id: Option<i64>,
}

impl HostingMiner {
    /// Aplica la máscara de redacción de octetos 3-4 (spec §4.9) a una IPv4
    /// dotted-quad. Cadenas no-IPv4 (markers E2EE, ciphertext opaco) se
    /// devuelven sin modificar.
    pub fn masked_ip(&self) -> String {
        mask_ipv4_octets(&self.ip_address)
    }
}

pub fn mask_ipv4_octets(ip: &str) -> String {
    let parts: Vec<&str> = ip.split('.').collect();
    if parts.len() == 4 && parts.iter().all(|p| p.parse::<u8>().is_ok()) {
        format!("{}.{}.*.*", parts[0], parts[1])
    } else {
        ip.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_last_two_octets() {
        assert_eq!(mask_ipv4_octets("10.20.30.40"), "10.20.*.*");
    }

    #[test]
    fn leaves_non_ipv4_markers_untouched() {
        assert_eq!(mask_ipv4_octets(E2EE_PENDING_MARKER), E2EE_PENDING_MARKER);
    }

    #[test]
    fn capability_levels_are_ordered() {
        assert!(CapabilityLevel::Discovery < CapabilityLevel::Telemetry);
        assert!(CapabilityLevel::Telemetry < CapabilityLevel::Control);
    }
}
