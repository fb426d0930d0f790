// [libs/domain/models/src/gate.rs]
/*!
 * =================================================================
 * APARATO: PUERTA DE CAPACIDAD (C8) (V1.0)
 * CLASIFICACIÓN: DOMAIN LAYER (ESTRATO L2)
 * RESPONSABILIDAD: DECISIÓN PURA DE AUTORIZACIÓN SOBRE SECRETOS
 *
 * Reemplaza la autorización basada en decoradores del original (spec §9)
 * por una función pura: sin I/O, sin estado, sin efectos de auditoría
 * (el llamador en `fleetctl-infra-db` es quien escribe el evento de
 * auditoría a partir del `GateDenial` devuelto aquí).
 * =================================================================
 */

use crate::device::{DeviceStatus, EdgeDevice};
use crate::miner::{CapabilityLevel, HostingMiner};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// El contexto de autorización de una petición de pull de secreto: quién
/// llama (`device`) y con qué `key_version` cree operar.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub device_id: i64,
    pub device_status: DeviceStatus,
    pub requested_key_version: i32,
    pub current_key_version: i32,
}

impl AuthContext {
    pub fn from_device(device: &EdgeDevice, requested_key_version: i32) -> Self {
        Self {
            device_id: device.id,
            device_status: device.status,
            requested_key_version,
            current_key_version: device.key_version,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateDenial {
    #[error("device is revoked")]
    DeviceRevoked,
    #[error("capability level insufficient")]
    CapabilityDenied,
    #[error("miner is bound to a different device")]
    BoundDeviceDenied,
    #[error("key version mismatch")]
    KeyVersionMismatch,
}

/// Las cuatro comprobaciones de la spec §4.8, en el orden dado: estado del
/// dispositivo, nivel de capacidad, dispositivo vinculado, versión de clave.
pub fn check_capability(auth: &AuthContext, miner: &HostingMiner) -> Result<(), GateDenial> {
    if auth.device_status != DeviceStatus::Active {
        return Err(GateDenial::DeviceRevoked);
    }
    if miner.capability_level != CapabilityLevel::Control {
        return Err(GateDenial::CapabilityDenied);
    }
    if let Some(bound) = miner.bound_device_id {
        if bound != auth.device_id {
            return Err(GateDenial::BoundDeviceDenied);
        }
    }
    if auth.requested_key_version != auth.current_key_version {
        return Err(GateDenial::KeyVersionMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::IpEncryptionMode;

    fn miner(capability: CapabilityLevel, bound: Option<i64>) -> HostingMiner {
        HostingMiner {
            id: 200,
            site_id: 1,
            ip_address: "10.0.0.5".into(),
            ip_encryption_mode: IpEncryptionMode::Mask,
            capability_level: capability,
            bound_device_id: bound,
        }
    }

    fn auth(status: DeviceStatus, requested: i32, current: i32) -> AuthContext {
        AuthContext { device_id: 1, device_status: status, requested_key_version: requested, current_key_version: current }
    }

    #[test]
    fn denies_insufficient_capability() {
        let result = check_capability(&auth(DeviceStatus::Active, 1, 1), &miner(CapabilityLevel::Telemetry, None));
        assert_eq!(result, Err(GateDenial::CapabilityDenied));
    }

    #[test]
    fn denies_mismatched_bound_device() {
        let result = check_capability(&auth(DeviceStatus::Active, 1, 1), &miner(CapabilityLevel::Control, Some(99)));
        assert_eq!(result, Err(GateDenial::BoundDeviceDenied));
    }

    #[test]
    fn allows_own_bound_device() {
        let result = check_capability(&auth(DeviceStatus::Active, 1, 1), &miner(CapabilityLevel::Control, Some(1)));
        assert!(result.is_ok());
    }

    #[test]
    fn denies_revoked_device() {
        let result = check_capability(&auth(DeviceStatus::Revoked, 1, 1), &miner(CapabilityLevel::Control, None));
        assert_eq!(result, Err(GateDenial::DeviceRevoked));
    }

    #[test]
    fn denies_key_version_mismatch() {
        let result = check_capability(&auth(DeviceStatus::Active, 1, 2), &miner(CapabilityLevel::Control, None));
        assert_eq!(result, Err(GateDenial::KeyVersionMismatch));
    }
}
