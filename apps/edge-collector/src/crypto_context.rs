// [apps/edge-collector/src/crypto_context.rs]
/*!
 * REDESIGN FLAG aplicada (spec §9): ningún singleton de cifrado global.
 * `CryptoContext` se construye una única vez en `main.rs` y se pasa por
 * referencia a cada tarea que decifra un sobre -- nunca hay un
 * `E2EEManager`/`get_e2ee_manager()` estático equivalente.
 */

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use fleetctl_core_envelope_crypto::{unseal_for_device, unseal_with_passphrase, PassphraseEnvelope, SealedEnvelope};
use serde_json::Value;
use x25519_dalek::StaticSecret;
use zeroize::Zeroizing;

use crate::config::EdgeConfig;

/// Mantiene las dos claves de decifrado posibles del dispositivo. Al menos
/// una debe estar presente para que el runner pueda abrir secretos.
pub struct CryptoContext {
    device_secret_key: Option<StaticSecret>,
    site_passphrase: Option<Zeroizing<String>>,
}

#[derive(thiserror::Error, Debug)]
pub enum CryptoContextError {
    #[error("EDGE_DEVICE_PRIVATE_KEY must decode to exactly 32 bytes")]
    MalformedDeviceKey,
    #[error("no decryption path configured: set EDGE_DEVICE_PRIVATE_KEY or SITE_MASTER_PASSPHRASE")]
    NoPathConfigured,
    #[error("sealed-box path not configured for this device")]
    SealedBoxUnavailable,
    #[error("passphrase path not configured for this device")]
    PassphraseUnavailable,
    #[error(transparent)]
    Envelope(#[from] fleetctl_core_envelope_crypto::EnvelopeError),
    #[error("malformed passphrase envelope: {0}")]
    MalformedPassphraseEnvelope(#[from] serde_json::Error),
}

impl CryptoContext {
    pub fn from_config(config: &EdgeConfig) -> Result<Self, CryptoContextError> {
        let device_secret_key = match &config.device_private_key_b64 {
            Some(encoded) => {
                let bytes = BASE64.decode(encoded).map_err(|_| CryptoContextError::MalformedDeviceKey)?;
                let bytes: [u8; 32] = bytes.try_into().map_err(|_| CryptoContextError::MalformedDeviceKey)?;
                Some(StaticSecret::from(bytes))
            }
            None => None,
        };
        let site_passphrase = config.site_master_passphrase.clone().map(Zeroizing::new);

        if device_secret_key.is_none() && site_passphrase.is_none() {
            return Err(CryptoContextError::NoPathConfigured);
        }

        Ok(Self { device_secret_key, site_passphrase })
    }

    /// Abre un sobre sellado X25519 (camino primario de C4).
    pub fn unseal_sealed_box(&self, envelope: &SealedEnvelope) -> Result<Value, CryptoContextError> {
        let key = self.device_secret_key.as_ref().ok_or(CryptoContextError::SealedBoxUnavailable)?;
        Ok(unseal_for_device(key, envelope)?)
    }

    /// Abre un sobre simétrico de passphrase de sitio (camino secundario).
    pub fn unseal_passphrase_envelope(&self, envelope: &Value) -> Result<Value, CryptoContextError> {
        let passphrase = self.site_passphrase.as_ref().ok_or(CryptoContextError::PassphraseUnavailable)?;
        let envelope: PassphraseEnvelope = serde_json::from_value(envelope.clone())?;
        Ok(unseal_with_passphrase(passphrase, &envelope)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> EdgeConfig {
        EdgeConfig {
            device_id: 1,
            site_id: 1,
            api_base_url: "http://localhost:3000".into(),
            auth_token: "tok".into(),
            miner_mode: "simulated".into(),
            execution_enabled: true,
            poll_interval_secs: 15,
            once: true,
            device_private_key_b64: None,
            site_master_passphrase: None,
            dedup_store_path: ".edge_executed_commands.json".into(),
        }
    }

    #[test]
    fn rejects_config_with_no_decryption_path() {
        let config = minimal_config();
        assert!(matches!(CryptoContext::from_config(&config), Err(CryptoContextError::NoPathConfigured)));
    }

    #[test]
    fn accepts_passphrase_only_config() {
        let mut config = minimal_config();
        config.site_master_passphrase = Some("correct horse battery staple".into());
        assert!(CryptoContext::from_config(&config).is_ok());
    }

    #[test]
    fn sealed_box_round_trips_through_context() {
        use fleetctl_core_envelope_crypto::{generate_device_keypair, seal_for_device};
        use serde_json::json;

        let (secret, public) = generate_device_keypair();
        let mut config = minimal_config();
        config.device_private_key_b64 = Some(BASE64.encode(secret.to_bytes()));
        let context = CryptoContext::from_config(&config).unwrap();

        let plaintext = json!({"ssh_user": "root"});
        let aad = json!({"schema_version": 1, "key_version": 1, "created_at": "2025-01-01T00:00:00Z"});
        let envelope = seal_for_device(public.as_bytes(), &plaintext, aad, 1, 1).unwrap();

        assert_eq!(context.unseal_sealed_box(&envelope).unwrap(), plaintext);
    }
}
