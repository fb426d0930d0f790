// [libs/core/envelope-crypto/src/passphrase.rs]
/*!
 * Camino simétrico heredado de passphrase de sitio (spec §6,
 * "Site-passphrase block (alternative flow)"). Usado cuando el operador
 * opta por `SITE_MASTER_PASSPHRASE` en vez del sobre X25519 por-dispositivo
 * — p. ej. sitios sin aprovisionamiento de clave pública por dispositivo.
 *
 * Clave = PBKDF2-HMAC-SHA256(passphrase, salt, 100_000, 32), exactamente
 * como especifica spec §6.
 */

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use zeroize::Zeroize;

use crate::errors::EnvelopeError;

const PBKDF2_ROUNDS: u32 = 100_000;
const DEK_LEN: usize = 32;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const ALGO_LABEL: &str = "AES-256-GCM";
const SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassphraseEnvelope {
    pub ciphertext: String,
    pub iv: String,
    pub salt: String,
    pub algo: String,
    pub version: i32,
}

fn derive_key(passphrase: &str, salt: &[u8]) -> [u8; DEK_LEN] {
    let mut key = [0u8; DEK_LEN];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(passphrase.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    key
}

pub fn seal_with_passphrase(passphrase: &str, plaintext: &Value) -> Result<PassphraseEnvelope, EnvelopeError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut iv = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut iv);

    let mut key = derive_key(passphrase, &salt);
    let plaintext_bytes =
        serde_json::to_vec(plaintext).map_err(|e| EnvelopeError::Serialization(e.to_string()))?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), Payload { msg: &plaintext_bytes, aad: &[] })
        .map_err(|_| EnvelopeError::Encoding("AES-GCM seal failed".into()))?;

    key.zeroize();

    Ok(PassphraseEnvelope {
        ciphertext: BASE64.encode(ciphertext),
        iv: BASE64.encode(iv),
        salt: BASE64.encode(salt),
        algo: ALGO_LABEL.to_string(),
        version: SCHEMA_VERSION,
    })
}

pub fn unseal_with_passphrase(passphrase: &str, envelope: &PassphraseEnvelope) -> Result<Value, EnvelopeError> {
    if envelope.algo != ALGO_LABEL {
        return Err(EnvelopeError::Validation(format!("unsupported algo: {}", envelope.algo)));
    }

    let salt = BASE64.decode(&envelope.salt).map_err(|e| EnvelopeError::Encoding(e.to_string()))?;
    let iv = BASE64.decode(&envelope.iv).map_err(|e| EnvelopeError::Encoding(e.to_string()))?;
    let ciphertext = BASE64.decode(&envelope.ciphertext).map_err(|e| EnvelopeError::Encoding(e.to_string()))?;

    let mut key = derive_key(passphrase, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), Payload { msg: &ciphertext, aad: &[] })
        .map_err(|_| EnvelopeError::AuthenticationFailed);
    key.zeroize();

    serde_json::from_slice(&plaintext?).map_err(|e| EnvelopeError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_plaintext_exactly() {
        let plaintext = json!({"ssh_user": "root", "ssh_password": "x"});
        let envelope = seal_with_passphrase("correct horse battery staple", &plaintext).unwrap();
        let decrypted = unseal_with_passphrase("correct horse battery staple", &envelope).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn wrong_passphrase_fails_authentication() {
        let plaintext = json!({"ssh_user": "root"});
        let envelope = seal_with_passphrase("correct horse battery staple", &plaintext).unwrap();
        let result = unseal_with_passphrase("wrong passphrase", &envelope);
        assert_eq!(result, Err(EnvelopeError::AuthenticationFailed));
    }

    #[test]
    fn envelope_matches_wire_shape() {
        let plaintext = json!({"k": "v"});
        let envelope = seal_with_passphrase("p", &plaintext).unwrap();
        assert_eq!(envelope.algo, "AES-256-GCM");
        assert_eq!(envelope.version, 1);
    }
}
