// [libs/core/envelope-crypto/src/sealed_box.rs]
/*!
 * =================================================================
 * APARATO: CIFRADO DE SOBRE POR DISPOSITIVO (V1.0)
 * CLASIFICACIÓN: CORE LAYER (ESTRATO L1)
 * RESPONSABILIDAD: ENCAPSULAMIENTO HÍBRIDO X25519 + AES-256-GCM
 *
 * Camino primario del plano de control: cada secreto se cifra con una
 * DEK efímera; la DEK se sella (sealed box, remitente anónimo) a la
 * clave pública X25519 del dispositivo destino. Ningún estrato aguas
 * arriba conserva estado de cifrado global — ver [`CryptoContext`].
 * =================================================================
 */

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use crypto_box::{PublicKey as SealedPublicKey, SalsaBox, SecretKey as SealedSecretKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::canonical::canonical_json_bytes;
use crate::errors::EnvelopeError;

pub const DEK_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

/// Cuerpo on-the-wire de un secreto cifrado (spec §6, "Envelope JSON").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedEnvelope {
    pub encrypted_payload: String,
    pub wrapped_dek: String,
    pub nonce: String,
    pub aad: Value,
    pub counter: i64,
    pub schema_version: i32,
    pub key_version: i32,
}

/// Cifra `plaintext` (cualquier valor serializable a JSON) para el
/// dispositivo identificado por `device_public_key`, con el `aad` dado
/// (se le inyectan `schema_version`/`key_version`/`created_at` si faltan).
pub fn seal_for_device(
    device_public_key: &[u8; 32],
    plaintext: &Value,
    mut aad: Value,
    counter: i64,
    key_version: i32,
) -> Result<SealedEnvelope, EnvelopeError> {
    const SCHEMA_VERSION: i32 = 1;

    if let Value::Object(map) = &mut aad {
        map.entry("schema_version").or_insert(Value::from(SCHEMA_VERSION));
        map.entry("key_version").or_insert(Value::from(key_version));
        map.entry("created_at")
            .or_insert(Value::from(chrono::Utc::now().to_rfc3339()));
    } else {
        return Err(EnvelopeError::Validation("aad must be a JSON object".into()));
    }

    let mut dek_bytes = [0u8; DEK_LEN];
    OsRng.fill_bytes(&mut dek_bytes);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let plaintext_bytes =
        serde_json::to_vec(plaintext).map_err(|e| EnvelopeError::Serialization(e.to_string()))?;
    let aad_bytes = canonical_json_bytes(&aad);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&dek_bytes));
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: &plaintext_bytes,
                aad: &aad_bytes,
            },
        )
        .map_err(|_| EnvelopeError::AuthenticationFailed)?;

    let recipient = SealedPublicKey::from(*device_public_key);
    let ephemeral_secret = SealedSecretKey::generate(&mut OsRng);
    let sealed_box = SalsaBox::new(&recipient, &ephemeral_secret);
    let mut dek_nonce = [0u8; 24];
    OsRng.fill_bytes(&mut dek_nonce);
    let sealed_dek = sealed_box
        .encrypt(crypto_box::generate_nonce(&mut OsRng).as_ref().into(), dek_bytes.as_slice())
        .map_err(|_| EnvelopeError::AuthenticationFailed)?;

    // Antepone la clave pública efímera al cuerpo sellado: el receptor
    // no conoce de antemano con qué clave efímera se cifró.
    let mut wrapped_dek = Vec::with_capacity(32 + sealed_dek.len());
    wrapped_dek.extend_from_slice(ephemeral_secret.public_key().as_bytes());
    wrapped_dek.extend_from_slice(&sealed_dek);

    Ok(SealedEnvelope {
        encrypted_payload: BASE64.encode(ciphertext),
        wrapped_dek: BASE64.encode(wrapped_dek),
        nonce: BASE64.encode(nonce_bytes),
        aad,
        counter,
        schema_version: SCHEMA_VERSION,
        key_version,
    })
}

/// Abre un [`SealedEnvelope`] con la clave privada X25519 del
/// dispositivo. Cualquier alteración de `encrypted_payload`, `nonce`,
/// `wrapped_dek` o la serialización canónica de `aad` hace fallar el
/// tag de GCM (o el sello) — nunca produce un plaintext incorrecto en silencio.
pub fn unseal_for_device(
    device_secret_key: &StaticSecret,
    envelope: &SealedEnvelope,
) -> Result<Value, EnvelopeError> {
    let wrapped_dek = BASE64
        .decode(&envelope.wrapped_dek)
        .map_err(|e| EnvelopeError::Encoding(e.to_string()))?;

    if wrapped_dek.len() < 32 + 24 {
        return Err(EnvelopeError::Validation("wrapped_dek too short".into()));
    }

    let (ephemeral_pub_bytes, sealed_body) = wrapped_dek.split_at(32);
    let ephemeral_pub: [u8; 32] = ephemeral_pub_bytes
        .try_into()
        .map_err(|_| EnvelopeError::Validation("malformed ephemeral public key".into()))?;

    let recipient_secret = SealedSecretKey::from(device_secret_key.to_bytes());
    let sender_public = SealedPublicKey::from(ephemeral_pub);
    let sealed_box = SalsaBox::new(&sender_public, &recipient_secret);

    if sealed_body.len() < 24 {
        return Err(EnvelopeError::Validation("sealed DEK body too short".into()));
    }
    let (nonce_bytes, ciphertext) = sealed_body.split_at(24);

    let dek_bytes = sealed_box
        .decrypt(nonce_bytes.into(), ciphertext)
        .map_err(|_| EnvelopeError::AuthenticationFailed)?;

    if dek_bytes.len() != DEK_LEN {
        return Err(EnvelopeError::Validation("unsealed DEK has wrong length".into()));
    }

    let nonce = BASE64
        .decode(&envelope.nonce)
        .map_err(|e| EnvelopeError::Encoding(e.to_string()))?;
    let ciphertext = BASE64
        .decode(&envelope.encrypted_payload)
        .map_err(|e| EnvelopeError::Encoding(e.to_string()))?;
    let aad_bytes = canonical_json_bytes(&envelope.aad);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&dek_bytes));
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &ciphertext,
                aad: &aad_bytes,
            },
        )
        .map_err(|_| EnvelopeError::AuthenticationFailed)?;

    serde_json::from_slice(&plaintext).map_err(|e| EnvelopeError::Serialization(e.to_string()))
}

/// Genera un nuevo par de claves X25519 para un dispositivo (usado en
/// el registro/rotación de claves del plano de control).
pub fn generate_device_keypair() -> (StaticSecret, PublicKey) {
    let secret = StaticSecret::random_from_rng(OsRng);
    let public = PublicKey::from(&secret);
    (secret, public)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_plaintext_exactly() {
        let (secret, public) = generate_device_keypair();
        let plaintext = json!({"ssh_user": "root", "ssh_password": "x"});
        let aad = json!({"schema_version": 1, "key_version": 1, "created_at": "2025-01-01T00:00:00Z"});

        let envelope = seal_for_device(public.as_bytes(), &plaintext, aad, 1, 1).unwrap();
        let decrypted = unseal_for_device(&secret, &envelope).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn tampering_with_aad_fails_authentication() {
        let (secret, public) = generate_device_keypair();
        let plaintext = json!({"ssh_user": "root", "ssh_password": "x"});
        let aad = json!({"schema_version": 1, "key_version": 1, "created_at": "2025-01-01T00:00:00Z"});

        let mut envelope = seal_for_device(public.as_bytes(), &plaintext, aad, 1, 1).unwrap();
        envelope.aad["key_version"] = json!(2);

        let result = unseal_for_device(&secret, &envelope);
        assert_eq!(result, Err(EnvelopeError::AuthenticationFailed));
    }

    #[test]
    fn tampering_with_ciphertext_fails_authentication() {
        let (secret, public) = generate_device_keypair();
        let plaintext = json!({"ssh_user": "root"});
        let aad = json!({"schema_version": 1, "key_version": 1, "created_at": "2025-01-01T00:00:00Z"});

        let mut envelope = seal_for_device(public.as_bytes(), &plaintext, aad, 1, 1).unwrap();
        let mut raw = BASE64.decode(&envelope.encrypted_payload).unwrap();
        raw[0] ^= 0xFF;
        envelope.encrypted_payload = BASE64.encode(raw);

        let result = unseal_for_device(&secret, &envelope);
        assert_eq!(result, Err(EnvelopeError::AuthenticationFailed));
    }

    #[test]
    fn decrypting_with_wrong_device_key_fails() {
        let (_secret, public) = generate_device_keypair();
        let (other_secret, _other_public) = generate_device_keypair();
        let plaintext = json!({"ssh_user": "root"});
        let aad = json!({"schema_version": 1, "key_version": 1, "created_at": "2025-01-01T00:00:00Z"});

        let envelope = seal_for_device(public.as_bytes(), &plaintext, aad, 1, 1).unwrap();
        let result = unseal_for_device(&other_secret, &envelope);
        assert_eq!(result, Err(EnvelopeError::AuthenticationFailed));
    }
}
