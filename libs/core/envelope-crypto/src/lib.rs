/*!
 * =================================================================
 * APARATO: CIFRADO DE SOBRE POR DISPOSITIVO (C4) (V1.0)
 * CLASIFICACIÓN: CORE LAYER (ESTRATO L1)
 * RESPONSABILIDAD: SOBRE X25519 SELLADO + AES-256-GCM, Y EL CAMINO
 * SIMÉTRICO DE PASSPHRASE DE SITIO
 *
 * Dos caminos de cifrado independientes, nunca mezclados en un mismo
 * sobre: `sealed_box` (primario, por-dispositivo) y `passphrase`
 * (secundario, por-sitio, spec §6 "Site-passphrase block").
 * =================================================================
 */

pub mod canonical;
pub mod errors;
pub mod passphrase;
pub mod sealed_box;

pub use errors::EnvelopeError;
pub use passphrase::{seal_with_passphrase, unseal_with_passphrase, PassphraseEnvelope};
pub use sealed_box::{generate_device_keypair, seal_for_device, unseal_for_device, SealedEnvelope};
