// [apps/edge-collector/src/config.rs]
/*!
 * Configuración del runtime de borde (spec §6). Cada variable de entorno
 * nombrada en la spec tiene su bandera CLI gemela con idéntico default,
 * vía `clap`'s feature `env` -- el operador puede fijarla por contenedor
 * (`.env`/entorno) o sobreescribirla puntualmente por línea de comandos.
 */

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "fleetctl-edge-collector", about = "Runtime de borde del plano de control de flota")]
pub struct EdgeConfig {
    /// Identidad del dispositivo de borde, asignada en `/admin/devices` (spec §3).
    #[arg(long, env = "EDGE_DEVICE_ID")]
    pub device_id: i64,

    /// Sitio que este dispositivo sirve.
    #[arg(long, env = "EDGE_SITE_ID")]
    pub site_id: i64,

    /// Raíz HTTP(S) del plano de control.
    #[arg(long = "api-url", env = "EDGE_API_BASE_URL")]
    pub api_base_url: String,

    /// `device_token` Bearer recibido del registro (spec §3).
    #[arg(long = "token", env = "EDGE_AUTH_TOKEN")]
    pub auth_token: String,

    /// `cgminer` (hardware real) o `simulated` (sin hardware).
    #[arg(long = "mode", env = "EDGE_MINER_MODE", default_value = "simulated")]
    pub miner_mode: String,

    /// Si es `false`, el runner hace polling y reporta, pero nunca envía
    /// comandos de control al firmware (modo sólo-observación).
    #[arg(long, env = "EDGE_EXECUTION_ENABLED", default_value_t = true)]
    pub execution_enabled: bool,

    /// Segundos entre ciclos de poll de comandos / pull de secretos.
    #[arg(long = "poll-interval", env = "EDGE_POLL_INTERVAL", default_value_t = 15)]
    pub poll_interval_secs: u64,

    /// Corre un único ciclo (heartbeat + pull + poll + ack) y termina;
    /// usado en pruebas de integración y diagnósticos puntuales.
    #[arg(long)]
    pub once: bool,

    /// Clave privada X25519 del dispositivo, base64, para el camino
    /// primario de sobre sellado (C4). Ausente en sitios que sólo usan
    /// `SITE_MASTER_PASSPHRASE`.
    #[arg(long, env = "EDGE_DEVICE_PRIVATE_KEY")]
    pub device_private_key_b64: Option<String>,

    /// Passphrase simétrica de sitio, camino secundario de C4.
    #[arg(long, env = "SITE_MASTER_PASSPHRASE")]
    pub site_master_passphrase: Option<String>,

    /// Ruta del archivo de deduplicación de comandos ya ejecutados.
    #[arg(long, env = "EDGE_DEDUP_STORE_PATH", default_value = ".edge_executed_commands.json")]
    pub dedup_store_path: String,

    /// Usuario HTTP de respaldo para el fingerprint de consolas web de
    /// miners durante un escaneo (spec §4.3); default calcado de
    /// `original_source/services/ip_scanner.py`.
    #[arg(long = "scan-http-user", env = "EDGE_SCAN_HTTP_USER", default_value = "root")]
    pub scan_http_user: String,

    #[arg(long = "scan-http-password", env = "EDGE_SCAN_HTTP_PASSWORD", default_value = "root")]
    pub scan_http_password: String,
}
