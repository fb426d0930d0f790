// [libs/domain/adapters/src/cgminer_adapter.rs]
/*!
 * =================================================================
 * APARATO: ADAPTADOR CGMINER NATIVO (V1.0)
 * CLASIFICACIÓN: DOMAIN LAYER (ESTRATO L2)
 * RESPONSABILIDAD: TRADUCCIÓN DE COMANDOS A LA API TCP DEL FIRMWARE
 * =================================================================
 */

use std::collections::HashMap;
use std::sync::Arc;

use fleetctl_core_miner_proto::MinerProtoClient;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::warn;

use crate::base::{AdapterResult, MinerAdapter};

fn power_mode_frequency(mode: &str) -> u32 {
    match mode {
        "high" => 700,
        "eco" => 500,
        _ => 600,
    }
}

fn profile_frequency(profile: &str) -> u32 {
    match profile {
        "overclock" => 700,
        "underclock" => 500,
        _ => 600,
    }
}

/// Adaptador real: habla directamente con el firmware vía el cliente
/// TCP endurecido de [`fleetctl_core_miner_proto`]. El cliente se
/// construye perezosamente y se reutiliza entre llamadas.
pub struct CgminerAdapter {
    ip_address: String,
    port: u16,
    client: Mutex<Option<Arc<Mutex<MinerProtoClient>>>>,
}

impl CgminerAdapter {
    pub fn new(ip_address: impl Into<String>, port: u16) -> Self {
        Self {
            ip_address: ip_address.into(),
            port,
            client: Mutex::new(None),
        }
    }

    async fn client(&self) -> Result<Arc<Mutex<MinerProtoClient>>, String> {
        let mut guard = self.client.lock().await;
        if let Some(existing) = guard.as_ref() {
            return Ok(Arc::clone(existing));
        }
        let new_client = MinerProtoClient::with_options(&self.ip_address, self.port, 5, 3, true)
            .map_err(|e| e.to_string())?;
        let wrapped = Arc::new(Mutex::new(new_client));
        *guard = Some(Arc::clone(&wrapped));
        Ok(wrapped)
    }

    async fn current_metrics(&self) -> HashMap<String, Value> {
        let mut metrics = HashMap::new();
        let Ok(client) = self.client().await else {
            return metrics;
        };
        let mut client = client.lock().await;
        if let Ok(summary) = client.send_command("summary", "").await {
            if let Some(entry) = summary.get("SUMMARY").and_then(|s| s.get(0)) {
                metrics.insert(
                    "hashrate_ghs".into(),
                    entry.get("GHS 5s").cloned().unwrap_or(json!(0)),
                );
                metrics.insert(
                    "temperature".into(),
                    entry.get("Temperature").cloned().unwrap_or(json!(0)),
                );
                metrics.insert("uptime".into(), entry.get("Elapsed").cloned().unwrap_or(json!(0)));
            }
        } else {
            warn!(host = %self.ip_address, "failed to collect pre-command metrics");
        }
        metrics
    }

    fn command_succeeded(response: &Value) -> bool {
        response
            .get("STATUS")
            .and_then(|s| s.get(0))
            .and_then(|entry| entry.get("STATUS"))
            .and_then(|v| v.as_str())
            .map(|code| code == "S" || code == "I")
            .unwrap_or(false)
    }

    fn status_message(response: &Value, fallback: &str) -> String {
        response
            .get("STATUS")
            .and_then(|s| s.get(0))
            .and_then(|entry| entry.get("Msg"))
            .and_then(|v| v.as_str())
            .unwrap_or(fallback)
            .to_string()
    }
}

#[async_trait::async_trait]
impl MinerAdapter for CgminerAdapter {
    async fn reboot(&self, mode: &str) -> AdapterResult {
        let metrics_before = self.current_metrics().await;

        let Ok(client) = self.client().await else {
            return AdapterResult::fail("unable to establish miner connection");
        };
        let mut client = client.lock().await;

        let command = if mode == "hard" { "quit" } else { "restart" };
        match client.send_command(command, "").await {
            Ok(response) if Self::command_succeeded(&response) => {
                let mut metrics = HashMap::new();
                metrics.insert("before".into(), json!(metrics_before));
                AdapterResult::ok_with_metrics(
                    format!("{} reboot initiated", capitalize(mode)),
                    metrics,
                )
            }
            Ok(response) => AdapterResult::fail(Self::status_message(&response, "Reboot failed")),
            Err(err) => AdapterResult::fail(err.to_string()),
        }
    }

    async fn set_power_mode(&self, mode: &str) -> AdapterResult {
        self.set_frequency(Some(power_mode_frequency(mode)), None).await
    }

    async fn change_pool(&self, pool_url: &str, worker_name: &str, password: &str) -> AdapterResult {
        let Ok(client) = self.client().await else {
            return AdapterResult::fail("unable to establish miner connection");
        };
        let mut client = client.lock().await;

        let add_parameter = format!("{pool_url},{worker_name},{password}");
        if let Err(err) = client.send_command("addpool", &add_parameter).await {
            return AdapterResult::fail(err.to_string());
        }

        let pools = match client.send_command("pools", "").await {
            Ok(value) => value,
            Err(err) => return AdapterResult::fail(err.to_string()),
        };

        let new_pool_id = pools
            .get("POOLS")
            .and_then(|v| v.as_array())
            .and_then(|list| {
                list.iter().find(|pool| {
                    pool.get("URL")
                        .and_then(|v| v.as_str())
                        .map(|url| url.contains(pool_url))
                        .unwrap_or(false)
                })
            })
            .and_then(|pool| pool.get("POOL").and_then(|v| v.as_i64()));

        let Some(pool_id) = new_pool_id else {
            return AdapterResult::fail("failed to switch to new pool");
        };

        match client.send_command("switchpool", &pool_id.to_string()).await {
            Ok(response) if Self::command_succeeded(&response) => {
                let mut metrics = HashMap::new();
                metrics.insert("pool_id".into(), json!(pool_id));
                metrics.insert("pool_url".into(), json!(pool_url));
                AdapterResult::ok_with_metrics(format!("Pool changed to {pool_url}"), metrics)
            }
            Ok(_) => AdapterResult::fail("failed to switch to new pool"),
            Err(err) => AdapterResult::fail(err.to_string()),
        }
    }

    async fn set_frequency(&self, frequency_mhz: Option<u32>, profile: Option<&str>) -> AdapterResult {
        let frequency_mhz = match (frequency_mhz, profile) {
            (_, Some(profile)) => profile_frequency(profile),
            (Some(freq), None) => freq,
            (None, None) => return AdapterResult::fail("Frequency or profile required"),
        };

        let Ok(client) = self.client().await else {
            return AdapterResult::fail("unable to establish miner connection");
        };
        let mut client = client.lock().await;

        let parameter = format!("0,freq,{frequency_mhz}");
        match client.send_command("ascset", &parameter).await {
            Ok(response) if Self::command_succeeded(&response) => {
                let mut metrics = HashMap::new();
                metrics.insert("frequency_mhz".into(), json!(frequency_mhz));
                AdapterResult::ok_with_metrics(format!("Frequency set to {frequency_mhz} MHz"), metrics)
            }
            Ok(response) => AdapterResult::fail(Self::status_message(&response, "Failed to set frequency")),
            Err(err) => AdapterResult::fail(err.to_string()),
        }
    }

    async fn set_thermal_policy(
        &self,
        fan_mode: &str,
        fan_speed_pct: Option<u8>,
        _temp_warning_c: Option<u32>,
        _temp_critical_c: Option<u32>,
    ) -> AdapterResult {
        let Ok(client) = self.client().await else {
            return AdapterResult::fail("unable to establish miner connection");
        };
        let mut client = client.lock().await;

        if fan_mode == "manual" {
            if let Some(speed) = fan_speed_pct {
                for fan_index in 0..4 {
                    let parameter = format!("{fan_index},{speed}");
                    if let Err(err) = client.send_command("fanctrl", &parameter).await {
                        return AdapterResult::fail(err.to_string());
                    }
                }
                let mut metrics = HashMap::new();
                metrics.insert("fan_mode".into(), json!(fan_mode));
                metrics.insert("fan_speed_pct".into(), json!(speed));
                return AdapterResult::ok_with_metrics(format!("Fan speed set to {speed}%"), metrics);
            }
        }

        if fan_mode == "auto" {
            if let Err(err) = client.send_command("fanctrl", "auto").await {
                return AdapterResult::fail(err.to_string());
            }
            let mut metrics = HashMap::new();
            metrics.insert("fan_mode".into(), json!("auto"));
            return AdapterResult::ok_with_metrics("Fan set to auto mode", metrics);
        }

        let mut metrics = HashMap::new();
        metrics.insert("fan_mode".into(), json!(fan_mode));
        AdapterResult::ok_with_metrics(format!("Thermal policy updated ({fan_mode})"), metrics)
    }

    async fn set_led(&self, state: &str) -> AdapterResult {
        let Ok(client) = self.client().await else {
            return AdapterResult::fail("unable to establish miner connection");
        };
        let mut client = client.lock().await;

        let command = if state == "on" { "ledon" } else { "ledoff" };
        match client.send_command(command, "").await {
            Ok(response) if Self::command_succeeded(&response) => {
                let mut metrics = HashMap::new();
                metrics.insert("led_state".into(), json!(state));
                AdapterResult::ok_with_metrics(format!("LED turned {state}"), metrics)
            }
            Ok(response) => AdapterResult::fail(Self::status_message(&response, &format!("Failed to set LED {state}"))),
            Err(err) => AdapterResult::fail(err.to_string()),
        }
    }

    async fn get_status(&self) -> Value {
        let Ok(client) = self.client().await else {
            return json!({ "error": "unable to establish miner connection" });
        };
        let mut client = client.lock().await;
        match client.send_command("summary", "").await {
            Ok(value) => value,
            Err(err) => json!({ "error": err.to_string() }),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
