// [libs/domain/adapters/src/base.rs]
/*!
 * =================================================================
 * APARATO: PUERTO DE CONTROL DE MINERS (V1.0)
 * CLASIFICACIÓN: DOMAIN LAYER (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATO ESTABLE ENTRE COMANDOS Y FIRMWARE
 * =================================================================
 */

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Los seis tipos de comando soportados por el plano de control (spec §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    Reboot,
    PowerMode,
    ChangePool,
    SetFreq,
    ThermalPolicy,
    Led,
}

impl CommandType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_uppercase().as_str() {
            "REBOOT" => Some(Self::Reboot),
            "POWER_MODE" => Some(Self::PowerMode),
            "CHANGE_POOL" => Some(Self::ChangePool),
            "SET_FREQ" => Some(Self::SetFreq),
            "THERMAL_POLICY" => Some(Self::ThermalPolicy),
            "LED" => Some(Self::Led),
            _ => None,
        }
    }
}

/// Resultado uniforme de cualquier comando de adaptador.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub metrics: HashMap<String, Value>,
}

impl AdapterResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            metrics: HashMap::new(),
        }
    }

    pub fn ok_with_metrics(message: impl Into<String>, metrics: HashMap<String, Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            metrics,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            metrics: HashMap::new(),
        }
    }

    pub fn status_label(&self) -> &'static str {
        if self.success {
            "SUCCEEDED"
        } else {
            "FAILED"
        }
    }
}

/// Puerto estable implementado por cada backend de control (CGMiner real,
/// simulador, futuros firmwares). El dispatcher de comandos (C7) sólo
/// conoce este trait, nunca el backend concreto.
#[async_trait::async_trait]
pub trait MinerAdapter: Send + Sync {
    async fn reboot(&self, mode: &str) -> AdapterResult;
    async fn set_power_mode(&self, mode: &str) -> AdapterResult;
    async fn change_pool(&self, pool_url: &str, worker_name: &str, password: &str) -> AdapterResult;
    async fn set_frequency(&self, frequency_mhz: Option<u32>, profile: Option<&str>) -> AdapterResult;
    async fn set_thermal_policy(
        &self,
        fan_mode: &str,
        fan_speed_pct: Option<u8>,
        temp_warning_c: Option<u32>,
        temp_critical_c: Option<u32>,
    ) -> AdapterResult;
    async fn set_led(&self, state: &str) -> AdapterResult;

    async fn get_status(&self) -> Value {
        Value::Object(Default::default())
    }

    /// Despacha un comando genérico (tipo + payload JSON) al método concreto.
    /// Punto único de entrada usado por el runner del edge collector.
    async fn execute(&self, command_type: &str, payload: &Value) -> AdapterResult {
        let Some(parsed) = CommandType::parse(command_type) else {
            return AdapterResult::fail(format!("Unknown command type: {command_type}"));
        };

        match parsed {
            CommandType::Reboot => {
                let mode = payload.get("mode").and_then(|v| v.as_str()).unwrap_or("soft");
                self.reboot(mode).await
            }
            CommandType::PowerMode => {
                let mode = payload.get("mode").and_then(|v| v.as_str()).unwrap_or("normal");
                self.set_power_mode(mode).await
            }
            CommandType::ChangePool => {
                let pool_url = payload.get("pool_url").and_then(|v| v.as_str()).unwrap_or("");
                let worker_name = payload.get("worker_name").and_then(|v| v.as_str()).unwrap_or("");
                let password = payload.get("password").and_then(|v| v.as_str()).unwrap_or("");
                self.change_pool(pool_url, worker_name, password).await
            }
            CommandType::SetFreq => {
                let frequency_mhz = payload.get("frequency_mhz").and_then(|v| v.as_u64()).map(|v| v as u32);
                let profile = payload.get("profile").and_then(|v| v.as_str());
                self.set_frequency(frequency_mhz, profile).await
            }
            CommandType::ThermalPolicy => {
                let fan_mode = payload.get("fan_mode").and_then(|v| v.as_str()).unwrap_or("auto");
                let fan_speed_pct = payload.get("fan_speed_pct").and_then(|v| v.as_u64()).map(|v| v as u8);
                let temp_warning_c = payload.get("temp_warning_c").and_then(|v| v.as_u64()).map(|v| v as u32);
                let temp_critical_c = payload.get("temp_critical_c").and_then(|v| v.as_u64()).map(|v| v as u32);
                self.set_thermal_policy(fan_mode, fan_speed_pct, temp_warning_c, temp_critical_c).await
            }
            CommandType::Led => {
                let state = payload.get("state").and_then(|v| v.as_str()).unwrap_or("off");
                self.set_led(state).await
            }
        }
    }
}
