// [libs/domain/adapters/src/simulated_adapter.rs]
/*!
 * =================================================================
 * APARATO: ADAPTADOR SIMULADO (V1.0)
 * CLASIFICACIÓN: DOMAIN LAYER (ESTRATO L2)
 * RESPONSABILIDAD: BACKEND DE PRUEBAS SIN HARDWARE REAL
 *
 * Siempre termina (salvo `failure_rate` > 0), mantiene estado mutable
 * en memoria y nunca abre sockets. Usado por demos, tests de
 * integración y sitios sin miners físicos accesibles.
 * =================================================================
 */

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::base::{AdapterResult, MinerAdapter};

#[derive(Debug, Clone)]
struct SimulatedState {
    power_mode: String,
    frequency_mhz: u32,
    fan_mode: String,
    fan_speed_pct: u8,
    led_state: String,
    pool_url: String,
    worker_name: String,
    hashrate_ths: f64,
    temperature_c: f64,
    uptime_hours: f64,
}

impl Default for SimulatedState {
    fn default() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            power_mode: "normal".into(),
            frequency_mhz: 600,
            fan_mode: "auto".into(),
            fan_speed_pct: 75,
            led_state: "off".into(),
            pool_url: "stratum+tcp://btc.f2pool.com:3333".into(),
            worker_name: "test.worker1".into(),
            hashrate_ths: rng.gen_range(200.0..240.0),
            temperature_c: rng.gen_range(65.0..80.0),
            uptime_hours: rng.gen_range(100.0..1000.0),
        }
    }
}

pub struct SimulatedAdapter {
    ip_address: String,
    failure_rate: f64,
    delay_range: (u64, u64),
    state: Mutex<SimulatedState>,
}

impl SimulatedAdapter {
    pub fn new(ip_address: impl Into<String>) -> Self {
        Self::with_failure_rate(ip_address, 0.0)
    }

    pub fn with_failure_rate(ip_address: impl Into<String>, failure_rate: f64) -> Self {
        Self {
            ip_address: ip_address.into(),
            failure_rate,
            delay_range: (100, 500),
            state: Mutex::new(SimulatedState::default()),
        }
    }

    async fn simulate_delay(&self) {
        let millis = rand::thread_rng().gen_range(self.delay_range.0..=self.delay_range.1);
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    fn maybe_fail(&self) -> Option<AdapterResult> {
        if rand::thread_rng().gen_bool(self.failure_rate.clamp(0.0, 1.0)) {
            return Some(AdapterResult::fail("Simulated random failure"));
        }
        None
    }

    fn base_metrics(&self, state: &SimulatedState) -> HashMap<String, Value> {
        let mut metrics = HashMap::new();
        metrics.insert("hashrate_before_ths".into(), json!(state.hashrate_ths));
        metrics.insert("temperature_before_c".into(), json!(state.temperature_c));
        metrics.insert("simulated".into(), json!(true));
        metrics.insert("ip_address".into(), json!(self.ip_address));
        metrics
    }
}

#[async_trait::async_trait]
impl MinerAdapter for SimulatedAdapter {
    async fn reboot(&self, mode: &str) -> AdapterResult {
        self.simulate_delay().await;
        if let Some(failure) = self.maybe_fail() {
            return failure;
        }

        let mut state = self.state.lock().await;
        let mut metrics = self.base_metrics(&state);
        state.uptime_hours = 0.0;
        state.hashrate_ths = rand::thread_rng().gen_range(200.0..240.0);
        metrics.insert("reboot_mode".into(), json!(mode));

        AdapterResult::ok_with_metrics(format!("Simulated {mode} reboot successful"), metrics)
    }

    async fn set_power_mode(&self, mode: &str) -> AdapterResult {
        self.simulate_delay().await;
        if let Some(failure) = self.maybe_fail() {
            return failure;
        }

        let (freq, hashrate_range) = match mode {
            "high" => (700, (230.0, 250.0)),
            "eco" => (500, (170.0, 200.0)),
            _ => (600, (200.0, 230.0)),
        };

        let mut state = self.state.lock().await;
        state.power_mode = mode.to_string();
        state.frequency_mhz = freq;
        state.hashrate_ths = rand::thread_rng().gen_range(hashrate_range.0..hashrate_range.1);

        let mut metrics = self.base_metrics(&state);
        metrics.insert("power_mode".into(), json!(mode));
        metrics.insert("frequency_mhz".into(), json!(freq));
        metrics.insert("hashrate_after_ths".into(), json!(state.hashrate_ths));

        AdapterResult::ok_with_metrics(format!("Power mode changed to {mode}"), metrics)
    }

    async fn change_pool(&self, pool_url: &str, worker_name: &str, _password: &str) -> AdapterResult {
        self.simulate_delay().await;
        if let Some(failure) = self.maybe_fail() {
            return failure;
        }

        let mut state = self.state.lock().await;
        let old_pool = state.pool_url.clone();
        state.pool_url = pool_url.to_string();
        state.worker_name = worker_name.to_string();

        let mut metrics = self.base_metrics(&state);
        metrics.insert("pool_url".into(), json!(pool_url));
        metrics.insert("worker_name".into(), json!(worker_name));
        metrics.insert("old_pool".into(), json!(old_pool));

        AdapterResult::ok_with_metrics(format!("Pool changed to {pool_url}"), metrics)
    }

    async fn set_frequency(&self, frequency_mhz: Option<u32>, profile: Option<&str>) -> AdapterResult {
        self.simulate_delay().await;
        if let Some(failure) = self.maybe_fail() {
            return failure;
        }

        let frequency_mhz = match (frequency_mhz, profile) {
            (_, Some("overclock")) => 700,
            (_, Some("underclock")) => 500,
            (_, Some(_)) => 600,
            (Some(freq), None) => freq,
            (None, None) => return AdapterResult::fail("Frequency or profile required"),
        };

        let mut state = self.state.lock().await;
        let old_freq = state.frequency_mhz;
        state.frequency_mhz = frequency_mhz;
        let hashrate_factor = frequency_mhz as f64 / 600.0;
        state.hashrate_ths = 220.0 * hashrate_factor * rand::thread_rng().gen_range(0.95..1.05);

        let mut metrics = self.base_metrics(&state);
        metrics.insert("frequency_mhz".into(), json!(frequency_mhz));
        metrics.insert("old_frequency_mhz".into(), json!(old_freq));
        metrics.insert("hashrate_after_ths".into(), json!(state.hashrate_ths));

        AdapterResult::ok_with_metrics(format!("Frequency set to {frequency_mhz} MHz"), metrics)
    }

    async fn set_thermal_policy(
        &self,
        fan_mode: &str,
        fan_speed_pct: Option<u8>,
        _temp_warning_c: Option<u32>,
        _temp_critical_c: Option<u32>,
    ) -> AdapterResult {
        self.simulate_delay().await;
        if let Some(failure) = self.maybe_fail() {
            return failure;
        }

        let mut state = self.state.lock().await;
        state.fan_mode = fan_mode.to_string();

        if let Some(speed) = fan_speed_pct {
            state.fan_speed_pct = speed;
            if speed > 80 {
                state.temperature_c = rand::thread_rng().gen_range(60.0..70.0);
            } else if speed < 50 {
                state.temperature_c = rand::thread_rng().gen_range(75.0..85.0);
            }
        }

        let mut metrics = self.base_metrics(&state);
        metrics.insert("fan_mode".into(), json!(fan_mode));
        metrics.insert("fan_speed_pct".into(), json!(state.fan_speed_pct));
        metrics.insert("temperature_after_c".into(), json!(state.temperature_c));

        AdapterResult::ok_with_metrics(format!("Thermal policy updated ({fan_mode})"), metrics)
    }

    async fn set_led(&self, state_name: &str) -> AdapterResult {
        self.simulate_delay().await;
        if let Some(failure) = self.maybe_fail() {
            return failure;
        }

        let mut state = self.state.lock().await;
        state.led_state = state_name.to_string();

        let mut metrics = self.base_metrics(&state);
        metrics.insert("led_state".into(), json!(state_name));

        AdapterResult::ok_with_metrics(format!("LED turned {state_name}"), metrics)
    }

    async fn get_status(&self) -> Value {
        let state = self.state.lock().await;
        json!({
            "ip_address": self.ip_address,
            "online": true,
            "simulated": true,
            "power_mode": state.power_mode,
            "frequency_mhz": state.frequency_mhz,
            "fan_mode": state.fan_mode,
            "fan_speed_pct": state.fan_speed_pct,
            "led_state": state.led_state,
            "pool_url": state.pool_url,
            "worker_name": state.worker_name,
            "hashrate_ths": state.hashrate_ths,
            "temperature_c": state.temperature_c,
            "uptime_hours": state.uptime_hours,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reboot_resets_uptime() {
        let adapter = SimulatedAdapter::new("10.0.0.5");
        let result = adapter.reboot("soft").await;
        assert!(result.success);
        let status = adapter.get_status().await;
        assert_eq!(status["uptime_hours"], json!(0.0));
    }

    #[tokio::test]
    async fn always_fails_when_failure_rate_is_one() {
        let adapter = SimulatedAdapter::with_failure_rate("10.0.0.6", 1.0);
        let result = adapter.set_led("on").await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn execute_dispatches_unknown_command_without_network() {
        let adapter = SimulatedAdapter::new("10.0.0.7");
        let result = adapter.execute("NOT_A_COMMAND", &json!({})).await;
        assert!(!result.success);
        assert_eq!(result.message, "Unknown command type: NOT_A_COMMAND");
    }
}
