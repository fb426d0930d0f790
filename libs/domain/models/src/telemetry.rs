// [libs/domain/models/src/telemetry.rs]
/*!
 * Las cuatro capas del pipeline de telemetría (spec §4.6): `raw_24h`,
 * `live`, `history_5min`, `daily`. Cada struct es la fila que persiste
 * `fleetctl-infra-db::telemetry_repository`; los trabajos de promoción
 * entre capas viven en el mismo crate, no aquí.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReading {
    pub ts: DateTime<Utc>,
    pub site_id: i64,
    pub miner_id: i64,
    pub status: String,
    pub hashrate_ths: f64,
    pub temperature_c: f64,
    pub power_w: f64,
    pub fan_rpm: i64,
    pub reject_rate: f64,
    pub pool_url: String,
}

impl RawReading {
    pub fn is_online(&self) -> bool {
        self.status.eq_ignore_ascii_case("online")
    }
}

/// Exactamente una fila por `miner_id`; representa el snapshot actual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub miner_id: i64,
    pub site_id: i64,
    pub last_seen: DateTime<Utc>,
    pub status: String,
    pub hashrate_ths: f64,
    pub temperature_c: f64,
    pub power_w: f64,
    pub fan_rpm: i64,
    pub reject_rate: f64,
    pub pool_url: String,
    pub worker_name: String,
}

impl LiveSnapshot {
    /// Forma anidada más rica que las columnas planas, tal como la
    /// expone el lector unificado original (`telemetry_service.py::get_live`).
    /// Ver SPEC_FULL §3 "richer live-telemetry shape".
    pub fn to_response(&self) -> serde_json::Value {
        let efficiency_j_per_th = if self.hashrate_ths > 0.0 {
            self.power_w / self.hashrate_ths
        } else {
            0.0
        };

        serde_json::json!({
            "miner_id": self.miner_id,
            "site_id": self.site_id,
            "last_seen": self.last_seen,
            "status": self.status,
            "hashrate": { "current_ths": self.hashrate_ths },
            "temperature": { "current_c": self.temperature_c },
            "power": { "watts": self.power_w },
            "efficiency": { "j_per_th": efficiency_j_per_th },
            "shares": {
                "reject_rate": self.reject_rate,
            },
            "pool": { "url": self.pool_url, "worker": self.worker_name },
            "hardware": { "fan_rpm": self.fan_rpm },
        })
    }
}

/// Agregado de 5 minutos sobre el bucket cerrado inmediatamente anterior.
/// `bucket_ts` está alineado a múltiplos de 5 minutos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History5MinRow {
    pub bucket_ts: DateTime<Utc>,
    pub site_id: i64,
    pub miner_id: i64,
    pub avg_hashrate_ths: f64,
    pub max_hashrate_ths: f64,
    pub min_hashrate_ths: f64,
    pub avg_temperature_c: f64,
    pub max_temperature_c: f64,
    pub avg_power_w: f64,
    pub avg_fan_rpm: f64,
    pub online_ratio: f64,
    pub samples: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRow {
    pub day: DateTime<Utc>,
    pub site_id: i64,
    pub miner_id: i64,
    pub avg_hashrate_ths: f64,
    pub max_hashrate_ths: f64,
    pub min_hashrate_ths: f64,
    pub avg_temperature_c: f64,
    pub max_temperature_c: f64,
    pub avg_power_w: f64,
    pub online_ratio: f64,
    pub samples: i64,
}

/// Selección automática de resolución para el lector unificado (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryResolution {
    FiveMin,
    Hourly,
    Daily,
}

impl HistoryResolution {
    /// `>60d -> daily`; `>2d -> hourly`; de lo contrario `5min`.
    pub fn select(span: chrono::Duration) -> Self {
        if span > chrono::Duration::days(60) {
            Self::Daily
        } else if span > chrono::Duration::days(2) {
            Self::Hourly
        } else {
            Self::FiveMin
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_daily_beyond_sixty_days() {
        assert_eq!(HistoryResolution::select(chrono::Duration::days(61)), HistoryResolution::Daily);
    }

    #[test]
    fn selects_hourly_between_two_and_sixty_days() {
        assert_eq!(HistoryResolution::select(chrono::Duration::days(3)), HistoryResolution::Hourly);
    }

    #[test]
    fn selects_five_min_within_two_days() {
        assert_eq!(HistoryResolution::select(chrono::Duration::hours(12)), HistoryResolution::FiveMin);
    }
}
