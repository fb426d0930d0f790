// [libs/infra/db/src/repositories/telemetry_repository.rs]
/*!
 * Las cuatro capas del pipeline de telemetría (spec §4.6) y los trabajos
 * de promoción entre ellas. `raw_24h` es el único punto de entrada de
 * escritura; `live`, `history_5min` y `daily` se derivan, nunca se
 * escriben directamente desde el edge.
 *
 * libSQL carece de `date_trunc`: el bucketing de 5 minutos y el corte de
 * día se calculan en Rust sobre epoch-segundos y se ligan como `INTEGER`.
 */

use crate::errors::DbError;
use crate::DbClient;
use chrono::{DateTime, TimeZone, Utc};
use fleetctl_domain_models::{DailyRow, History5MinRow, HistoryResolution, LiveSnapshot, RawReading};
use libsql::{params, Row};
use tracing::{info, instrument, warn};

pub struct TelemetryRepository {
    client: DbClient,
}

const FIVE_MINUTES_SECS: i64 = 300;
const DAY_SECS: i64 = 86_400;

fn epoch_of(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp()
}

fn floor_bucket(epoch: i64, span_secs: i64) -> i64 {
    epoch - epoch.rem_euclid(span_secs)
}

fn epoch_to_datetime(epoch: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(epoch, 0).single().unwrap_or_else(Utc::now)
}

fn row_to_live(row: &Row) -> Result<LiveSnapshot, DbError> {
    let last_seen_epoch: i64 = row.get(2)?;
    Ok(LiveSnapshot {
        miner_id: row.get(0)?,
        site_id: row.get(1)?,
        last_seen: epoch_to_datetime(last_seen_epoch),
        status: row.get(4)?,
        hashrate_ths: row.get(5)?,
        temperature_c: row.get(6)?,
        power_w: row.get(7)?,
        fan_rpm: row.get(8)?,
        reject_rate: row.get(9)?,
        pool_url: row.get(10)?,
        worker_name: row.get(11)?,
    })
}

const LIVE_COLUMNS: &str =
    "miner_id, site_id, last_seen_epoch, last_seen_text, status, hashrate_ths, temperature_c, power_w, fan_rpm, reject_rate, pool_url, worker_name";

fn row_to_history_5min(row: &Row) -> Result<History5MinRow, DbError> {
    let bucket_epoch: i64 = row.get(0)?;
    Ok(History5MinRow {
        bucket_ts: epoch_to_datetime(bucket_epoch),
        site_id: row.get(1)?,
        miner_id: row.get(2)?,
        avg_hashrate_ths: row.get(3)?,
        max_hashrate_ths: row.get(4)?,
        min_hashrate_ths: row.get(5)?,
        avg_temperature_c: row.get(6)?,
        max_temperature_c: row.get(7)?,
        avg_power_w: row.get(8)?,
        avg_fan_rpm: row.get(9)?,
        online_ratio: row.get(10)?,
        samples: row.get(11)?,
    })
}

fn row_to_daily(row: &Row) -> Result<DailyRow, DbError> {
    let day_epoch: i64 = row.get(0)?;
    Ok(DailyRow {
        day: epoch_to_datetime(day_epoch),
        site_id: row.get(1)?,
        miner_id: row.get(2)?,
        avg_hashrate_ths: row.get(3)?,
        max_hashrate_ths: row.get(4)?,
        min_hashrate_ths: row.get(5)?,
        avg_temperature_c: row.get(6)?,
        max_temperature_c: row.get(7)?,
        avg_power_w: row.get(8)?,
        online_ratio: row.get(9)?,
        samples: row.get(10)?,
    })
}

impl TelemetryRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    /// Único punto de entrada de escritura del pipeline: inserta en
    /// `raw_24h` y refresca `live` en la misma llamada (el snapshot vivo
    /// no espera al job de minuto).
    #[instrument(skip(self, reading))]
    pub async fn ingest_raw(&self, reading: &RawReading, worker_name: &str) -> Result<(), DbError> {
        let connection = self.client.get_connection()?;
        let ts_epoch = epoch_of(&reading.ts);

        connection
            .execute(
                "INSERT INTO raw_24h (ts_epoch, ts_text, site_id, miner_id, status, hashrate_ths, temperature_c, power_w, fan_rpm, reject_rate, pool_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    ts_epoch,
                    reading.ts.to_rfc3339(),
                    reading.site_id,
                    reading.miner_id,
                    reading.status.clone(),
                    reading.hashrate_ths,
                    reading.temperature_c,
                    reading.power_w,
                    reading.fan_rpm,
                    reading.reject_rate,
                    reading.pool_url.clone()
                ],
            )
            .await?;

        connection
            .execute(
                "INSERT INTO live (miner_id, site_id, last_seen_epoch, last_seen_text, status, hashrate_ths, temperature_c, power_w, fan_rpm, reject_rate, pool_url, worker_name)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT (miner_id) DO UPDATE SET
                    site_id = excluded.site_id,
                    last_seen_epoch = excluded.last_seen_epoch,
                    last_seen_text = excluded.last_seen_text,
                    status = excluded.status,
                    hashrate_ths = excluded.hashrate_ths,
                    temperature_c = excluded.temperature_c,
                    power_w = excluded.power_w,
                    fan_rpm = excluded.fan_rpm,
                    reject_rate = excluded.reject_rate,
                    pool_url = excluded.pool_url,
                    worker_name = excluded.worker_name",
                params![
                    reading.miner_id,
                    reading.site_id,
                    ts_epoch,
                    reading.ts.to_rfc3339(),
                    reading.status.clone(),
                    reading.hashrate_ths,
                    reading.temperature_c,
                    reading.power_w,
                    reading.fan_rpm,
                    reading.reject_rate,
                    reading.pool_url.clone(),
                    worker_name
                ],
            )
            .await?;

        Ok(())
    }

    pub async fn get_live(&self, miner_id: i64) -> Result<Option<LiveSnapshot>, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(&format!("SELECT {LIVE_COLUMNS} FROM live WHERE miner_id = ?1"), params![miner_id])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_live(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_live_by_site(&self, site_id: i64) -> Result<Vec<LiveSnapshot>, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(&format!("SELECT {LIVE_COLUMNS} FROM live WHERE site_id = ?1 ORDER BY miner_id"), params![site_id])
            .await?;
        let mut snapshots = Vec::new();
        while let Some(row) = rows.next().await? {
            snapshots.push(row_to_live(&row)?);
        }
        Ok(snapshots)
    }

    /// Job de minuto: promueve el bucket de 5 minutos cerrado
    /// inmediatamente antes de `now` desde `raw_24h` a `history_5min`.
    /// Idempotente vía `UNIQUE(bucket_epoch, site_id, miner_id)`:
    /// reintentar el mismo bucket es un no-op.
    #[instrument(skip(self))]
    pub async fn promote_history_5min(&self, now: DateTime<Utc>) -> Result<usize, DbError> {
        let now_epoch = epoch_of(&now);
        let current_bucket = floor_bucket(now_epoch, FIVE_MINUTES_SECS);
        let closed_bucket = current_bucket - FIVE_MINUTES_SECS;
        let bucket_end = closed_bucket + FIVE_MINUTES_SECS;

        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT site_id, miner_id,
                    AVG(hashrate_ths), MAX(hashrate_ths), MIN(hashrate_ths),
                    AVG(temperature_c), MAX(temperature_c), AVG(power_w), AVG(fan_rpm),
                    AVG(CASE WHEN status = 'online' THEN 1.0 ELSE 0.0 END),
                    COUNT(*)
                 FROM raw_24h
                 WHERE ts_epoch >= ?1 AND ts_epoch < ?2
                 GROUP BY site_id, miner_id",
                params![closed_bucket, bucket_end],
            )
            .await?;

        let mut promoted = 0usize;
        while let Some(row) = rows.next().await? {
            let site_id: i64 = row.get(0)?;
            let miner_id: i64 = row.get(1)?;
            connection
                .execute(
                    "INSERT INTO history_5min (bucket_epoch, site_id, miner_id, avg_hashrate_ths, max_hashrate_ths, min_hashrate_ths, avg_temperature_c, max_temperature_c, avg_power_w, avg_fan_rpm, online_ratio, samples)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                     ON CONFLICT (bucket_epoch, site_id, miner_id) DO NOTHING",
                    params![
                        closed_bucket,
                        site_id,
                        miner_id,
                        row.get::<f64>(2)?,
                        row.get::<f64>(3)?,
                        row.get::<f64>(4)?,
                        row.get::<f64>(5)?,
                        row.get::<f64>(6)?,
                        row.get::<f64>(7)?,
                        row.get::<f64>(8)?,
                        row.get::<f64>(9)?,
                        row.get::<i64>(10)?
                    ],
                )
                .await?;
            promoted += 1;
        }

        if promoted > 0 {
            info!(bucket_epoch = closed_bucket, promoted, "history_5min bucket promoted");
        }
        Ok(promoted)
    }

    /// Job diario: agrega `history_5min` del día cerrado hacia `daily`.
    /// Idempotente vía `UNIQUE(day_epoch, site_id, miner_id)`.
    #[instrument(skip(self))]
    pub async fn promote_daily(&self, now: DateTime<Utc>) -> Result<usize, DbError> {
        let now_epoch = epoch_of(&now);
        let current_day = floor_bucket(now_epoch, DAY_SECS);
        let closed_day = current_day - DAY_SECS;
        let day_end = closed_day + DAY_SECS;

        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT site_id, miner_id,
                    AVG(avg_hashrate_ths), MAX(max_hashrate_ths), MIN(min_hashrate_ths),
                    AVG(avg_temperature_c), MAX(max_temperature_c), AVG(avg_power_w),
                    AVG(online_ratio), SUM(samples)
                 FROM history_5min
                 WHERE bucket_epoch >= ?1 AND bucket_epoch < ?2
                 GROUP BY site_id, miner_id",
                params![closed_day, day_end],
            )
            .await?;

        let mut promoted = 0usize;
        while let Some(row) = rows.next().await? {
            let site_id: i64 = row.get(0)?;
            let miner_id: i64 = row.get(1)?;
            connection
                .execute(
                    "INSERT INTO daily (day_epoch, site_id, miner_id, avg_hashrate_ths, max_hashrate_ths, min_hashrate_ths, avg_temperature_c, max_temperature_c, avg_power_w, online_ratio, samples)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                     ON CONFLICT (day_epoch, site_id, miner_id) DO NOTHING",
                    params![
                        closed_day,
                        site_id,
                        miner_id,
                        row.get::<f64>(2)?,
                        row.get::<f64>(3)?,
                        row.get::<f64>(4)?,
                        row.get::<f64>(5)?,
                        row.get::<f64>(6)?,
                        row.get::<f64>(7)?,
                        row.get::<f64>(8)?,
                        row.get::<i64>(9)?
                    ],
                )
                .await?;
            promoted += 1;
        }

        if promoted > 0 {
            info!(day_epoch = closed_day, promoted, "daily bucket promoted");
        }
        Ok(promoted)
    }

    /// `raw_24h`: retiene 24h; `history_5min`: 90d; `daily`: 365d (spec §4.6).
    #[instrument(skip(self))]
    pub async fn prune_expired(&self, now: DateTime<Utc>) -> Result<(), DbError> {
        let connection = self.client.get_connection()?;
        let now_epoch = epoch_of(&now);

        let raw_cutoff = now_epoch - DAY_SECS;
        let history_cutoff = now_epoch - 90 * DAY_SECS;
        let daily_cutoff = now_epoch - 365 * DAY_SECS;

        let raw_deleted = connection.execute("DELETE FROM raw_24h WHERE ts_epoch < ?1", params![raw_cutoff]).await?;
        let history_deleted =
            connection.execute("DELETE FROM history_5min WHERE bucket_epoch < ?1", params![history_cutoff]).await?;
        let daily_deleted = connection.execute("DELETE FROM daily WHERE day_epoch < ?1", params![daily_cutoff]).await?;

        if raw_deleted + history_deleted + daily_deleted > 0 {
            info!(raw_deleted, history_deleted, daily_deleted, "telemetry retention pruning completed");
        } else {
            warn!("telemetry retention pruning found nothing to prune");
        }
        Ok(())
    }

    /// Lector unificado: selecciona automáticamente la resolución según
    /// la amplitud del rango solicitado (spec §4.6) y devuelve filas en
    /// la forma nativa de la capa elegida.
    #[instrument(skip(self))]
    pub async fn read_history(
        &self,
        site_id: i64,
        miner_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<UnifiedHistory, DbError> {
        let resolution = HistoryResolution::select(to - from);
        match resolution {
            HistoryResolution::FiveMin => {
                Ok(UnifiedHistory::FiveMin(self.read_history_5min(site_id, miner_id, from, to).await?))
            }
            HistoryResolution::Hourly => {
                Ok(UnifiedHistory::Hourly(self.read_hourly(site_id, miner_id, from, to).await?))
            }
            HistoryResolution::Daily => {
                Ok(UnifiedHistory::Daily(self.read_daily(site_id, miner_id, from, to).await?))
            }
        }
    }

    async fn read_history_5min(
        &self,
        site_id: i64,
        miner_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<History5MinRow>, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT bucket_epoch, site_id, miner_id, avg_hashrate_ths, max_hashrate_ths, min_hashrate_ths, avg_temperature_c, max_temperature_c, avg_power_w, avg_fan_rpm, online_ratio, samples
                 FROM history_5min WHERE site_id = ?1 AND miner_id = ?2 AND bucket_epoch >= ?3 AND bucket_epoch < ?4
                 ORDER BY bucket_epoch",
                params![site_id, miner_id, epoch_of(&from), epoch_of(&to)],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_history_5min(&row)?);
        }
        Ok(out)
    }

    /// `hourly` no es una capa propia: se deriva agregando `history_5min`
    /// en Rust sobre buckets de hora, ya que libSQL no ofrece `date_trunc`.
    async fn read_hourly(
        &self,
        site_id: i64,
        miner_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<History5MinRow>, DbError> {
        let rows = self.read_history_5min(site_id, miner_id, from, to).await?;
        let mut buckets: std::collections::BTreeMap<i64, Vec<History5MinRow>> = std::collections::BTreeMap::new();
        for row in rows {
            let hour = floor_bucket(epoch_of(&row.bucket_ts), 3600);
            buckets.entry(hour).or_default().push(row);
        }

        let mut aggregated = Vec::with_capacity(buckets.len());
        for (hour_epoch, group) in buckets {
            let count = group.len() as f64;
            let samples: i64 = group.iter().map(|r| r.samples).sum();
            aggregated.push(History5MinRow {
                bucket_ts: epoch_to_datetime(hour_epoch),
                site_id,
                miner_id,
                avg_hashrate_ths: group.iter().map(|r| r.avg_hashrate_ths).sum::<f64>() / count,
                max_hashrate_ths: group.iter().map(|r| r.max_hashrate_ths).fold(f64::MIN, f64::max),
                min_hashrate_ths: group.iter().map(|r| r.min_hashrate_ths).fold(f64::MAX, f64::min),
                avg_temperature_c: group.iter().map(|r| r.avg_temperature_c).sum::<f64>() / count,
                max_temperature_c: group.iter().map(|r| r.max_temperature_c).fold(f64::MIN, f64::max),
                avg_power_w: group.iter().map(|r| r.avg_power_w).sum::<f64>() / count,
                avg_fan_rpm: group.iter().map(|r| r.avg_fan_rpm).sum::<f64>() / count,
                online_ratio: group.iter().map(|r| r.online_ratio).sum::<f64>() / count,
                samples,
            });
        }
        Ok(aggregated)
    }

    async fn read_daily(
        &self,
        site_id: i64,
        miner_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DailyRow>, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT day_epoch, site_id, miner_id, avg_hashrate_ths, max_hashrate_ths, min_hashrate_ths, avg_temperature_c, max_temperature_c, avg_power_w, online_ratio, samples
                 FROM daily WHERE site_id = ?1 AND miner_id = ?2 AND day_epoch >= ?3 AND day_epoch < ?4
                 ORDER BY day_epoch",
                params![site_id, miner_id, epoch_of(&from), epoch_of(&to)],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_daily(&row)?);
        }
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub enum UnifiedHistory {
    FiveMin(Vec<History5MinRow>),
    Hourly(Vec<History5MinRow>),
    Daily(Vec<DailyRow>),
}
