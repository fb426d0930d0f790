// [libs/infra/db/src/repositories/scan_repository.rs]
use crate::errors::DbError;
use crate::DbClient;
use chrono::Utc;
use fleetctl_domain_models::{DiscoveredMinerRecord, IpScanJob, ScanJobStatus};
use libsql::{params, Row};
use tracing::{info, instrument};

pub struct ScanRepository {
    client: DbClient,
}

fn status_from_str(raw: &str) -> ScanJobStatus {
    match raw {
        "RUNNING" => ScanJobStatus::Running,
        "COMPLETED" => ScanJobStatus::Completed,
        "FAILED" => ScanJobStatus::Failed,
        "CANCELLED" => ScanJobStatus::Cancelled,
        _ => ScanJobStatus::Pending,
    }
}

fn status_as_str(status: ScanJobStatus) -> &'static str {
    match status {
        ScanJobStatus::Pending => "PENDING",
        ScanJobStatus::Running => "RUNNING",
        ScanJobStatus::Completed => "COMPLETED",
        ScanJobStatus::Failed => "FAILED",
        ScanJobStatus::Cancelled => "CANCELLED",
    }
}

fn parse_rfc3339(raw: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

fn row_to_job(row: &Row) -> Result<IpScanJob, DbError> {
    let completed_text: Option<String> = row.get(10)?;
    Ok(IpScanJob {
        id: row.get(0)?,
        site_id: row.get(1)?,
        device_id: row.get(2)?,
        ip_range_start: row.get(3)?,
        ip_range_end: row.get(4)?,
        total_ips: row.get(5)?,
        scanned_ips: row.get(6)?,
        discovered_miners: row.get(7)?,
        status: status_from_str(&row.get::<String>(8)?),
        started_at: parse_rfc3339(&row.get::<String>(9)?),
        completed_at: completed_text.map(|t| parse_rfc3339(&t)),
        error: row.get(11)?,
    })
}

const JOB_COLUMNS: &str = "id, site_id, device_id, ip_range_start, ip_range_end, total_ips, scanned_ips, discovered_miners, status, started_at, completed_at, error";

fn row_to_discovered(row: &Row) -> Result<DiscoveredMinerRecord, DbError> {
    Ok(DiscoveredMinerRecord {
        scan_job_id: row.get(0)?,
        ip_address: row.get(1)?,
        detected_model: row.get(2)?,
        detected_type: row.get(3)?,
        is_imported: row.get::<i64>(4)? != 0,
        imported_miner_id: row.get(5)?,
        discovered_at: parse_rfc3339(&row.get::<String>(6)?),
    })
}

const DISCOVERED_COLUMNS: &str =
    "scan_job_id, ip_address, detected_model, detected_type, is_imported, imported_miner_id, discovered_at";

impl ScanRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    /// `POST /admin/scan` (operador) -- crea el job en `PENDING`,
    /// opcionalmente preasignado a un `device_id` específico (spec §3,
    /// `IPScanJob`/`DiscoveredMiner`); si no se preasigna, cualquier edge
    /// del sitio puede reclamarlo vía [`Self::claim_pending`].
    #[instrument(skip(self))]
    pub async fn create_job(
        &self,
        site_id: i64,
        device_id: Option<i64>,
        ip_range_start: &str,
        ip_range_end: &str,
        total_ips: i64,
    ) -> Result<IpScanJob, DbError> {
        let connection = self.client.get_connection()?;
        let id = format!("scan_{}", uuid::Uuid::new_v4().simple());
        connection
            .execute(
                "INSERT INTO ip_scan_jobs (id, site_id, device_id, ip_range_start, ip_range_end, total_ips, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'PENDING')",
                params![id.clone(), site_id, device_id, ip_range_start, ip_range_end, total_ips],
            )
            .await?;
        info!(scan_job_id = %id, site_id, total_ips, "ip scan job created");
        self.get_job(&id).await
    }

    /// `POST /edge/scan` (spec §4.3 lifecycle: "flipped to RUNNING when
    /// picked up by an edge" / §6, `original_source/api/scan_api.py`'s
    /// `start_edge_scan`): reclama atómicamente el siguiente job
    /// `PENDING` -- por id explícito si se pide uno, si no el más
    /// antiguo ya asignado a este dispositivo, y si no hay ninguno el
    /// más antiguo sin asignar en el sitio. `None` si no hay nada que
    /// reclamar.
    #[instrument(skip(self))]
    pub async fn claim_pending(&self, site_id: i64, device_id: i64, scan_job_id: Option<&str>) -> Result<Option<IpScanJob>, DbError> {
        let connection = self.client.get_connection()?;

        let candidate_id: Option<String> = if let Some(id) = scan_job_id {
            let mut rows = connection
                .query(
                    "SELECT id FROM ip_scan_jobs WHERE id = ?1 AND site_id = ?2 AND status = 'PENDING'",
                    params![id, site_id],
                )
                .await?;
            rows.next().await?.map(|row| row.get::<String>(0)).transpose()?
        } else {
            let mut rows = connection
                .query(
                    "SELECT id FROM ip_scan_jobs WHERE site_id = ?1 AND device_id = ?2 AND status = 'PENDING'
                     ORDER BY started_at ASC LIMIT 1",
                    params![site_id, device_id],
                )
                .await?;
            let own = rows.next().await?.map(|row| row.get::<String>(0)).transpose()?;
            match own {
                Some(id) => Some(id),
                None => {
                    let mut rows = connection
                        .query(
                            "SELECT id FROM ip_scan_jobs WHERE site_id = ?1 AND device_id IS NULL AND status = 'PENDING'
                             ORDER BY started_at ASC LIMIT 1",
                            params![site_id],
                        )
                        .await?;
                    rows.next().await?.map(|row| row.get::<String>(0)).transpose()?
                }
            }
        };

        let Some(id) = candidate_id else { return Ok(None) };

        let affected = connection
            .execute(
                "UPDATE ip_scan_jobs SET status = 'RUNNING', device_id = ?2, started_at = ?3
                 WHERE id = ?1 AND status = 'PENDING'",
                params![id.clone(), device_id, Utc::now().to_rfc3339()],
            )
            .await?;
        if affected == 0 {
            // Perdió la carrera contra otro worker del mismo edge; el
            // próximo tick la reintentará.
            return Ok(None);
        }

        info!(scan_job_id = %id, device_id, "ip scan job claimed");
        Ok(Some(self.get_job(&id).await?))
    }

    pub async fn get_job(&self, id: &str) -> Result<IpScanJob, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(&format!("SELECT {JOB_COLUMNS} FROM ip_scan_jobs WHERE id = ?1"), params![id])
            .await?;
        match rows.next().await? {
            Some(row) => row_to_job(&row),
            None => Err(DbError::ScanJobNotFound),
        }
    }

    pub async fn list_jobs_by_site(&self, site_id: i64) -> Result<Vec<IpScanJob>, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(
                &format!("SELECT {JOB_COLUMNS} FROM ip_scan_jobs WHERE site_id = ?1 ORDER BY started_at DESC"),
                params![site_id],
            )
            .await?;
        let mut jobs = Vec::new();
        while let Some(row) = rows.next().await? {
            jobs.push(row_to_job(&row)?);
        }
        Ok(jobs)
    }

    pub async fn update_progress(&self, id: &str, scanned_ips: i64, discovered_miners: i64) -> Result<(), DbError> {
        let connection = self.client.get_connection()?;
        let affected = connection
            .execute(
                "UPDATE ip_scan_jobs SET scanned_ips = ?2, discovered_miners = ?3, status = 'RUNNING' WHERE id = ?1",
                params![id, scanned_ips, discovered_miners],
            )
            .await?;
        if affected == 0 {
            return Err(DbError::ScanJobNotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn finish_job(&self, id: &str, status: ScanJobStatus, error: Option<String>) -> Result<(), DbError> {
        let connection = self.client.get_connection()?;
        let affected = connection
            .execute(
                "UPDATE ip_scan_jobs SET status = ?2, completed_at = ?3, error = ?4 WHERE id = ?1",
                params![id, status_as_str(status), Utc::now().to_rfc3339(), error],
            )
            .await?;
        if affected == 0 {
            return Err(DbError::ScanJobNotFound);
        }
        info!(scan_job_id = id, status = status_as_str(status), "ip scan job finished");
        Ok(())
    }

    pub async fn record_discovered(
        &self,
        scan_job_id: &str,
        ip_address: &str,
        detected_model: &str,
        detected_type: &str,
    ) -> Result<(), DbError> {
        let connection = self.client.get_connection()?;
        connection
            .execute(
                "INSERT INTO discovered_miners (scan_job_id, ip_address, detected_model, detected_type)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (scan_job_id, ip_address) DO UPDATE SET
                    detected_model = excluded.detected_model,
                    detected_type = excluded.detected_type",
                params![scan_job_id, ip_address, detected_model, detected_type],
            )
            .await?;
        Ok(())
    }

    pub async fn list_discovered(&self, scan_job_id: &str) -> Result<Vec<DiscoveredMinerRecord>, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(
                &format!("SELECT {DISCOVERED_COLUMNS} FROM discovered_miners WHERE scan_job_id = ?1 ORDER BY ip_address"),
                params![scan_job_id],
            )
            .await?;
        let mut discovered = Vec::new();
        while let Some(row) = rows.next().await? {
            discovered.push(row_to_discovered(&row)?);
        }
        Ok(discovered)
    }

    /// Transición de sentido único `false -> true` (spec §3, invariante de
    /// `DiscoveredMinerRecord`). No revierte un import ya realizado.
    #[instrument(skip(self))]
    pub async fn mark_imported(&self, scan_job_id: &str, ip_address: &str, imported_miner_id: i64) -> Result<(), DbError> {
        let connection = self.client.get_connection()?;
        connection
            .execute(
                "UPDATE discovered_miners SET is_imported = 1, imported_miner_id = ?3
                 WHERE scan_job_id = ?1 AND ip_address = ?2 AND is_imported = 0",
                params![scan_job_id, ip_address, imported_miner_id],
            )
            .await?;
        Ok(())
    }
}
