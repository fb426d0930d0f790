// [libs/infra/db/src/schema.rs]
/*!
 * =================================================================
 * APARATO: ESQUEMA SOBERANO DEL PLANO DE CONTROL (V1.0)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * Todas las marcas de tiempo se persisten en un par de columnas: un
 * `INTEGER` de segundos-epoch (para aritmética de rango y bucketing en
 * Rust, ya que SQLite/libSQL carece de `date_trunc`) y un `TEXT` RFC3339
 * (para lectura humana y round-trip exacto vía `chrono`).
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument};

const TACTICAL_TABLES: &[(&str, &str)] = &[
    ("TABLE_EDGE_DEVICES", r#"
        CREATE TABLE IF NOT EXISTS edge_devices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            site_id INTEGER,
            device_name TEXT NOT NULL,
            device_token_hash TEXT NOT NULL UNIQUE,
            public_key_b64 TEXT NOT NULL,
            key_version INTEGER NOT NULL DEFAULT 1,
            status TEXT NOT NULL DEFAULT 'PENDING',
            last_seen_at TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );
    "#),
    ("TABLE_HOSTING_MINERS", r#"
        CREATE TABLE IF NOT EXISTS hosting_miners (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL,
            ip_address TEXT NOT NULL,
            ip_encryption_mode TEXT NOT NULL DEFAULT 'MASK',
            capability_level TEXT NOT NULL DEFAULT 'DISCOVERY',
            bound_device_id INTEGER
        );
    "#),
    ("TABLE_MINER_SECRETS", r#"
        CREATE TABLE IF NOT EXISTS miner_secrets (
            miner_id INTEGER NOT NULL,
            device_id INTEGER NOT NULL,
            encrypted_payload TEXT NOT NULL,
            wrapped_dek TEXT NOT NULL,
            nonce TEXT NOT NULL,
            aad_json TEXT NOT NULL,
            counter INTEGER NOT NULL,
            schema_version INTEGER NOT NULL DEFAULT 1,
            key_version INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            PRIMARY KEY (miner_id, device_id)
        );
    "#),
    ("TABLE_IP_SCAN_JOBS", r#"
        CREATE TABLE IF NOT EXISTS ip_scan_jobs (
            id TEXT PRIMARY KEY,
            site_id INTEGER NOT NULL,
            device_id INTEGER,
            ip_range_start TEXT NOT NULL,
            ip_range_end TEXT NOT NULL,
            total_ips INTEGER NOT NULL DEFAULT 0,
            scanned_ips INTEGER NOT NULL DEFAULT 0,
            discovered_miners INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'PENDING',
            started_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            completed_at TEXT,
            error TEXT
        );
    "#),
    ("TABLE_DISCOVERED_MINERS", r#"
        CREATE TABLE IF NOT EXISTS discovered_miners (
            scan_job_id TEXT NOT NULL,
            ip_address TEXT NOT NULL,
            detected_model TEXT NOT NULL DEFAULT 'Unknown',
            detected_type TEXT NOT NULL DEFAULT 'UNKNOWN',
            is_imported INTEGER NOT NULL DEFAULT 0,
            imported_miner_id INTEGER,
            discovered_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            PRIMARY KEY (scan_job_id, ip_address)
        );
    "#),
    ("TABLE_RAW_24H", r#"
        CREATE TABLE IF NOT EXISTS raw_24h (
            ts_epoch INTEGER NOT NULL,
            ts_text TEXT NOT NULL,
            site_id INTEGER NOT NULL,
            miner_id INTEGER NOT NULL,
            status TEXT NOT NULL,
            hashrate_ths REAL NOT NULL DEFAULT 0,
            temperature_c REAL NOT NULL DEFAULT 0,
            power_w REAL NOT NULL DEFAULT 0,
            fan_rpm INTEGER NOT NULL DEFAULT 0,
            reject_rate REAL NOT NULL DEFAULT 0,
            pool_url TEXT NOT NULL DEFAULT ''
        );
    "#),
    ("TABLE_LIVE", r#"
        CREATE TABLE IF NOT EXISTS live (
            miner_id INTEGER PRIMARY KEY,
            site_id INTEGER NOT NULL,
            last_seen_epoch INTEGER NOT NULL,
            last_seen_text TEXT NOT NULL,
            status TEXT NOT NULL,
            hashrate_ths REAL NOT NULL DEFAULT 0,
            temperature_c REAL NOT NULL DEFAULT 0,
            power_w REAL NOT NULL DEFAULT 0,
            fan_rpm INTEGER NOT NULL DEFAULT 0,
            reject_rate REAL NOT NULL DEFAULT 0,
            pool_url TEXT NOT NULL DEFAULT '',
            worker_name TEXT NOT NULL DEFAULT ''
        );
    "#),
    ("TABLE_HISTORY_5MIN", r#"
        CREATE TABLE IF NOT EXISTS history_5min (
            bucket_epoch INTEGER NOT NULL,
            site_id INTEGER NOT NULL,
            miner_id INTEGER NOT NULL,
            avg_hashrate_ths REAL NOT NULL,
            max_hashrate_ths REAL NOT NULL,
            min_hashrate_ths REAL NOT NULL,
            avg_temperature_c REAL NOT NULL,
            max_temperature_c REAL NOT NULL,
            avg_power_w REAL NOT NULL,
            avg_fan_rpm REAL NOT NULL,
            online_ratio REAL NOT NULL,
            samples INTEGER NOT NULL,
            UNIQUE(bucket_epoch, site_id, miner_id)
        );
    "#),
    ("TABLE_DAILY", r#"
        CREATE TABLE IF NOT EXISTS daily (
            day_epoch INTEGER NOT NULL,
            site_id INTEGER NOT NULL,
            miner_id INTEGER NOT NULL,
            avg_hashrate_ths REAL NOT NULL,
            max_hashrate_ths REAL NOT NULL,
            min_hashrate_ths REAL NOT NULL,
            avg_temperature_c REAL NOT NULL,
            max_temperature_c REAL NOT NULL,
            avg_power_w REAL NOT NULL,
            online_ratio REAL NOT NULL,
            samples INTEGER NOT NULL,
            UNIQUE(day_epoch, site_id, miner_id)
        );
    "#),
    ("TABLE_DEVICE_AUDIT_EVENTS", r#"
        CREATE TABLE IF NOT EXISTS device_audit_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_type TEXT NOT NULL,
            tenant_id INTEGER NOT NULL,
            device_id INTEGER,
            miner_id INTEGER,
            actor_id TEXT,
            actor_type TEXT NOT NULL DEFAULT 'system',
            source_ip TEXT,
            user_agent TEXT,
            event_data_json TEXT NOT NULL DEFAULT '{}',
            result TEXT NOT NULL,
            error_message TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );
    "#),
    ("TABLE_COMMANDS", r#"
        CREATE TABLE IF NOT EXISTS commands (
            command_id TEXT PRIMARY KEY,
            tenant_id INTEGER NOT NULL,
            site_id INTEGER NOT NULL,
            device_id INTEGER NOT NULL,
            command_type TEXT NOT NULL,
            payload_json TEXT NOT NULL DEFAULT '{}',
            target_ids_json TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL DEFAULT 'QUEUED',
            results_json TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            pulled_at TEXT,
            completed_at TEXT
        );
    "#),
];

const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_MINER_SECRETS_DEVICE", "CREATE INDEX IF NOT EXISTS idx_miner_secrets_device ON miner_secrets(device_id, counter);"),
    ("IDX_RAW_24H_MINER_TS", "CREATE INDEX IF NOT EXISTS idx_raw_24h_miner_ts ON raw_24h(miner_id, ts_epoch);"),
    ("IDX_RAW_24H_TS", "CREATE INDEX IF NOT EXISTS idx_raw_24h_ts ON raw_24h(ts_epoch);"),
    ("IDX_HISTORY_5MIN_SITE", "CREATE INDEX IF NOT EXISTS idx_history_5min_site ON history_5min(site_id, bucket_epoch);"),
    ("IDX_DAILY_SITE", "CREATE INDEX IF NOT EXISTS idx_daily_site ON daily(site_id, day_epoch);"),
    ("IDX_AUDIT_TENANT", "CREATE INDEX IF NOT EXISTS idx_audit_tenant ON device_audit_events(tenant_id, created_at);"),
    ("IDX_COMMANDS_SITE_DEVICE", "CREATE INDEX IF NOT EXISTS idx_commands_site_device ON commands(site_id, device_id, status);"),
    ("IDX_DISCOVERED_SCAN", "CREATE INDEX IF NOT EXISTS idx_discovered_scan ON discovered_miners(scan_job_id);"),
    ("IDX_SCAN_JOBS_CLAIM", "CREATE INDEX IF NOT EXISTS idx_scan_jobs_claim ON ip_scan_jobs(site_id, device_id, status);"),
];

/// Sincroniza el esquema completo. Idempotente: seguro de invocar en
/// cada arranque del proceso.
#[instrument(skip(database_connection))]
pub async fn apply_full_schema(database_connection: &Connection) -> Result<()> {
    info!("🏗️ [SCHEMA]: Synchronizing fleet control-plane schema...");

    for (identifier, sql) in TACTICAL_TABLES {
        debug!("  ↳ solidifying {}", identifier);
        database_connection
            .execute(sql, ())
            .await
            .with_context(|| format!("table creation failed: {identifier}"))?;
    }

    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!("  ↳ indexing {}", identifier);
        database_connection
            .execute(sql, ())
            .await
            .with_context(|| format!("index creation failed: {identifier}"))?;
    }

    info!("✅ [SCHEMA]: Fleet control-plane schema level and certified.");
    Ok(())
}
