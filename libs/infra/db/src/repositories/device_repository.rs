// [libs/infra/db/src/repositories/device_repository.rs]
use crate::errors::DbError;
use crate::DbClient;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use fleetctl_domain_models::{DeviceStatus, EdgeDevice};
use libsql::{params, Row};
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

pub struct DeviceRepository {
    client: DbClient,
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn status_from_str(raw: &str) -> DeviceStatus {
    match raw {
        "ACTIVE" => DeviceStatus::Active,
        "REVOKED" => DeviceStatus::Revoked,
        _ => DeviceStatus::Pending,
    }
}

fn status_as_str(status: DeviceStatus) -> &'static str {
    match status {
        DeviceStatus::Pending => "PENDING",
        DeviceStatus::Active => "ACTIVE",
        DeviceStatus::Revoked => "REVOKED",
    }
}

fn row_to_device(row: &Row) -> Result<EdgeDevice, DbError> {
    let public_key_b64: String = row.get(5)?;
    let public_key_bytes = BASE64
        .decode(public_key_b64)
        .map_err(|e| DbError::MappingError(e.to_string()))?;
    let public_key: [u8; 32] = public_key_bytes
        .try_into()
        .map_err(|_| DbError::MappingError("public key is not 32 bytes".into()))?;

    let last_seen_text: Option<String> = row.get(8)?;
    let last_seen_at = last_seen_text
        .and_then(|text| chrono::DateTime::parse_from_rfc3339(&text).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let created_text: String = row.get(9)?;
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_text)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(EdgeDevice {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        site_id: row.get(2)?,
        device_name: row.get(3)?,
        public_key,
        key_version: row.get(6)?,
        status: status_from_str(&row.get::<String>(7)?),
        last_seen_at,
        created_at,
    })
}

const SELECT_COLUMNS: &str =
    "id, tenant_id, site_id, device_name, device_token_hash, public_key_b64, key_version, status, last_seen_at, created_at";

impl DeviceRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    /// Registra un dispositivo nuevo en estado `PENDING` -> `ACTIVE` en el
    /// mismo paso (el registro es el propio acto de activación). Devuelve
    /// el `device_token` en claro; no se persiste nunca en claro.
    #[instrument(skip(self, public_key))]
    pub async fn register(
        &self,
        tenant_id: i64,
        site_id: Option<i64>,
        device_name: &str,
        public_key: &[u8; 32],
    ) -> Result<(EdgeDevice, String), DbError> {
        let connection = self.client.get_connection()?;
        let device_token = format!("edgt_{}", uuid::Uuid::new_v4().simple());
        let token_hash = hash_token(&device_token);
        let public_key_b64 = BASE64.encode(public_key);

        connection
            .execute(
                "INSERT INTO edge_devices (tenant_id, site_id, device_name, device_token_hash, public_key_b64, key_version, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, 'ACTIVE')",
                params![tenant_id, site_id, device_name, token_hash, public_key_b64],
            )
            .await?;

        let id = connection.last_insert_rowid();
        info!(device_id = id, tenant_id, "edge device registered");

        let device = self.get_by_id(id).await?;
        Ok((device, device_token))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<EdgeDevice, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(&format!("SELECT {SELECT_COLUMNS} FROM edge_devices WHERE id = ?1"), params![id])
            .await?;

        match rows.next().await? {
            Some(row) => row_to_device(&row),
            None => Err(DbError::DeviceNotFound),
        }
    }

    /// Autentica por `device_token` en claro comparando el hash SHA-256;
    /// usado por el middleware bearer de `apps/control-plane`.
    pub async fn authenticate_by_token(&self, device_token: &str) -> Result<EdgeDevice, DbError> {
        let connection = self.client.get_connection()?;
        let token_hash = hash_token(device_token);
        let mut rows = connection
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM edge_devices WHERE device_token_hash = ?1"),
                params![token_hash],
            )
            .await?;

        match rows.next().await? {
            Some(row) => row_to_device(&row),
            None => Err(DbError::DeviceNotFound),
        }
    }

    #[instrument(skip(self))]
    pub async fn revoke(&self, id: i64) -> Result<(), DbError> {
        let connection = self.client.get_connection()?;
        let affected = connection
            .execute("UPDATE edge_devices SET status = 'REVOKED' WHERE id = ?1", params![id])
            .await?;
        if affected == 0 {
            return Err(DbError::DeviceNotFound);
        }
        info!(device_id = id, "edge device revoked");
        Ok(())
    }

    /// Incrementa `key_version`. Todos los secretos cifrados bajo la
    /// versión anterior quedan inutilizables en el próximo pull (spec §3).
    #[instrument(skip(self))]
    pub async fn rotate_key(&self, id: i64, new_public_key: &[u8; 32]) -> Result<EdgeDevice, DbError> {
        let connection = self.client.get_connection()?;
        let public_key_b64 = BASE64.encode(new_public_key);
        let affected = connection
            .execute(
                "UPDATE edge_devices SET key_version = key_version + 1, public_key_b64 = ?2 WHERE id = ?1",
                params![id, public_key_b64],
            )
            .await?;
        if affected == 0 {
            return Err(DbError::DeviceNotFound);
        }
        let device = self.get_by_id(id).await?;
        info!(device_id = id, key_version = device.key_version, "edge device key rotated");
        Ok(device)
    }

    pub async fn touch_heartbeat(&self, id: i64) -> Result<chrono::DateTime<Utc>, DbError> {
        let connection = self.client.get_connection()?;
        let now = Utc::now();
        let affected = connection
            .execute(
                "UPDATE edge_devices SET last_seen_at = ?2 WHERE id = ?1",
                params![id, now.to_rfc3339()],
            )
            .await?;
        if affected == 0 {
            return Err(DbError::DeviceNotFound);
        }
        Ok(now)
    }

    pub fn status_label(status: DeviceStatus) -> &'static str {
        status_as_str(status)
    }
}
