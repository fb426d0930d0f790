// [libs/infra/db/src/repositories/secret_repository.rs]
use crate::errors::DbError;
use crate::DbClient;
use chrono::Utc;
use fleetctl_domain_models::MinerSecret;
use libsql::{params, Row};
use tracing::{info, instrument, warn};

pub struct SecretRepository {
    client: DbClient,
}

fn row_to_secret(row: &Row) -> Result<MinerSecret, DbError> {
    let aad_text: String = row.get(5)?;
    let aad = serde_json::from_str(&aad_text).map_err(|e| DbError::MappingError(e.to_string()))?;
    let created_text: String = row.get(9)?;
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_text)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(MinerSecret {
        miner_id: row.get(0)?,
        device_id: row.get(1)?,
        encrypted_payload: row.get(2)?,
        wrapped_dek: row.get(3)?,
        nonce: row.get(4)?,
        aad,
        counter: row.get(6)?,
        schema_version: row.get(7)?,
        key_version: row.get(8)?,
        created_at,
    })
}

const SELECT_COLUMNS: &str =
    "miner_id, device_id, encrypted_payload, wrapped_dek, nonce, aad_json, counter, schema_version, key_version, created_at";

impl SecretRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, miner_id: i64, device_id: i64) -> Result<Option<MinerSecret>, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM miner_secrets WHERE miner_id = ?1 AND device_id = ?2"),
                params![miner_id, device_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_secret(&row)?)),
            None => Ok(None),
        }
    }

    /// Listado de secretos destinados a un dispositivo con `counter` mayor
    /// al solicitado; soporta el pull incremental `GET /edge/secrets?since_counter=`.
    pub async fn list_for_device_since(&self, device_id: i64, since_counter: i64) -> Result<Vec<MinerSecret>, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM miner_secrets WHERE device_id = ?1 AND counter > ?2 ORDER BY counter"
                ),
                params![device_id, since_counter],
            )
            .await?;
        let mut secrets = Vec::new();
        while let Some(row) = rows.next().await? {
            secrets.push(row_to_secret(&row)?);
        }
        Ok(secrets)
    }

    /// Upsert de un sobre cifrado, aplicando las dos invariantes de
    /// escritura de la spec §3/§4.5/§8:
    /// - `key_version` de la escritura debe coincidir con el vigente del
    ///   dispositivo destino (si ya existe una fila, contra la suya; en
    ///   primera escritura, contra `device_current_key_version`).
    /// - `counter` debe crecer estrictamente sobre el valor actual.
    #[instrument(skip(self, encrypted_payload, wrapped_dek, nonce, aad))]
    pub async fn upsert(
        &self,
        miner_id: i64,
        device_id: i64,
        encrypted_payload: &str,
        wrapped_dek: &str,
        nonce: &str,
        aad: &serde_json::Value,
        counter: i64,
        schema_version: i32,
        key_version: i32,
        device_current_key_version: i32,
    ) -> Result<MinerSecret, DbError> {
        if key_version != device_current_key_version {
            warn!(miner_id, device_id, key_version, device_current_key_version, "secret write rejected: key version mismatch");
            return Err(DbError::KeyVersionMismatch { expected: device_current_key_version, provided: key_version });
        }

        if let Some(existing) = self.get(miner_id, device_id).await? {
            if counter <= existing.counter {
                warn!(miner_id, device_id, current = existing.counter, attempted = counter, "secret write rejected: counter regression");
                return Err(DbError::CounterRegression { current: existing.counter, attempted: counter });
            }
        }

        let connection = self.client.get_connection()?;
        let aad_text = serde_json::to_string(aad).map_err(|e| DbError::MappingError(e.to_string()))?;
        connection
            .execute(
                "INSERT INTO miner_secrets (miner_id, device_id, encrypted_payload, wrapped_dek, nonce, aad_json, counter, schema_version, key_version, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                 ON CONFLICT (miner_id, device_id) DO UPDATE SET
                    encrypted_payload = excluded.encrypted_payload,
                    wrapped_dek = excluded.wrapped_dek,
                    nonce = excluded.nonce,
                    aad_json = excluded.aad_json,
                    counter = excluded.counter,
                    schema_version = excluded.schema_version,
                    key_version = excluded.key_version,
                    updated_at = excluded.updated_at",
                params![miner_id, device_id, encrypted_payload, wrapped_dek, nonce, aad_text, counter, schema_version, key_version],
            )
            .await?;

        info!(miner_id, device_id, counter, "miner secret upserted");
        self.get(miner_id, device_id).await?.ok_or(DbError::MinerNotFound)
    }

    pub async fn delete(&self, miner_id: i64, device_id: i64) -> Result<(), DbError> {
        let connection = self.client.get_connection()?;
        connection
            .execute("DELETE FROM miner_secrets WHERE miner_id = ?1 AND device_id = ?2", params![miner_id, device_id])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // La lógica anti-rollback y de versión de clave se ejerce en las
    // pruebas de integración de `fleetctl-infra-db` contra una base
    // `:memory:` (ver tests/secret_repository.rs); este módulo no
    // duplica fixtures de conexión aquí.
}
