// [libs/infra/db/src/repositories/miner_repository.rs]
use crate::errors::DbError;
use crate::DbClient;
use fleetctl_domain_models::{CapabilityLevel, HostingMiner, IpEncryptionMode};
use libsql::{params, Row};
use tracing::{info, instrument};

pub struct MinerRepository {
    client: DbClient,
}

fn ip_mode_from_str(raw: &str) -> IpEncryptionMode {
    match raw {
        "SERVER_ENCRYPT" => IpEncryptionMode::ServerEncrypt,
        "E2EE" => IpEncryptionMode::E2ee,
        _ => IpEncryptionMode::Mask,
    }
}

fn ip_mode_as_str(mode: IpEncryptionMode) -> &'static str {
    match mode {
        IpEncryptionMode::Mask => "MASK",
        IpEncryptionMode::ServerEncrypt => "SERVER_ENCRYPT",
        IpEncryptionMode::E2ee => "E2EE",
    }
}

fn capability_from_str(raw: &str) -> CapabilityLevel {
    match raw {
        "CONTROL" => CapabilityLevel::Control,
        "TELEMETRY" => CapabilityLevel::Telemetry,
        _ => CapabilityLevel::Discovery,
    }
}

fn capability_as_str(level: CapabilityLevel) -> &'static str {
    match level {
        CapabilityLevel::Discovery => "DISCOVERY",
        CapabilityLevel::Telemetry => "TELEMETRY",
        CapabilityLevel::Control => "CONTROL",
    }
}

fn row_to_miner(row: &Row) -> Result<HostingMiner, DbError> {
    Ok(HostingMiner {
        id: row.get(0)?,
        site_id: row.get(1)?,
        ip_address: row.get(2)?,
        ip_encryption_mode: ip_mode_from_str(&row.get::<String>(3)?),
        capability_level: capability_from_str(&row.get::<String>(4)?),
        bound_device_id: row.get(5)?,
    })
}

const SELECT_COLUMNS: &str = "id, site_id, ip_address, ip_encryption_mode, capability_level, bound_device_id";

impl MinerRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, ip_address))]
    pub async fn create(
        &self,
        site_id: i64,
        ip_address: &str,
        ip_encryption_mode: IpEncryptionMode,
        capability_level: CapabilityLevel,
        bound_device_id: Option<i64>,
    ) -> Result<HostingMiner, DbError> {
        let connection = self.client.get_connection()?;
        connection
            .execute(
                "INSERT INTO hosting_miners (site_id, ip_address, ip_encryption_mode, capability_level, bound_device_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    site_id,
                    ip_address,
                    ip_mode_as_str(ip_encryption_mode),
                    capability_as_str(capability_level),
                    bound_device_id
                ],
            )
            .await?;
        let id = connection.last_insert_rowid();
        info!(miner_id = id, site_id, "hosting miner registered");
        self.get_by_id(id).await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<HostingMiner, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(&format!("SELECT {SELECT_COLUMNS} FROM hosting_miners WHERE id = ?1"), params![id])
            .await?;
        match rows.next().await? {
            Some(row) => row_to_miner(&row),
            None => Err(DbError::MinerNotFound),
        }
    }

    pub async fn list_by_site(&self, site_id: i64) -> Result<Vec<HostingMiner>, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM hosting_miners WHERE site_id = ?1 ORDER BY id"),
                params![site_id],
            )
            .await?;
        let mut miners = Vec::new();
        while let Some(row) = rows.next().await? {
            miners.push(row_to_miner(&row)?);
        }
        Ok(miners)
    }

    #[instrument(skip(self))]
    pub async fn set_capability_level(&self, id: i64, level: CapabilityLevel) -> Result<(), DbError> {
        let connection = self.client.get_connection()?;
        let affected = connection
            .execute(
                "UPDATE hosting_miners SET capability_level = ?2 WHERE id = ?1",
                params![id, capability_as_str(level)],
            )
            .await?;
        if affected == 0 {
            return Err(DbError::MinerNotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn bind_device(&self, id: i64, device_id: Option<i64>) -> Result<(), DbError> {
        let connection = self.client.get_connection()?;
        let affected = connection
            .execute("UPDATE hosting_miners SET bound_device_id = ?2 WHERE id = ?1", params![id, device_id])
            .await?;
        if affected == 0 {
            return Err(DbError::MinerNotFound);
        }
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        let connection = self.client.get_connection()?;
        let affected = connection.execute("DELETE FROM hosting_miners WHERE id = ?1", params![id]).await?;
        if affected == 0 {
            return Err(DbError::MinerNotFound);
        }
        Ok(())
    }
}
