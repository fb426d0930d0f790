// [libs/infra/db/tests/secret_repository.rs]
use fleetctl_domain_models::{CapabilityLevel, IpEncryptionMode};
use fleetctl_infra_db::{DbClient, DbError, DeviceRepository, MinerRepository, SecretRepository};
use serde_json::json;

async fn memory_client() -> DbClient {
    DbClient::connect(":memory:", None).await.expect("in-memory database should connect")
}

#[tokio::test]
async fn rejects_counter_regression() {
    let client = memory_client().await;
    let devices = DeviceRepository::new(client.clone());
    let miners = MinerRepository::new(client.clone());
    let secrets = SecretRepository::new(client.clone());

    let (device, _token) = devices.register(1, None, "rig-01", &[7u8; 32]).await.unwrap();
    let miner = miners.create(1, "10.0.0.5", IpEncryptionMode::Mask, CapabilityLevel::Control, None).await.unwrap();

    secrets
        .upsert(miner.id, device.id, "ciphertext-v1", "wrapped-v1", "nonce-v1", &json!({"v": 1}), 5, 1, device.key_version, device.key_version)
        .await
        .unwrap();

    let result = secrets
        .upsert(miner.id, device.id, "ciphertext-v2", "wrapped-v2", "nonce-v2", &json!({"v": 2}), 4, 1, device.key_version, device.key_version)
        .await;

    assert!(matches!(result, Err(DbError::CounterRegression { current: 5, attempted: 4 })));
}

#[tokio::test]
async fn rejects_mismatched_key_version() {
    let client = memory_client().await;
    let devices = DeviceRepository::new(client.clone());
    let miners = MinerRepository::new(client.clone());
    let secrets = SecretRepository::new(client.clone());

    let (device, _token) = devices.register(1, None, "rig-02", &[9u8; 32]).await.unwrap();
    let miner = miners.create(1, "10.0.0.6", IpEncryptionMode::Mask, CapabilityLevel::Control, None).await.unwrap();

    let result = secrets
        .upsert(miner.id, device.id, "ciphertext", "wrapped", "nonce", &json!({}), 1, 1, device.key_version + 1, device.key_version)
        .await;

    assert!(matches!(result, Err(DbError::KeyVersionMismatch { .. })));
}

#[tokio::test]
async fn accepts_strictly_increasing_counter() {
    let client = memory_client().await;
    let devices = DeviceRepository::new(client.clone());
    let miners = MinerRepository::new(client.clone());
    let secrets = SecretRepository::new(client.clone());

    let (device, _token) = devices.register(1, None, "rig-03", &[3u8; 32]).await.unwrap();
    let miner = miners.create(1, "10.0.0.7", IpEncryptionMode::Mask, CapabilityLevel::Control, None).await.unwrap();

    secrets
        .upsert(miner.id, device.id, "c1", "w1", "n1", &json!({}), 1, 1, device.key_version, device.key_version)
        .await
        .unwrap();
    let updated = secrets
        .upsert(miner.id, device.id, "c2", "w2", "n2", &json!({}), 2, 1, device.key_version, device.key_version)
        .await
        .unwrap();

    assert_eq!(updated.counter, 2);
    assert_eq!(updated.encrypted_payload, "c2");
}

#[tokio::test]
async fn key_rotation_invalidates_stale_writes() {
    let client = memory_client().await;
    let devices = DeviceRepository::new(client.clone());
    let miners = MinerRepository::new(client.clone());
    let secrets = SecretRepository::new(client.clone());

    let (device, _token) = devices.register(1, None, "rig-04", &[1u8; 32]).await.unwrap();
    let miner = miners.create(1, "10.0.0.8", IpEncryptionMode::Mask, CapabilityLevel::Control, None).await.unwrap();

    secrets
        .upsert(miner.id, device.id, "c1", "w1", "n1", &json!({}), 1, 1, device.key_version, device.key_version)
        .await
        .unwrap();

    let rotated = devices.rotate_key(device.id, &[2u8; 32]).await.unwrap();
    assert_eq!(rotated.key_version, device.key_version + 1);

    let stale_write = secrets
        .upsert(miner.id, device.id, "c2", "w2", "n2", &json!({}), 2, 1, device.key_version, rotated.key_version)
        .await;
    assert!(matches!(stale_write, Err(DbError::KeyVersionMismatch { .. })));
}
