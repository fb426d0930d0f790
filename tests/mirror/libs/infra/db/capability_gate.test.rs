// [tests/mirror/libs/infra/db/capability_gate.test.rs]
//! Escenario literal de spec §8 (#3): un miner en `TELEMETRY` deniega la
//! puerta de capacidad; tras escalar a `CONTROL` el mismo dispositivo pasa.

use fleetctl_domain_models::{check_capability, AuthContext, CapabilityLevel, GateDenial, IpEncryptionMode};
use fleetctl_infra_db::DbClient;
use fleetctl_infra_db::{DeviceRepository, MinerRepository};

#[tokio::test]
async fn capability_gate_denies_then_allows_after_operator_grants_control() {
    let client = DbClient::connect(":memory:", None).await.expect("in-memory connect");
    let devices = DeviceRepository::new(client.clone());
    let miners = MinerRepository::new(client);

    let (device, _token) = devices
        .register(1, Some(1), "rig-floor-device", &[7u8; 32])
        .await
        .expect("register device");

    let miner = miners
        .create(1, "10.0.0.5", IpEncryptionMode::Mask, CapabilityLevel::Telemetry, Some(device.id))
        .await
        .expect("create miner");

    let auth = AuthContext::from_device(&device, device.key_version);
    let denial = check_capability(&auth, &miner).expect_err("telemetry-level miner must deny control access");
    assert_eq!(denial, GateDenial::CapabilityDenied);

    miners.set_capability_level(miner.id, CapabilityLevel::Control).await.expect("escalate capability");
    let escalated = miners.get_by_id(miner.id).await.expect("reload miner");

    assert!(check_capability(&auth, &escalated).is_ok());
}

#[tokio::test]
async fn capability_gate_denies_revoked_device_before_checking_capability() {
    let client = DbClient::connect(":memory:", None).await.expect("in-memory connect");
    let devices = DeviceRepository::new(client.clone());
    let miners = MinerRepository::new(client);

    let (device, _token) = devices.register(1, Some(1), "edge-1", &[3u8; 32]).await.expect("register device");
    let miner = miners
        .create(1, "10.0.0.9", IpEncryptionMode::Mask, CapabilityLevel::Control, Some(device.id))
        .await
        .expect("create miner");

    devices.revoke(device.id).await.expect("revoke device");
    let revoked = devices.get_by_id(device.id).await.expect("reload device");

    let auth = AuthContext::from_device(&revoked, revoked.key_version);
    let denial = check_capability(&auth, &miner).expect_err("revoked device must be denied");
    assert_eq!(denial, GateDenial::DeviceRevoked);
}
