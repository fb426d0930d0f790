// [tests/mirror/libs/infra/db/telemetry_aggregation.test.rs]
//! Escenario literal de spec §8 (#5): cinco lecturas crudas de un mismo
//! miner dentro de un bucket de 5 minutos se promueven a `history_5min`
//! con los agregados exactos documentados.

use chrono::{TimeZone, Utc};
use fleetctl_domain_models::RawReading;
use fleetctl_infra_db::{DbClient, TelemetryRepository};

fn reading(ts_secs: i64, hashrate: f64, status: &str) -> RawReading {
    RawReading {
        ts: Utc.timestamp_opt(ts_secs, 0).single().unwrap(),
        site_id: 1,
        miner_id: 42,
        status: status.to_string(),
        hashrate_ths: hashrate,
        temperature_c: 60.0,
        power_w: 3000.0,
        fan_rpm: 4000,
        reject_rate: 0.01,
        pool_url: "stratum+tcp://pool.example:3333".to_string(),
    }
}

#[tokio::test]
async fn five_readings_promote_to_one_history_5min_row_with_exact_aggregates() {
    let client = DbClient::connect(":memory:", None).await.expect("in-memory connect");
    let telemetry = TelemetryRepository::new(client);

    // Bucket cerrado [0, 300). `now` se fija un minuto después del cierre
    // para que promote_history_5min() tome exactamente ese bucket.
    let bucket_start = 0i64;
    let hashrates = [100.0, 110.0, 120.0, 90.0, 100.0];
    let statuses = ["online", "online", "online", "online", "offline"];

    for (i, (hashrate, status)) in hashrates.iter().zip(statuses.iter()).enumerate() {
        let ts = bucket_start + (i as i64) * 30;
        telemetry.ingest_raw(&reading(ts, *hashrate, status), "worker-0").await.expect("ingest");
    }

    let now = Utc.timestamp_opt(bucket_start + 300 + 60, 0).single().unwrap();
    let promoted = telemetry.promote_history_5min(now).await.expect("promotion job");
    assert_eq!(promoted, 1);

    // Reentregar el mismo job es un no-op idempotente (spec §8 invariante).
    let promoted_again = telemetry.promote_history_5min(now).await.expect("re-run promotion job");
    assert_eq!(promoted_again, 0);

    let from = Utc.timestamp_opt(bucket_start, 0).single().unwrap();
    let to = Utc.timestamp_opt(bucket_start + 300, 0).single().unwrap();
    let rows = match telemetry.read_history(1, 42, from, to).await.expect("read history") {
        fleetctl_infra_db::UnifiedHistory::FiveMin(rows) => rows,
        other => panic!("expected five-minute resolution, got {other:?}"),
    };

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert!((row.avg_hashrate_ths - 104.0).abs() < 1e-9);
    assert!((row.max_hashrate_ths - 120.0).abs() < 1e-9);
    assert!((row.min_hashrate_ths - 90.0).abs() < 1e-9);
    assert!((row.online_ratio - 0.8).abs() < 1e-9);
    assert_eq!(row.samples, 5);
}
