use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ghr_cloud::{InstanceId, MockProvider, RUNNER_TAG};
use ghr_provisioner::cleanup::{ReaperConfig, StaleResourceReaper};
use tokio::sync::watch;

fn minutes(m: i64) -> chrono::Duration {
    chrono::Duration::minutes(m)
}

fn reaper(provider: &Arc<MockProvider>) -> StaleResourceReaper {
    StaleResourceReaper::new(
        provider.clone(),
        ReaperConfig {
            max_age: Duration::from_secs(60 * 60),
            ..ReaperConfig::default()
        },
    )
}

#[tokio::test]
async fn test_only_instances_past_max_age_are_deleted() {
    let now = Utc::now();
    let provider = Arc::new(MockProvider::new());
    provider.insert(1, "eph-a-1-1", now - minutes(30), &[RUNNER_TAG, "ephemeral"]);
    provider.insert(2, "eph-b-2-2", now - minutes(90), &[RUNNER_TAG, "ephemeral"]);
    provider.insert(3, "eph-c-3-3", now - minutes(10), &[RUNNER_TAG, "ephemeral"]);

    let report = reaper(&provider).sweep_at(now).await.unwrap();

    assert_eq!(report.listed, 3);
    assert_eq!(report.expired, 1);
    assert_eq!(report.deleted, vec![InstanceId(2)]);
    assert!(report.failed.is_empty());
    assert_eq!(provider.delete_attempts(), vec![InstanceId(2)]);
    assert_eq!(provider.instance_ids(), vec![InstanceId(1), InstanceId(3)]);
}

#[tokio::test]
async fn test_delete_failure_does_not_stop_the_sweep() {
    let now = Utc::now();
    let provider = Arc::new(MockProvider::new());
    provider.insert(1, "eph-a-1-1", now - minutes(90), &[RUNNER_TAG]);
    provider.insert(2, "eph-b-2-2", now - minutes(120), &[RUNNER_TAG]);
    provider.insert(3, "eph-c-3-3", now - minutes(10), &[RUNNER_TAG]);
    provider.insert(4, "eph-d-4-4", now - minutes(61), &[RUNNER_TAG]);
    provider.fail_delete(1);

    let report = reaper(&provider).sweep_at(now).await.unwrap();

    assert_eq!(report.expired, 3);
    assert_eq!(report.failed, vec![InstanceId(1)]);
    assert_eq!(report.deleted, vec![InstanceId(2), InstanceId(4)]);
    assert_eq!(
        provider.delete_attempts(),
        vec![InstanceId(1), InstanceId(2), InstanceId(4)]
    );
    assert_eq!(provider.instance_ids(), vec![InstanceId(1), InstanceId(3)]);
}

#[tokio::test]
async fn test_run_sweeps_on_interval_until_shutdown() {
    let provider = Arc::new(MockProvider::new());
    provider.insert(1, "eph-a-1-1", Utc::now() - minutes(120), &[RUNNER_TAG]);

    let reaper = StaleResourceReaper::new(
        provider.clone(),
        ReaperConfig {
            interval: Duration::from_millis(20),
            ..ReaperConfig::default()
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { reaper.run(shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(provider.instance_ids().is_empty());

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
}
