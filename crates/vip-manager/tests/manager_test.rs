//! End-to-end tests for VipManager with an in-memory leader store

mod support;

use leader::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use support::{FakeBackend, eventually};
use tokio_util::sync::CancellationToken;
use vip_manager::{ManagerConfig, VipConfig, VipManager};

const SETTLE: Duration = Duration::from_secs(2);

fn vip() -> Arc<VipConfig> {
    Arc::new(VipConfig {
        address: "10.0.0.10".parse().unwrap(),
        prefix_len: 24,
        interface: "lo".to_string(),
        node_name: "node1".to_string(),
        key: "service/pg/leader".to_string(),
    })
}

fn settings() -> ManagerConfig {
    ManagerConfig {
        recheck_interval: Duration::from_millis(100),
        retry_delay: Duration::from_millis(20),
        state_channel_size: 1,
    }
}

#[tokio::test]
async fn test_vip_follows_leader_marker() {
    let store = Arc::new(MemoryStore::new().with_wait_time(Duration::from_millis(50)));
    let backend = Arc::new(FakeBackend::new());
    store.set("node2");

    let manager = VipManager::with_parts(vip(), settings(), store.clone(), backend.clone());
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(manager.run(cancel.clone()));

    // Another node leads: address stays away
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!backend.is_present());

    store.set("node1");
    assert!(eventually(SETTLE, || backend.is_present()).await);
    assert_eq!(backend.configures(), 1);

    store.set("node2");
    assert!(eventually(SETTLE, || !backend.is_present()).await);
    assert_eq!(backend.deconfigures(), 1);

    cancel.cancel();
    let stats = tokio::time::timeout(SETTLE, handle)
        .await
        .expect("Manager did not stop")
        .expect("Manager task panicked");

    assert_eq!(stats.configures, 1);
    assert_eq!(stats.deconfigures, 2, "One follow-the-leader release plus the final release");
}

#[tokio::test]
async fn test_missing_marker_keeps_last_state() {
    let store = Arc::new(MemoryStore::new().with_wait_time(Duration::from_millis(50)));
    let backend = Arc::new(FakeBackend::new());
    store.set("node1");

    let manager = VipManager::with_parts(vip(), settings(), store.clone(), backend.clone());
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(manager.run(cancel.clone()));

    assert!(eventually(SETTLE, || backend.is_present()).await);

    // Marker disappears: no transition, the address stays
    store.clear();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(backend.is_present());
    assert_eq!(backend.deconfigures(), 0);

    cancel.cancel();
    tokio::time::timeout(SETTLE, handle).await.unwrap().unwrap();
    assert!(!backend.is_present(), "Shutdown releases the address");
}

#[tokio::test]
async fn test_store_outage_keeps_last_state() {
    let store = Arc::new(MemoryStore::new().with_wait_time(Duration::from_millis(50)));
    let backend = Arc::new(FakeBackend::new());
    store.set("node1");

    let manager = VipManager::with_parts(vip(), settings(), store.clone(), backend.clone());
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(manager.run(cancel.clone()));

    assert!(eventually(SETTLE, || backend.is_present()).await);

    store.fail_next(5);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(backend.is_present());

    // Store comes back with a new leader
    store.set("node2");
    assert!(eventually(SETTLE, || !backend.is_present()).await);

    cancel.cancel();
    tokio::time::timeout(SETTLE, handle).await.unwrap().unwrap();
}
