//! App update manager integration tests.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use zephra_api::VersionCheckResponse;
use zephra_core::error::ZephraError;
use zephra_models::{AppVersion, KeyValueStore, MemoryStore};
use zephra_services::event_bus::{AppEvent, EventBus};
use zephra_services::ports::WorkerHost;
use zephra_services::service::Service;
use zephra_services::{AppUpdateService, LocalWorker, UpdateSettings};

use common::{available, drain_events, wait_for, MockVersionSource, StuckWorkerHost, UnsupportedWorkerHost};

fn settings() -> UpdateSettings {
    UpdateSettings {
        current_version: "1.0.0".into(),
        build_number: "100".into(),
        ..UpdateSettings::default()
    }
}

fn build(source: &Arc<MockVersionSource>, host: Arc<dyn WorkerHost>, bus: &EventBus) -> (AppUpdateService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let service = AppUpdateService::new(store.clone(), source.clone(), host, settings(), bus.clone());
    (service, store)
}

#[tokio::test]
async fn reported_newer_version_becomes_available() {
    let source = Arc::new(MockVersionSource::offering("2.0.0"));
    let bus = common::create_test_event_bus();
    let mut rx = bus.subscribe();
    let (updates, _store) = build(&source, Arc::new(UnsupportedWorkerHost), &bus);

    let info = updates.check_for_updates().await.unwrap().expect("update info");
    assert_eq!(info.available_version(), "2.0.0");
    assert_eq!(info.current_version, "1.0.0");

    let status = updates.get_update_status();
    assert!(status.update_available);
    assert_eq!(status.available_version.as_deref(), Some("2.0.0"));
    assert!(status.last_checked.is_some());

    let request = source.requests.lock().unwrap()[0].clone();
    assert_eq!(request.current_version, "1.0.0");
    assert_eq!(request.build_number, "100");
    assert!(request.user_agent.starts_with("zephra/"));
    assert!(!request.platform.is_empty());

    // Repeated checks for the same version announce it only once.
    updates.check_for_updates().await.unwrap();
    let announced = drain_events(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, AppEvent::AppUpdateAvailable { .. }))
        .count();
    assert_eq!(announced, 1);
}

#[tokio::test]
async fn stale_or_older_versions_are_ignored() {
    let source = Arc::new(MockVersionSource::offering("2.0.0"));
    let bus = EventBus::new(32);
    let (updates, _store) = build(&source, Arc::new(UnsupportedWorkerHost), &bus);
    updates.check_for_updates().await.unwrap();
    assert!(updates.get_update_status().update_available);

    source.set_response(VersionCheckResponse::default());
    assert!(updates.check_for_updates().await.unwrap().is_none());
    assert!(!updates.get_update_status().update_available);

    // Reported available but not newer.
    source.set_response(available("1.0"));
    assert!(updates.check_for_updates().await.unwrap().is_none());
    source.set_response(available("0.9.9"));
    assert!(updates.check_for_updates().await.unwrap().is_none());
    assert_eq!(updates.get_update_status().available_version, None);
}

#[tokio::test]
async fn failed_check_leaves_status_untouched() {
    let source = Arc::new(MockVersionSource::new());
    source.push_error(ZephraError::Timeout("version check".into()));
    let bus = EventBus::new(32);
    let (updates, _store) = build(&source, Arc::new(UnsupportedWorkerHost), &bus);

    assert!(updates.check_for_updates().await.is_err());
    let status = updates.get_update_status();
    assert!(!status.update_available);
    assert!(status.last_checked.is_none());
}

#[tokio::test]
async fn install_records_version_and_history() {
    let source = Arc::new(MockVersionSource::offering("2.0.0"));
    let bus = common::create_test_event_bus();
    let mut rx = bus.subscribe();
    let (updates, store) = build(&source, Arc::new(UnsupportedWorkerHost), &bus);

    assert!(!updates.install_update().await.unwrap(), "nothing to install yet");

    updates.check_for_updates().await.unwrap();
    assert!(updates.install_update().await.unwrap());

    assert_eq!(updates.current_version(), "2.0.0");
    let history = updates.version_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].version, "2.0.0");
    assert_eq!(history[0].previous_version.as_deref(), Some("1.0.0"));
    assert!(!updates.get_update_status().update_available);

    let stored: AppVersion =
        serde_json::from_str(&store.get("zephra-app-version").unwrap().unwrap()).unwrap();
    assert_eq!(stored.version, "2.0.0");

    let installed = wait_for(&mut rx, Duration::from_secs(1), |e| matches!(e, AppEvent::AppUpdateInstalled { .. })).await;
    assert_eq!(
        installed,
        Some(AppEvent::AppUpdateInstalled { version: "2.0.0".into(), previous_version: "1.0.0".into() })
    );

    // The installed version is now current, so the same offer is not newer.
    assert!(updates.check_for_updates().await.unwrap().is_none());
}

#[tokio::test]
async fn version_history_is_bounded() {
    let source = Arc::new(MockVersionSource::new());
    let bus = EventBus::new(256);
    let (updates, _store) = build(&source, Arc::new(UnsupportedWorkerHost), &bus);

    for minor in 1..=12 {
        source.set_response(available(&format!("1.{minor}.0")));
        updates.check_for_updates().await.unwrap().expect("newer version");
        assert!(updates.install_update().await.unwrap());
    }

    let history = updates.version_history();
    assert_eq!(history.len(), 10);
    assert_eq!(history.first().unwrap().version, "1.3.0");
    assert_eq!(history.last().unwrap().version, "1.12.0");
    assert_eq!(history.last().unwrap().previous_version.as_deref(), Some("1.11.0"));
}

#[tokio::test(start_paused = true)]
async fn concurrent_install_is_rejected_and_timeout_unblocks() {
    let source = Arc::new(MockVersionSource::offering("2.0.0"));
    let host = Arc::new(StuckWorkerHost::new());
    let bus = EventBus::new(32);
    let (updates, _store) = build(&source, host.clone(), &bus);
    updates.check_for_updates().await.unwrap();

    let first = tokio::spawn({
        let updates = updates.clone();
        async move { updates.install_update().await }
    });
    while !updates.get_update_status().installing {
        tokio::task::yield_now().await;
    }

    assert!(!updates.install_update().await.unwrap());
    assert!(first.await.unwrap().unwrap(), "timeout fallback should complete the install");
    assert_eq!(host.skip_waiting_calls.load(Ordering::SeqCst), 1);
    assert_eq!(updates.current_version(), "2.0.0");
    assert!(!updates.get_update_status().installing);
}

#[tokio::test]
async fn install_activates_waiting_worker() {
    let dir = tempfile::TempDir::new().unwrap();
    let worker = Arc::new(LocalWorker::spawn(dir.path().join("worker"), "1.0.0"));
    worker.register("/sw.js", "/").await.unwrap();
    worker.publish("2.0.0").unwrap();
    worker.update().await.unwrap();
    assert!(worker.has_waiting());

    let source = Arc::new(MockVersionSource::offering("2.0.0"));
    let bus = EventBus::new(32);
    let (updates, _store) = build(&source, worker.clone(), &bus);
    updates.check_for_updates().await.unwrap();

    let started = tokio::time::Instant::now();
    assert!(updates.install_update().await.unwrap());
    assert!(started.elapsed() < Duration::from_secs(5), "controller change should end the wait");
    assert!(!worker.has_waiting());
    assert_eq!(worker.active_version().as_deref(), Some("2.0.0"));
}

#[tokio::test]
async fn postpone_and_startup_check() {
    let source = Arc::new(MockVersionSource::offering("3.1.0"));
    let bus = common::create_test_event_bus();
    let mut rx = bus.subscribe();
    let (updates, _store) = build(&source, Arc::new(UnsupportedWorkerHost), &bus);

    updates.init().await.unwrap();
    let event = wait_for(&mut rx, Duration::from_secs(2), |e| matches!(e, AppEvent::AppUpdateAvailable { .. })).await;
    assert_eq!(
        event,
        Some(AppEvent::AppUpdateAvailable {
            current_version: "1.0.0".into(),
            available_version: "3.1.0".into(),
            critical: false,
        })
    );

    updates.postpone_update();
    assert!(!updates.get_update_status().update_available);
    assert!(!updates.install_update().await.unwrap());
    updates.shutdown().await.unwrap();
}
