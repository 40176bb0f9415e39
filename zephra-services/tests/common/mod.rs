//! Shared test utilities for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::broadcast;

use zephra_api::{ErrorReport, VersionCheckRequest, VersionCheckResponse};
use zephra_core::config::{AppConfig, ConfigHandle};
use zephra_core::error::{ZephraError, ZephraResult};
use zephra_models::{
    AppVersion, KeyValueStore, MemoryStore, NotificationPayload, PermissionState, PushKeys, PushSubscriptionData,
    SyncQueueItem,
};
use zephra_services::event_bus::{AppEvent, EventBus};
use zephra_services::ports::{
    ErrorReporter, LocationProvider, NotificationSink, Position, PushPlatform, PushRegistry, SyncTransport,
    VersionSource, WorkerHost, WorkerHostEvent, WorkerRegistration, WorkerReply, WorkerRequest,
};
use zephra_services::{LocalWorker, NetworkMonitor, ServiceDeps};

/// Valid VAPID-style public key used by push tests.
pub const TEST_VAPID_KEY: &str =
    "BEl62iUYgUivxIkv69yViEuiBIa-Ib9-SkvMeAtA3LFgDzkrxZJjSgSnfckjBJuBkr3qBUYIHBQFLXYp5Nksh8U";

/// Create an EventBus with a small buffer suitable for tests.
pub fn create_test_event_bus() -> EventBus {
    EventBus::new(128)
}

/// Create a default test configuration with push configured.
pub fn create_test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.push.vapid_public_key = TEST_VAPID_KEY.to_string();
    config.updates.current_version = "1.0.0".to_string();
    config
}

pub fn create_test_config_handle() -> ConfigHandle {
    ConfigHandle::new(create_test_config())
}

/// A syntactically valid push subscription.
pub fn test_subscription(endpoint: &str) -> PushSubscriptionData {
    PushSubscriptionData {
        endpoint: endpoint.to_string(),
        keys: PushKeys {
            p256dh: "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM"
                .to_string(),
            auth: "tBHItJI5svbpez7KI4CCXg".to_string(),
        },
    }
}

/// Wait until an event matching `pred` arrives, or `timeout` elapses.
pub async fn wait_for<F>(rx: &mut broadcast::Receiver<AppEvent>, timeout: Duration, pred: F) -> Option<AppEvent>
where
    F: Fn(&AppEvent) -> bool,
{
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    };
    tokio::time::timeout(timeout, wait).await.ok().flatten()
}

/// Drain every event already buffered on `rx`.
pub fn drain_events(rx: &mut broadcast::Receiver<AppEvent>) -> Vec<AppEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ---- Sync transport ----

/// Records deliveries; fails the first `failures` attempts, or every
/// attempt while `fail_always` is set.
#[derive(Default)]
pub struct MockTransport {
    failures: AtomicUsize,
    fail_always: AtomicBool,
    attempts: AtomicUsize,
    delivered: Mutex<Vec<SyncQueueItem>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(failures: usize) -> Self {
        let transport = Self::default();
        transport.failures.store(failures, Ordering::SeqCst);
        transport
    }

    pub fn always_failing() -> Self {
        let transport = Self::default();
        transport.fail_always.store(true, Ordering::SeqCst);
        transport
    }

    pub fn set_fail_always(&self, fail: bool) {
        self.fail_always.store(fail, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<SyncQueueItem> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncTransport for MockTransport {
    async fn deliver(&self, item: &SyncQueueItem) -> ZephraResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_always.load(Ordering::SeqCst) {
            return Err(ZephraError::ServerError { status: 503, message: "unavailable".into() });
        }
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ZephraError::Http("connection reset".into()));
        }
        self.delivered.lock().unwrap().push(item.clone());
        Ok(())
    }
}

// ---- Storage ----

/// Store whose writes always fail.
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> ZephraResult<Option<String>> {
        Ok(None)
    }

    fn set(&self, key: &str, _value: &str) -> ZephraResult<()> {
        Err(ZephraError::Storage(format!("quota exceeded writing {key}")))
    }

    fn remove(&self, key: &str) -> ZephraResult<bool> {
        Err(ZephraError::Storage(format!("cannot remove {key}")))
    }

    fn keys(&self) -> ZephraResult<Vec<String>> {
        Ok(Vec::new())
    }
}

// ---- Worker host ----

/// Host without caching worker support.
pub struct UnsupportedWorkerHost;

#[async_trait]
impl WorkerHost for UnsupportedWorkerHost {
    fn is_supported(&self) -> bool {
        false
    }

    async fn register(&self, _script_url: &str, _scope: &str) -> ZephraResult<WorkerRegistration> {
        Err(ZephraError::Unsupported("service worker".into()))
    }

    async fn update(&self) -> ZephraResult<()> {
        Err(ZephraError::Unsupported("service worker".into()))
    }

    fn has_waiting(&self) -> bool {
        false
    }

    fn has_controller(&self) -> bool {
        false
    }

    async fn skip_waiting(&self) -> ZephraResult<()> {
        Ok(())
    }

    async fn post_message(&self, _request: WorkerRequest) -> ZephraResult<WorkerReply> {
        Err(ZephraError::Unsupported("service worker".into()))
    }

    fn subscribe(&self) -> broadcast::Receiver<WorkerHostEvent> {
        let (_tx, rx) = broadcast::channel(1);
        rx
    }
}

/// Host whose worker waits forever: `skip_waiting` never produces a
/// controller change.
pub struct StuckWorkerHost {
    events: broadcast::Sender<WorkerHostEvent>,
    pub skip_waiting_calls: AtomicUsize,
}

impl StuckWorkerHost {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(4);
        Self { events, skip_waiting_calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl WorkerHost for StuckWorkerHost {
    fn is_supported(&self) -> bool {
        true
    }

    async fn register(&self, script_url: &str, scope: &str) -> ZephraResult<WorkerRegistration> {
        Ok(WorkerRegistration {
            script_url: script_url.into(),
            scope: scope.into(),
            active_version: Some("1.0.0".into()),
        })
    }

    async fn update(&self) -> ZephraResult<()> {
        Ok(())
    }

    fn has_waiting(&self) -> bool {
        true
    }

    fn has_controller(&self) -> bool {
        true
    }

    async fn skip_waiting(&self) -> ZephraResult<()> {
        self.skip_waiting_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn post_message(&self, _request: WorkerRequest) -> ZephraResult<WorkerReply> {
        Ok(WorkerReply::Error { message: "busy".into() })
    }

    fn subscribe(&self) -> broadcast::Receiver<WorkerHostEvent> {
        self.events.subscribe()
    }
}

// ---- Push ----

pub struct MockPushPlatform {
    supported: bool,
    permission: Mutex<PermissionState>,
    /// Answer given when the user is prompted.
    decision: PermissionState,
    subscription: Mutex<Option<PushSubscriptionData>>,
    pub prompts: AtomicUsize,
    pub subscribe_calls: AtomicUsize,
    pub fail_unsubscribe: AtomicBool,
}

impl MockPushPlatform {
    pub fn new(decision: PermissionState) -> Self {
        Self {
            supported: true,
            permission: Mutex::new(PermissionState::Default),
            decision,
            subscription: Mutex::new(None),
            prompts: AtomicUsize::new(0),
            subscribe_calls: AtomicUsize::new(0),
            fail_unsubscribe: AtomicBool::new(false),
        }
    }

    pub fn unsupported() -> Self {
        Self { supported: false, ..Self::new(PermissionState::Denied) }
    }

    pub fn granted() -> Self {
        let platform = Self::new(PermissionState::Granted);
        *platform.permission.lock().unwrap() = PermissionState::Granted;
        platform
    }

    pub fn has_subscription(&self) -> bool {
        self.subscription.lock().unwrap().is_some()
    }
}

#[async_trait]
impl PushPlatform for MockPushPlatform {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn permission(&self) -> PermissionState {
        *self.permission.lock().unwrap()
    }

    async fn request_permission(&self) -> ZephraResult<PermissionState> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        *self.permission.lock().unwrap() = self.decision;
        Ok(self.decision)
    }

    async fn subscribe(&self, _application_server_key: &str) -> ZephraResult<PushSubscriptionData> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let sub = test_subscription("https://push.example.com/send/device-1");
        *self.subscription.lock().unwrap() = Some(sub.clone());
        Ok(sub)
    }

    async fn current_subscription(&self) -> ZephraResult<Option<PushSubscriptionData>> {
        Ok(self.subscription.lock().unwrap().clone())
    }

    async fn unsubscribe(&self) -> ZephraResult<bool> {
        if self.fail_unsubscribe.load(Ordering::SeqCst) {
            return Err(ZephraError::Push("push service unreachable".into()));
        }
        Ok(self.subscription.lock().unwrap().take().is_some())
    }
}

#[derive(Default)]
pub struct MockPushRegistry {
    pub registered: Mutex<Vec<PushSubscriptionData>>,
    pub unregistered: Mutex<Vec<String>>,
    pub fail_unregister: AtomicBool,
}

#[async_trait]
impl PushRegistry for MockPushRegistry {
    async fn register(&self, subscription: &PushSubscriptionData) -> ZephraResult<()> {
        self.registered.lock().unwrap().push(subscription.clone());
        Ok(())
    }

    async fn unregister(&self, endpoint: &str) -> ZephraResult<()> {
        if self.fail_unregister.load(Ordering::SeqCst) {
            return Err(ZephraError::ServerError { status: 500, message: "boom".into() });
        }
        self.unregistered.lock().unwrap().push(endpoint.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockNotificationSink {
    pub shown: Mutex<Vec<NotificationPayload>>,
}

impl MockNotificationSink {
    pub fn shown(&self) -> Vec<NotificationPayload> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for MockNotificationSink {
    async fn show(&self, payload: &NotificationPayload) -> ZephraResult<()> {
        self.shown.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

// ---- Versions, errors, location ----

/// Answers version checks from a script, repeating the last response.
#[derive(Default)]
pub struct MockVersionSource {
    responses: Mutex<VecDeque<ZephraResult<VersionCheckResponse>>>,
    pub requests: Mutex<Vec<VersionCheckRequest>>,
}

impl MockVersionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every check reports `version` as available.
    pub fn offering(version: &str) -> Self {
        let source = Self::new();
        source.set_response(available(version));
        source
    }

    /// Answer every following check with `response`.
    pub fn set_response(&self, response: VersionCheckResponse) {
        let mut responses = self.responses.lock().unwrap();
        responses.clear();
        responses.push_back(Ok(response));
    }

    /// Append to the script; the last entry repeats.
    pub fn push_response(&self, response: VersionCheckResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_error(&self, error: ZephraError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

/// A response offering `version`.
pub fn available(version: &str) -> VersionCheckResponse {
    VersionCheckResponse {
        update_available: true,
        version: Some(AppVersion::new(version)),
    }
}

#[async_trait]
impl VersionSource for MockVersionSource {
    async fn check_version(&self, request: &VersionCheckRequest) -> ZephraResult<VersionCheckResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            return responses.pop_front().unwrap_or_else(|| Ok(VersionCheckResponse::default()));
        }
        match responses.front() {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(e)) => Err(ZephraError::Internal(e.to_string())),
            None => Ok(VersionCheckResponse::default()),
        }
    }
}

#[derive(Default)]
pub struct MockErrorReporter {
    pub reports: Mutex<Vec<ErrorReport>>,
}

impl MockErrorReporter {
    pub fn reports(&self) -> Vec<ErrorReport> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl ErrorReporter for MockErrorReporter {
    async fn report(&self, report: &ErrorReport) -> ZephraResult<()> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

pub struct MockLocationProvider {
    pub position: Position,
    pub delay: Duration,
}

#[async_trait]
impl LocationProvider for MockLocationProvider {
    async fn current_position(&self) -> ZephraResult<Position> {
        tokio::time::sleep(self.delay).await;
        Ok(self.position.clone())
    }
}

// ---- Manager harness ----

/// Every port as a mock, with a real local worker in a temp directory.
pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<MemoryStore>,
    pub transport: Arc<MockTransport>,
    pub worker: Arc<LocalWorker>,
    pub push_platform: Arc<MockPushPlatform>,
    pub push_registry: Arc<MockPushRegistry>,
    pub notifier: Arc<MockNotificationSink>,
    pub version_source: Arc<MockVersionSource>,
    pub reporter: Arc<MockErrorReporter>,
    pub network: NetworkMonitor,
}

impl Harness {
    /// Must be called inside a tokio runtime.
    pub fn new(online: bool) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let worker = Arc::new(LocalWorker::spawn(dir.path().join("worker"), "1.0.0"));
        Self {
            dir,
            store: Arc::new(MemoryStore::new()),
            transport: Arc::new(MockTransport::new()),
            worker,
            push_platform: Arc::new(MockPushPlatform::new(PermissionState::Granted)),
            push_registry: Arc::new(MockPushRegistry::default()),
            notifier: Arc::new(MockNotificationSink::default()),
            version_source: Arc::new(MockVersionSource::new()),
            reporter: Arc::new(MockErrorReporter::default()),
            network: NetworkMonitor::new(online),
        }
    }

    pub fn deps(&self) -> ServiceDeps {
        ServiceDeps {
            store: self.store.clone(),
            transport: self.transport.clone(),
            worker_host: self.worker.clone(),
            push_platform: self.push_platform.clone(),
            push_registry: self.push_registry.clone(),
            notifier: self.notifier.clone(),
            version_source: self.version_source.clone(),
            error_reporter: self.reporter.clone(),
            network: self.network.clone(),
        }
    }
}
