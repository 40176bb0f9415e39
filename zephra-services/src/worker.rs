//! Caching worker lifecycle manager.
//!
//! Registers the caching worker at startup, polls for a newer worker script
//! while the client is visible, flags an installed-but-waiting worker as an
//! available update, and asks the host to reload exactly once when a new
//! worker takes control. Cache statistics and invalidation are proxied to
//! the worker over its message channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use zephra_core::config::WorkerConfig;
use zephra_core::error::{ZephraError, ZephraResult};

use crate::event_bus::{AppEvent, EventBus};
use crate::ports::{CacheStats, WorkerHost, WorkerHostEvent, WorkerRegistration, WorkerReply, WorkerRequest};
use crate::service::{Service, ServiceState, StateCell};

/// Where and how often the worker is registered and polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub script_url: String,
    pub scope: String,
    pub poll_interval: Duration,
}

impl From<&WorkerConfig> for WorkerSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            script_url: config.script_url.clone(),
            scope: config.scope.clone(),
            poll_interval: Duration::from_secs(config.update_poll_secs.max(1)),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}

/// Snapshot for status displays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    pub supported: bool,
    pub registered: bool,
    pub scope: Option<String>,
    pub update_available: bool,
    pub controller: bool,
}

struct WorkerInner {
    state: StateCell,
    host: Arc<dyn WorkerHost>,
    settings: WorkerSettings,
    event_bus: EventBus,
    supported: AtomicBool,
    registration: Mutex<Option<WorkerRegistration>>,
    update_available: AtomicBool,
    reload_requested: AtomicBool,
    visible: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Manager owning the caching worker registration.
#[derive(Clone)]
pub struct ServiceWorkerService {
    inner: Arc<WorkerInner>,
}

impl ServiceWorkerService {
    pub fn new(host: Arc<dyn WorkerHost>, settings: WorkerSettings, event_bus: EventBus) -> Self {
        Self {
            inner: Arc::new(WorkerInner {
                state: StateCell::default(),
                host,
                settings,
                event_bus,
                supported: AtomicBool::new(true),
                registration: Mutex::new(None),
                update_available: AtomicBool::new(false),
                reload_requested: AtomicBool::new(false),
                visible: AtomicBool::new(true),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.inner.supported.load(Ordering::SeqCst)
    }

    pub fn is_registered(&self) -> bool {
        self.inner
            .registration
            .lock()
            .map(|r| r.is_some())
            .unwrap_or(false)
    }

    pub fn is_update_available(&self) -> bool {
        self.inner.update_available.load(Ordering::SeqCst)
    }

    /// Mirror page visibility. Update polling only runs while visible.
    pub fn set_visible(&self, visible: bool) {
        self.inner.visible.store(visible, Ordering::SeqCst);
        debug!("worker polling {}", if visible { "resumed" } else { "paused" });
    }

    /// Ask the host to re-fetch the worker script.
    ///
    /// Returns whether a new worker is installed and waiting to activate.
    pub async fn check_for_updates(&self) -> ZephraResult<bool> {
        if !self.is_supported() || !self.is_registered() {
            return Ok(false);
        }
        self.inner.host.update().await?;
        if self.inner.host.has_waiting() && self.inner.host.has_controller() {
            self.mark_update_available();
        }
        Ok(self.is_update_available())
    }

    /// Tell the waiting worker to activate now.
    ///
    /// Returns false when no worker is waiting. The reload request follows
    /// once the host reports the controller change.
    pub async fn apply_update(&self) -> ZephraResult<bool> {
        if !self.is_supported() || !self.inner.host.has_waiting() {
            return Ok(false);
        }
        info!("activating waiting worker");
        self.inner.host.skip_waiting().await?;
        Ok(true)
    }

    pub async fn get_cache_stats(&self) -> ZephraResult<CacheStats> {
        if !self.is_supported() || !self.is_registered() {
            return Ok(CacheStats::default());
        }
        match self.inner.host.post_message(WorkerRequest::GetCacheStats).await? {
            WorkerReply::CacheStats(stats) => Ok(stats),
            reply => Err(unexpected_reply(reply)),
        }
    }

    /// Delete one named cache, or all of them. Returns the deleted names.
    pub async fn clear_cache(&self, name: Option<&str>) -> ZephraResult<Vec<String>> {
        if !self.is_supported() || !self.is_registered() {
            return Ok(Vec::new());
        }
        let request = WorkerRequest::ClearCache {
            name: name.map(str::to_string),
        };
        match self.inner.host.post_message(request).await? {
            WorkerReply::Cleared { caches } => {
                info!("cleared caches: {}", caches.join(", "));
                self.inner.event_bus.emit(AppEvent::CacheCleared { caches: caches.clone() });
                Ok(caches)
            }
            reply => Err(unexpected_reply(reply)),
        }
    }

    /// Version reported by the controlling worker.
    pub async fn worker_version(&self) -> ZephraResult<Option<String>> {
        if !self.is_supported() || !self.is_registered() {
            return Ok(None);
        }
        match self.inner.host.post_message(WorkerRequest::GetVersion).await? {
            WorkerReply::Version { version } if version.is_empty() => Ok(None),
            WorkerReply::Version { version } => Ok(Some(version)),
            reply => Err(unexpected_reply(reply)),
        }
    }

    pub fn worker_status(&self) -> WorkerStatus {
        let scope = self
            .inner
            .registration
            .lock()
            .ok()
            .and_then(|r| r.as_ref().map(|r| r.scope.clone()));
        let supported = self.is_supported();
        WorkerStatus {
            supported,
            registered: scope.is_some(),
            scope,
            update_available: self.is_update_available(),
            controller: supported && self.inner.host.has_controller(),
        }
    }

    fn mark_update_available(&self) {
        if !self.inner.update_available.swap(true, Ordering::SeqCst) {
            info!("new worker installed and waiting");
            self.inner.event_bus.emit(AppEvent::WorkerUpdateAvailable);
        }
    }

    fn on_host_event(&self, event: WorkerHostEvent) {
        match event {
            WorkerHostEvent::Installed { waiting: true } => {
                if self.inner.host.has_controller() {
                    self.mark_update_available();
                }
            }
            WorkerHostEvent::Installed { waiting: false } => {
                debug!("worker installed and active");
            }
            WorkerHostEvent::ControllerChanged => {
                self.inner.update_available.store(false, Ordering::SeqCst);
                self.inner.event_bus.emit(AppEvent::WorkerActivated);
                if !self.inner.reload_requested.swap(true, Ordering::SeqCst) {
                    info!("worker controller changed, requesting reload");
                    self.inner.event_bus.emit(AppEvent::ReloadRequested);
                }
            }
        }
    }

    fn spawn_host_listener(&self) -> JoinHandle<()> {
        let mut events = self.inner.host.subscribe();
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => this.on_host_event(event),
                    Err(RecvError::Lagged(n)) => warn!("worker listener lagged by {n} events"),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn spawn_update_poller(&self) -> JoinHandle<()> {
        let this = self.clone();
        let period = self.inner.settings.poll_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !this.inner.visible.load(Ordering::SeqCst) {
                    continue;
                }
                if let Err(e) = this.check_for_updates().await {
                    warn!("worker update check failed: {e}");
                }
            }
        })
    }

    fn track(&self, handle: JoinHandle<()>) {
        if let Ok(mut tasks) = self.inner.tasks.lock() {
            tasks.push(handle);
        }
    }

    fn abort_tasks(&self) {
        if let Ok(mut tasks) = self.inner.tasks.lock() {
            for handle in tasks.drain(..) {
                handle.abort();
            }
        }
    }
}

fn unexpected_reply(reply: WorkerReply) -> ZephraError {
    match reply {
        WorkerReply::Error { message } => ZephraError::Worker(message),
        other => ZephraError::Worker(format!("unexpected worker reply: {other:?}")),
    }
}

#[async_trait]
impl Service for ServiceWorkerService {
    fn name(&self) -> &str {
        "service_worker"
    }

    fn state(&self) -> ServiceState {
        self.inner.state.get()
    }

    async fn init(&self) -> ZephraResult<()> {
        self.inner.state.set(ServiceState::Initializing);

        if !self.inner.host.is_supported() {
            warn!("caching worker not supported on this host, running without it");
            self.inner.supported.store(false, Ordering::SeqCst);
            self.inner.state.set(ServiceState::Running);
            return Ok(());
        }

        // Subscribe before registering so the first install is not missed.
        let listener = self.spawn_host_listener();
        let settings = &self.inner.settings;
        let registration = match self.inner.host.register(&settings.script_url, &settings.scope).await {
            Ok(registration) => registration,
            Err(e) => {
                listener.abort();
                self.inner.state.set(ServiceState::Failed);
                return Err(ZephraError::ServiceInit(format!("worker registration failed: {e}")));
            }
        };
        self.track(listener);

        info!("caching worker registered at scope {}", registration.scope);
        let scope = registration.scope.clone();
        if let Ok(mut slot) = self.inner.registration.lock() {
            *slot = Some(registration);
        }
        self.inner.event_bus.emit(AppEvent::WorkerRegistered { scope });

        if self.inner.host.has_waiting() && self.inner.host.has_controller() {
            self.mark_update_available();
        }

        let poller = self.spawn_update_poller();
        self.track(poller);

        self.inner.state.set(ServiceState::Running);
        Ok(())
    }

    async fn shutdown(&self) -> ZephraResult<()> {
        self.inner.state.set(ServiceState::ShuttingDown);
        self.abort_tasks();
        self.inner.state.set(ServiceState::Stopped);
        info!("worker service shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_worker::LocalWorker;

    async fn next_matching(
        rx: &mut tokio::sync::broadcast::Receiver<AppEvent>,
        wanted: &AppEvent,
    ) -> bool {
        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(event) if &event == wanted => return true,
                    Ok(_) => continue,
                    Err(_) => return false,
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(2), wait).await.unwrap_or(false)
    }

    #[tokio::test]
    async fn test_update_then_single_reload() {
        let dir = tempfile::TempDir::new().unwrap();
        let host = Arc::new(LocalWorker::spawn(dir.path().join("worker"), "1.0.0"));
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();
        let service = ServiceWorkerService::new(host.clone(), WorkerSettings::default(), bus);

        service.init().await.unwrap();
        assert!(service.is_registered());
        assert!(next_matching(&mut rx, &AppEvent::WorkerRegistered { scope: "/".into() }).await);
        assert!(!service.check_for_updates().await.unwrap());

        host.publish("1.1.0").unwrap();
        assert!(service.check_for_updates().await.unwrap());
        assert!(next_matching(&mut rx, &AppEvent::WorkerUpdateAvailable).await);

        assert!(service.apply_update().await.unwrap());
        assert!(next_matching(&mut rx, &AppEvent::ReloadRequested).await);
        assert!(!service.apply_update().await.unwrap());

        host.publish("1.2.0").unwrap();
        service.check_for_updates().await.unwrap();
        service.apply_update().await.unwrap();
        assert!(next_matching(&mut rx, &AppEvent::WorkerActivated).await);
        // A second activation does not ask for another reload.
        assert!(!next_matching(&mut rx, &AppEvent::ReloadRequested).await);

        service.shutdown().await.unwrap();
        assert_eq!(service.state(), ServiceState::Stopped);
    }

    #[tokio::test]
    async fn test_cache_operations_through_worker() {
        let dir = tempfile::TempDir::new().unwrap();
        let host = Arc::new(LocalWorker::spawn(dir.path().join("worker"), "1.0.0"));
        let service = ServiceWorkerService::new(host.clone(), WorkerSettings::default(), EventBus::new(16));
        service.init().await.unwrap();

        host.post_message(WorkerRequest::Store {
            cache: "zephra-api".into(),
            key: "dashboard".into(),
            body: b"{\"success\":true}".to_vec(),
        })
        .await
        .unwrap();

        let stats = service.get_cache_stats().await.unwrap();
        assert_eq!(stats.total_entries, 1);

        let err = service.clear_cache(Some("missing-cache")).await.unwrap_err();
        assert!(matches!(err, ZephraError::Worker(_)));

        let cleared = service.clear_cache(None).await.unwrap();
        assert_eq!(cleared.len(), 4);
        assert_eq!(service.get_cache_stats().await.unwrap(), CacheStats::default());
        assert_eq!(service.worker_version().await.unwrap().as_deref(), Some("1.0.0"));

        let status = service.worker_status();
        assert!(status.registered && status.controller);
        assert_eq!(status.scope.as_deref(), Some("/"));
    }
}
