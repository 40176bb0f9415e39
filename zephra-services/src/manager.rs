//! Service manager: the single entry point the UI talks to.
//!
//! Builds the four managers from their ports, registers them for lifecycle
//! handling, bridges events between them, and turns domain-level intents
//! (a new AQI reading, a location change, an analytics event) into queue
//! items and notifications without the caller knowing which manager owns
//! what.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use zephra_api::{ApiClient, ErrorReport, RetryConfig};
use zephra_core::config::{AppConfig, ConfigHandle};
use zephra_core::constants::{self, storage_keys};
use zephra_core::error::{ZephraError, ZephraResult};
use zephra_core::platform::Platform;
use zephra_models::models::alert::threshold_for;
use zephra_models::store::{load_json_or_default, save_json};
use zephra_models::{
    AlertSetting, HealthProfile, KeyValueStore, PermissionState, SyncPriority, SyncType, UpdateInfo,
    UserPreferences,
};

use crate::event_bus::{AppEvent, EventBus};
use crate::local_worker::LocalWorker;
use crate::network::NetworkMonitor;
use crate::notification::{DesktopNotifier, DesktopPushPlatform};
use crate::ports::{
    CacheStats, ErrorReporter, LocationProvider, NotificationSink, PushPlatform, PushRegistry, SyncTransport,
    VersionSource, WorkerHost,
};
use crate::push::{PushService, PushStatus};
use crate::queue_store::QueueStore;
use crate::registry::{InitReport, ServiceHealth, ServiceRegistry};
use crate::sync::{BackgroundSyncService, QueueOptions, QueueStatus, SyncPolicy};
use crate::update::{AppUpdateService, UpdateSettings, UpdateStatus};
use crate::worker::{ServiceWorkerService, WorkerSettings, WorkerStatus};

/// Everything the managers need from the outside world.
pub struct ServiceDeps {
    pub store: Arc<dyn KeyValueStore>,
    pub transport: Arc<dyn SyncTransport>,
    pub worker_host: Arc<dyn WorkerHost>,
    pub push_platform: Arc<dyn PushPlatform>,
    pub push_registry: Arc<dyn PushRegistry>,
    pub notifier: Arc<dyn NotificationSink>,
    pub version_source: Arc<dyn VersionSource>,
    pub error_reporter: Arc<dyn ErrorReporter>,
    pub network: NetworkMonitor,
}

impl ServiceDeps {
    /// Desktop wiring: the API client for every backend port (without its
    /// own retries for queue deliveries), a local caching worker and OS
    /// notifications. Must run inside a tokio runtime.
    pub fn desktop(config: &AppConfig, store: Arc<dyn KeyValueStore>, api: ApiClient) -> ZephraResult<Self> {
        let transport = Arc::new(sync_transport_client(&api));
        let api = Arc::new(api);
        let worker = LocalWorker::spawn(config.effective_cache_dir()?, &config.updates.current_version);
        Ok(Self {
            store,
            transport,
            worker_host: Arc::new(worker),
            push_platform: Arc::new(DesktopPushPlatform::new()),
            push_registry: api.clone(),
            notifier: Arc::new(DesktopNotifier::new()),
            version_source: api.clone(),
            error_reporter: api,
            network: NetworkMonitor::default(),
        })
    }
}

/// Queue deliveries go through the sync manager's backoff, so the client
/// used for them does not retry on its own.
fn sync_transport_client(api: &ApiClient) -> ApiClient {
    api.clone().with_retry_config(RetryConfig::none())
}

/// A fresh AQI reading for one location.
#[derive(Debug, Clone, PartialEq)]
pub struct AirQualityUpdate {
    pub location: String,
    pub aqi: f64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl AirQualityUpdate {
    pub fn new(location: impl Into<String>, aqi: f64) -> Self {
        Self {
            location: location.into(),
            aqi,
            lat: None,
            lon: None,
        }
    }
}

/// What [`ServiceManager::handle_air_quality_update`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AirQualityOutcome {
    /// Queue id when the reading was deferred for later sync.
    pub queued_id: Option<String>,
    pub notified: bool,
}

/// Consolidated snapshot of every manager.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub online: bool,
    pub sync: QueueStatus,
    pub worker: WorkerStatus,
    pub push: PushStatus,
    pub updates: UpdateStatus,
    pub services: Vec<ServiceHealth>,
}

/// Façade over the sync, worker, push and update managers.
pub struct ServiceManager {
    config: ConfigHandle,
    event_bus: EventBus,
    network: NetworkMonitor,
    store: Arc<dyn KeyValueStore>,
    error_reporter: Arc<dyn ErrorReporter>,
    sync: BackgroundSyncService,
    worker: ServiceWorkerService,
    push: PushService,
    updates: AppUpdateService,
    registry: ServiceRegistry,
    bridge: Mutex<Option<JoinHandle<()>>>,
}

impl ServiceManager {
    pub async fn new(config: ConfigHandle, deps: ServiceDeps) -> Self {
        let snapshot = config.snapshot().await;
        let event_bus = EventBus::default();

        let worker = ServiceWorkerService::new(
            deps.worker_host.clone(),
            WorkerSettings::from(&snapshot.worker),
            event_bus.clone(),
        );
        let sync = BackgroundSyncService::new(
            QueueStore::new(deps.store.clone()),
            deps.transport,
            deps.network.clone(),
            event_bus.clone(),
            SyncPolicy::from(&snapshot.sync),
        );
        let push = PushService::new(
            deps.push_platform,
            deps.push_registry,
            deps.notifier,
            snapshot.push.vapid_public_key.clone(),
            event_bus.clone(),
        );
        let updates = AppUpdateService::new(
            deps.store.clone(),
            deps.version_source,
            deps.worker_host,
            UpdateSettings::from(&snapshot.updates),
            event_bus.clone(),
        );

        let mut registry = ServiceRegistry::new();
        registry.register(Arc::new(worker.clone()));
        registry.register(Arc::new(sync.clone()));
        registry.register(Arc::new(push.clone()));
        registry.register(Arc::new(updates.clone()));

        Self {
            config,
            event_bus,
            network: deps.network,
            store: deps.store,
            error_reporter: deps.error_reporter,
            sync,
            worker,
            push,
            updates,
            registry,
            bridge: Mutex::new(None),
        }
    }

    /// Wire cross-manager events, then start every manager concurrently.
    ///
    /// One manager failing never keeps the others from starting; failures
    /// are reported as `ServiceFailed` events and in the returned report.
    pub async fn initialize(&self) -> InitReport {
        self.start_bridge();

        let report = self.registry.init_all().await;
        for (service, error) in report.failures() {
            self.event_bus.emit(AppEvent::ServiceFailed {
                service: service.to_string(),
                error,
            });
        }

        self.push.set_registration_active(self.worker.is_registered());
        info!(
            "service manager initialized ({} of {} services healthy)",
            self.registry.health_check().iter().filter(|h| h.healthy).count(),
            self.registry.len()
        );
        report
    }

    fn start_bridge(&self) {
        let mut events = self.event_bus.subscribe();
        let updates = self.updates.clone();
        let reporter = ErrorForwarder {
            reporter: self.error_reporter.clone(),
            network: self.network.clone(),
            updates: self.updates.clone(),
        };

        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(AppEvent::SyncItemDropped { id, sync_type, error }) => {
                        let message = format!("{sync_type} item {id} dropped after retries: {error}");
                        reporter.forward("background_sync", &message).await;
                    }
                    Ok(AppEvent::WorkerUpdateAvailable) => {
                        if let Err(e) = updates.check_for_updates().await {
                            warn!("update check after worker install failed: {e}");
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => warn!("service bridge lagged by {n} events"),
                    Err(RecvError::Closed) => break,
                }
            }
        });

        if let Ok(mut slot) = self.bridge.lock() {
            if let Some(old) = slot.replace(handle) {
                old.abort();
            }
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<AppEvent> {
        self.event_bus.subscribe()
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    pub fn sync(&self) -> &BackgroundSyncService {
        &self.sync
    }

    pub fn worker(&self) -> &ServiceWorkerService {
        &self.worker
    }

    pub fn push(&self) -> &PushService {
        &self.push
    }

    pub fn updates(&self) -> &AppUpdateService {
        &self.updates
    }

    /// React to a fresh AQI reading.
    ///
    /// Offline readings are queued (HIGH, 30 minute expiry). Readings above
    /// the location's alert threshold raise a notification.
    pub async fn handle_air_quality_update(&self, update: &AirQualityUpdate) -> AirQualityOutcome {
        let mut outcome = AirQualityOutcome::default();

        if !self.network.is_online() {
            let payload = json!({
                "location": update.location,
                "lat": update.lat,
                "lon": update.lon,
                "aqi": update.aqi,
            });
            let id = self
                .sync
                .add_to_queue(
                    SyncType::AirQualityRequest,
                    payload,
                    SyncPriority::High,
                    QueueOptions::expiring_in(constants::sync::AIR_QUALITY_EXPIRY_MS),
                )
                .await;
            outcome.queued_id = Some(id);
        }

        let fallback = self.config.read().await.alerts.notify_threshold;
        let threshold = threshold_for(&self.alert_settings(), &update.location, fallback);
        if update.aqi > threshold {
            let payload = PushService::air_quality_notification(update.aqi, &update.location);
            match self.push.show_notification(&payload).await {
                Ok(()) => outcome.notified = true,
                Err(e) => debug!("AQI alert for {} not shown: {e}", update.location),
            }
        }

        outcome
    }

    /// Queue a location change (MEDIUM, one hour expiry).
    pub async fn handle_location_update(&self, location: serde_json::Value) -> String {
        self.sync
            .add_to_queue(
                SyncType::LocationUpdate,
                location,
                SyncPriority::Medium,
                QueueOptions::expiring_in(constants::sync::LOCATION_EXPIRY_MS),
            )
            .await
    }

    /// Queue an analytics event (LOW, 24 hour expiry).
    pub async fn track_analytics_event(&self, name: &str, properties: serde_json::Value) -> String {
        let payload = json!({
            "event": name,
            "properties": properties,
            "timestamp": chrono::Utc::now().timestamp_millis(),
            "platform": Platform::current().id(),
        });
        self.sync
            .add_to_queue(
                SyncType::AnalyticsEvent,
                payload,
                SyncPriority::Low,
                QueueOptions::expiring_in(constants::sync::ANALYTICS_EXPIRY_MS),
            )
            .await
    }

    /// Resolve the current position and forward it as a location update.
    pub async fn refresh_location(&self, provider: &dyn LocationProvider) -> ZephraResult<String> {
        let secs = self.config.read().await.alerts.geolocation_timeout_secs;
        let position = tokio::time::timeout(Duration::from_secs(secs), provider.current_position())
            .await
            .map_err(|_| ZephraError::Timeout(format!("geolocation did not resolve within {secs}s")))??;

        let payload = json!({
            "lat": position.lat,
            "lon": position.lon,
            "accuracy": position.accuracy,
            "timestamp": chrono::Utc::now().timestamp_millis(),
        });
        Ok(self.handle_location_update(payload).await)
    }

    pub fn alert_settings(&self) -> Vec<AlertSetting> {
        load_json_or_default(self.store.as_ref(), storage_keys::ALERT_SETTINGS)
    }

    pub fn user_preferences(&self) -> UserPreferences {
        let health_profile: Option<HealthProfile> =
            load_json_or_default(self.store.as_ref(), storage_keys::HEALTH_PROFILE);
        UserPreferences {
            alert_settings: self.alert_settings(),
            health_profile,
        }
    }

    /// Persist preferences locally and queue them for the backend.
    pub async fn update_preferences(&self, preferences: &UserPreferences) -> ZephraResult<String> {
        save_json(self.store.as_ref(), storage_keys::ALERT_SETTINGS, &preferences.alert_settings)?;
        if let Some(profile) = &preferences.health_profile {
            save_json(self.store.as_ref(), storage_keys::HEALTH_PROFILE, profile)?;
        }

        let payload = serde_json::to_value(preferences)?;
        Ok(self
            .sync
            .add_to_queue(SyncType::UserPreference, payload, SyncPriority::Medium, QueueOptions::default())
            .await)
    }

    /// Ask for permission and subscribe to push where available.
    ///
    /// Returns whether notifications are now permitted.
    pub async fn enable_notifications(&self) -> ZephraResult<bool> {
        if self.push.request_permission().await? != PermissionState::Granted {
            return Ok(false);
        }
        match self.push.subscribe().await {
            Ok(_) => {}
            Err(e @ (ZephraError::Unsupported(_) | ZephraError::MissingConfig(_))) => {
                warn!("push subscription unavailable, local notifications only: {e}");
            }
            Err(e) => return Err(e),
        }
        Ok(true)
    }

    pub async fn disable_notifications(&self) -> ZephraResult<bool> {
        self.push.unsubscribe().await
    }

    pub async fn check_for_app_updates(&self) -> ZephraResult<Option<UpdateInfo>> {
        self.updates.check_for_updates().await
    }

    pub async fn install_app_update(&self) -> ZephraResult<bool> {
        self.updates.install_update().await
    }

    /// Drain the sync queue now. Returns how many items were delivered.
    pub async fn force_sync_all(&self) -> usize {
        self.sync.force_sync().await
    }

    pub async fn clear_all_caches(&self) -> ZephraResult<Vec<String>> {
        self.worker.clear_cache(None).await
    }

    pub async fn cache_stats(&self) -> ZephraResult<CacheStats> {
        self.worker.get_cache_stats().await
    }

    /// Best-effort error report to the backend. Skipped while offline.
    pub async fn report_error(&self, context: &str, message: &str) -> bool {
        ErrorForwarder {
            reporter: self.error_reporter.clone(),
            network: self.network.clone(),
            updates: self.updates.clone(),
        }
        .forward(context, message)
        .await
    }

    pub async fn get_status(&self) -> ServiceStatus {
        ServiceStatus {
            online: self.network.is_online(),
            sync: self.sync.queue_status().await,
            worker: self.worker.worker_status(),
            push: self.push.push_status(),
            updates: self.updates.get_update_status(),
            services: self.registry.health_check(),
        }
    }

    pub fn health_check(&self) -> Vec<ServiceHealth> {
        self.registry.health_check()
    }

    /// Stop every manager in reverse order and cancel their timers.
    pub async fn shutdown(&self) {
        if let Ok(mut slot) = self.bridge.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
        self.registry.shutdown_all().await;
        info!("service manager shut down");
    }
}

/// Sends error reports while online.
struct ErrorForwarder {
    reporter: Arc<dyn ErrorReporter>,
    network: NetworkMonitor,
    updates: AppUpdateService,
}

impl ErrorForwarder {
    async fn forward(&self, context: &str, message: &str) -> bool {
        if !self.network.is_online() {
            debug!("offline, not reporting {context} error");
            return false;
        }
        let report = ErrorReport::new(
            context,
            message,
            Platform::current().id(),
            &self.updates.current_version(),
        );
        match self.reporter.report(&report).await {
            Ok(()) => true,
            Err(e) => {
                debug!("error report failed: {e}");
                false
            }
        }
    }
}
