//! App update manager.
//!
//! Polls the version endpoint (once at startup, then on an interval) and
//! records an `UpdateInfo` only when a strictly newer release is reported.
//! Installing asks the waiting worker to take over, waits for the controller
//! change (bounded by a timeout), then records the new current version and
//! appends to a bounded install history.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use zephra_api::VersionCheckRequest;
use zephra_core::config::UpdateConfig;
use zephra_core::constants::{storage_keys, USER_AGENT};
use zephra_core::error::ZephraResult;
use zephra_core::platform::Platform;
use zephra_models::models::version::is_newer;
use zephra_models::store::{load_json_or_default, save_json};
use zephra_models::{AppVersion, KeyValueStore, UpdateInfo, VersionHistoryEntry};

use crate::event_bus::{AppEvent, EventBus};
use crate::ports::{VersionSource, WorkerHost, WorkerHostEvent};
use crate::service::{Service, ServiceState, StateCell};

/// Version identity and timing for update checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSettings {
    /// Version assumed when nothing has been installed yet.
    pub current_version: String,
    pub build_number: String,
    pub check_interval: Duration,
    pub controller_change_timeout: Duration,
    pub max_history: usize,
}

impl From<&UpdateConfig> for UpdateSettings {
    fn from(config: &UpdateConfig) -> Self {
        Self {
            current_version: config.current_version.clone(),
            build_number: config.build_number.clone(),
            check_interval: Duration::from_secs(config.check_interval_secs.max(1)),
            controller_change_timeout: Duration::from_millis(config.controller_change_timeout_ms),
            max_history: config.max_history.max(1),
        }
    }
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self::from(&UpdateConfig::default())
    }
}

/// Snapshot for status displays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatus {
    pub current_version: String,
    pub update_available: bool,
    pub available_version: Option<String>,
    pub critical: bool,
    pub release_notes: Option<String>,
    /// Last successful check, epoch milliseconds.
    pub last_checked: Option<i64>,
    pub installing: bool,
}

struct UpdateInner {
    state: StateCell,
    store: Arc<dyn KeyValueStore>,
    source: Arc<dyn VersionSource>,
    host: Arc<dyn WorkerHost>,
    event_bus: EventBus,
    settings: UpdateSettings,
    update_info: Mutex<Option<UpdateInfo>>,
    last_checked: Mutex<Option<i64>>,
    installing: AtomicBool,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

/// Manager tracking the installed and available app versions.
#[derive(Clone)]
pub struct AppUpdateService {
    inner: Arc<UpdateInner>,
}

/// Clears the installing flag however an install ends.
struct InstallGuard<'a>(&'a AtomicBool);

impl Drop for InstallGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl AppUpdateService {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        source: Arc<dyn VersionSource>,
        host: Arc<dyn WorkerHost>,
        settings: UpdateSettings,
        event_bus: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(UpdateInner {
                state: StateCell::default(),
                store,
                source,
                host,
                event_bus,
                settings,
                update_info: Mutex::new(None),
                last_checked: Mutex::new(None),
                installing: AtomicBool::new(false),
                poll_task: Mutex::new(None),
            }),
        }
    }

    /// Installed version: the stored record, else the configured version.
    pub fn current_version(&self) -> String {
        let stored: Option<AppVersion> =
            load_json_or_default(self.inner.store.as_ref(), storage_keys::APP_VERSION);
        stored
            .map(|v| v.version)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.inner.settings.current_version.clone())
    }

    pub fn update_info(&self) -> Option<UpdateInfo> {
        self.inner.update_info.lock().ok().and_then(|i| i.clone())
    }

    fn set_update_info(&self, info: Option<UpdateInfo>) -> Option<UpdateInfo> {
        match self.inner.update_info.lock() {
            Ok(mut slot) => std::mem::replace(&mut *slot, info),
            Err(_) => None,
        }
    }

    /// Ask the version endpoint whether a newer release exists.
    pub async fn check_for_updates(&self) -> ZephraResult<Option<UpdateInfo>> {
        let current = self.current_version();
        let request = VersionCheckRequest {
            current_version: current.clone(),
            build_number: self.inner.settings.build_number.clone(),
            platform: Platform::current().id().to_string(),
            user_agent: USER_AGENT.to_string(),
        };

        let response = self.inner.source.check_version(&request).await?;
        let checked_at = now_ms();
        if let Ok(mut last) = self.inner.last_checked.lock() {
            *last = Some(checked_at);
        }

        let available = response
            .version
            .filter(|v| response.update_available && is_newer(&v.version, &current));

        let Some(available) = available else {
            if self.set_update_info(None).is_some() {
                debug!("cleared stale update info");
            }
            debug!("no update available (current {current})");
            return Ok(None);
        };

        let info = UpdateInfo {
            current_version: current.clone(),
            available,
            checked_at,
        };
        let previous = self.set_update_info(Some(info.clone()));
        let is_new = previous.map_or(true, |p| p.available.version != info.available.version);

        if is_new {
            if info.available.critical {
                warn!("critical update available: {current} -> {}", info.available.version);
            } else {
                info!("update available: {current} -> {}", info.available.version);
            }
            self.inner.event_bus.emit(AppEvent::AppUpdateAvailable {
                current_version: current,
                available_version: info.available.version.clone(),
                critical: info.available.critical,
            });
        }
        Ok(Some(info))
    }

    /// Activate the available update.
    ///
    /// Returns false when nothing is available or an install is already
    /// running.
    pub async fn install_update(&self) -> ZephraResult<bool> {
        if self
            .inner
            .installing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("update install already in progress");
            return Ok(false);
        }
        let _guard = InstallGuard(&self.inner.installing);

        let Some(info) = self.update_info() else {
            debug!("no update to install");
            return Ok(false);
        };

        match self.activate_and_record(&info).await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!("update install failed: {e}");
                self.inner.event_bus.emit(AppEvent::AppUpdateFailed { error: e.to_string() });
                Err(e)
            }
        }
    }

    async fn activate_and_record(&self, info: &UpdateInfo) -> ZephraResult<()> {
        let host = &self.inner.host;
        if host.is_supported() && host.has_waiting() {
            let mut events = host.subscribe();
            host.skip_waiting().await?;
            self.await_controller_change(&mut events).await;
        }

        let previous = self.current_version();
        save_json(self.inner.store.as_ref(), storage_keys::APP_VERSION, &info.available)?;

        let mut history = self.version_history();
        history.push(VersionHistoryEntry {
            version: info.available.version.clone(),
            previous_version: Some(previous.clone()),
            installed_at: now_ms(),
        });
        let excess = history.len().saturating_sub(self.inner.settings.max_history);
        history.drain(..excess);
        save_json(self.inner.store.as_ref(), storage_keys::VERSION_HISTORY, &history)?;

        self.set_update_info(None);
        info!("installed version {} (was {previous})", info.available.version);
        self.inner.event_bus.emit(AppEvent::AppUpdateInstalled {
            version: info.available.version.clone(),
            previous_version: previous,
        });
        Ok(())
    }

    async fn await_controller_change(&self, events: &mut tokio::sync::broadcast::Receiver<WorkerHostEvent>) {
        let wait = async {
            loop {
                match events.recv().await {
                    Ok(WorkerHostEvent::ControllerChanged) => return true,
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return false,
                }
            }
        };
        match tokio::time::timeout(self.inner.settings.controller_change_timeout, wait).await {
            Ok(true) => debug!("new worker took control"),
            Ok(false) => debug!("worker event stream closed before controller change"),
            Err(_) => warn!("controller change not observed, continuing after timeout"),
        }
    }

    /// Dismiss the available update until the next check reports it again.
    pub fn postpone_update(&self) {
        if let Some(info) = self.set_update_info(None) {
            info!("postponed update to {}", info.available.version);
        }
    }

    pub fn version_history(&self) -> Vec<VersionHistoryEntry> {
        load_json_or_default(self.inner.store.as_ref(), storage_keys::VERSION_HISTORY)
    }

    pub fn get_update_status(&self) -> UpdateStatus {
        let info = self.update_info();
        UpdateStatus {
            current_version: self.current_version(),
            update_available: info.is_some(),
            available_version: info.as_ref().map(|i| i.available.version.clone()),
            critical: info.as_ref().is_some_and(|i| i.available.critical),
            release_notes: info.and_then(|i| i.available.release_notes),
            last_checked: self.inner.last_checked.lock().ok().and_then(|l| *l),
            installing: self.inner.installing.load(Ordering::SeqCst),
        }
    }

    fn spawn_poller(&self) -> JoinHandle<()> {
        let this = self.clone();
        let period = self.inner.settings.check_interval;
        tokio::spawn(async move {
            // The first tick completes immediately: check once at startup.
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = this.check_for_updates().await {
                    warn!("update check failed: {e}");
                }
            }
        })
    }
}

#[async_trait]
impl Service for AppUpdateService {
    fn name(&self) -> &str {
        "app_updates"
    }

    fn state(&self) -> ServiceState {
        self.inner.state.get()
    }

    async fn init(&self) -> ZephraResult<()> {
        self.inner.state.set(ServiceState::Initializing);
        info!("running version {}", self.current_version());
        let handle = self.spawn_poller();
        if let Ok(mut slot) = self.inner.poll_task.lock() {
            if let Some(old) = slot.replace(handle) {
                old.abort();
            }
        }
        self.inner.state.set(ServiceState::Running);
        Ok(())
    }

    async fn shutdown(&self) -> ZephraResult<()> {
        self.inner.state.set(ServiceState::ShuttingDown);
        if let Ok(mut slot) = self.inner.poll_task.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
        self.inner.state.set(ServiceState::Stopped);
        Ok(())
    }
}
