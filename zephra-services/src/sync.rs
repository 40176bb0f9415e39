//! Background sync: a persisted priority queue drained against the network.
//!
//! Operations attempted while offline (or that failed in flight) are queued
//! with a priority tier and an optional expiry. The queue is drained head
//! to tail whenever the client comes online, when new work arrives while
//! online, on a fallback interval, and when a backoff timer fires. While a
//! backoff is pending only the timer itself (or coming back online) drains.
//!
//! Failure handling: a failed item's `retry_count` is incremented; under its
//! cap the item moves to the tail of its tier, a retry is armed after
//! `min(base * 2^retry_count, cap)` and the pass stops. At the cap the item
//! is dropped and `SyncItemDropped` is emitted once. Storage failures are
//! logged and never surface to callers.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use zephra_core::config::SyncConfig;
use zephra_core::error::ZephraResult;
use zephra_models::models::sync_item::{enqueue, purge_expired, requeue_to_tier_tail};
use zephra_models::{SyncPriority, SyncQueueItem, SyncType};

use crate::event_bus::{AppEvent, EventBus};
use crate::network::NetworkMonitor;
use crate::ports::SyncTransport;
use crate::queue_store::QueueStore;
use crate::service::{Service, ServiceState, StateCell};

/// Retry and scheduling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub fallback_interval: Duration,
    pub default_max_retries: u32,
}

impl SyncPolicy {
    /// Backoff before retry number `retry_count`: `min(base * 2^n, cap)`.
    pub fn retry_delay(&self, retry_count: u32) -> Duration {
        let factor = 1u64.checked_shl(retry_count).unwrap_or(u64::MAX);
        let delay_ms = self.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

impl From<&SyncConfig> for SyncPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            base_delay_ms: config.base_retry_delay_ms,
            max_delay_ms: config.max_retry_delay_ms,
            fallback_interval: config.fallback_interval(),
            default_max_retries: config.default_max_retries,
        }
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

/// Per-item options for [`BackgroundSyncService::add_to_queue`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueOptions {
    /// Attempts before the item is dropped. Defaults to the policy value.
    pub max_retries: Option<u32>,
    /// Lifetime in milliseconds from now.
    pub expires_in_ms: Option<i64>,
}

impl QueueOptions {
    pub fn expiring_in(ms: i64) -> Self {
        Self {
            max_retries: None,
            expires_in_ms: Some(ms),
        }
    }
}

/// Snapshot of the queue for status displays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub pending: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    /// Enqueue time of the oldest item, epoch milliseconds.
    pub oldest_timestamp: Option<i64>,
    pub processing: bool,
    pub online: bool,
    pub retry_pending: bool,
}

struct SyncInner {
    state: StateCell,
    queue: Mutex<Vec<SyncQueueItem>>,
    store: QueueStore,
    transport: Arc<dyn SyncTransport>,
    network: NetworkMonitor,
    event_bus: EventBus,
    policy: SyncPolicy,
    in_progress: AtomicBool,
    retry_timer: Mutex<Option<JoinHandle<()>>>,
    background_tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Manager owning the background sync queue.
#[derive(Clone)]
pub struct BackgroundSyncService {
    inner: Arc<SyncInner>,
}

/// Clears the in-progress flag when a drain ends, however it ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl BackgroundSyncService {
    pub fn new(
        store: QueueStore,
        transport: Arc<dyn SyncTransport>,
        network: NetworkMonitor,
        event_bus: EventBus,
        policy: SyncPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                state: StateCell::default(),
                queue: Mutex::new(Vec::new()),
                store,
                transport,
                network,
                event_bus,
                policy,
                in_progress: AtomicBool::new(false),
                retry_timer: Mutex::new(None),
                background_tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn policy(&self) -> SyncPolicy {
        self.inner.policy
    }

    /// Queue an operation and return its id.
    ///
    /// The item lands after the last item of equal or higher priority. When
    /// online and not backing off, a drain starts immediately in the
    /// background.
    pub async fn add_to_queue(
        &self,
        sync_type: SyncType,
        payload: serde_json::Value,
        priority: SyncPriority,
        options: QueueOptions,
    ) -> String {
        let item = SyncQueueItem::new(
            sync_type,
            payload,
            priority,
            options.max_retries.unwrap_or(self.inner.policy.default_max_retries),
            options.expires_in_ms,
            now_ms(),
        );
        let id = item.id.clone();

        {
            let mut queue = self.inner.queue.lock().await;
            let position = enqueue(&mut queue, item);
            self.persist(&queue);
            debug!("queued {sync_type} {id} ({priority}) at position {position} of {}", queue.len());
        }

        self.inner.event_bus.emit(AppEvent::SyncItemQueued {
            id: id.clone(),
            sync_type,
            priority,
        });

        if self.inner.network.is_online() {
            self.spawn_drain();
        }

        id
    }

    /// Drain the queue. Returns how many items were delivered.
    ///
    /// No-op while offline or while another drain is running.
    pub async fn process_sync_queue(&self) -> usize {
        if !self.inner.network.is_online() {
            debug!("offline, skipping sync drain");
            return 0;
        }
        if self
            .inner
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("sync drain already in progress");
            return 0;
        }
        let _guard = DrainGuard(&self.inner.in_progress);

        self.purge_expired().await;

        let mut delivered = 0;
        loop {
            if !self.inner.network.is_online() {
                info!("went offline, pausing sync drain");
                break;
            }

            let head = self.inner.queue.lock().await.first().cloned();
            let Some(item) = head else { break };

            match self.inner.transport.deliver(&item).await {
                Ok(()) => {
                    let removed = {
                        let mut queue = self.inner.queue.lock().await;
                        let removed = match queue.iter().position(|q| q.id == item.id) {
                            Some(pos) => {
                                queue.remove(pos);
                                true
                            }
                            None => false,
                        };
                        self.persist(&queue);
                        removed
                    };
                    if removed {
                        delivered += 1;
                        debug!("synced {} {}", item.sync_type, item.id);
                        self.inner.event_bus.emit(AppEvent::SyncItemCompleted {
                            id: item.id.clone(),
                            sync_type: item.sync_type,
                        });
                    }
                }
                Err(e) => {
                    if !self.handle_failure(&item, &e.to_string()).await {
                        break;
                    }
                }
            }
        }

        if delivered > 0 {
            info!("sync drain delivered {delivered} item(s)");
        }
        delivered
    }

    /// Apply the retry policy to a failed item. Returns whether the drain
    /// may continue with the next item.
    async fn handle_failure(&self, item: &SyncQueueItem, error: &str) -> bool {
        let (retry_count, dropped) = {
            let mut queue = self.inner.queue.lock().await;
            let Some(pos) = queue.iter().position(|q| q.id == item.id) else {
                // Removed while in flight.
                return true;
            };

            queue[pos].retry_count += 1;
            let retry_count = queue[pos].retry_count;

            let dropped = if queue[pos].is_exhausted() {
                Some(queue.remove(pos))
            } else {
                requeue_to_tier_tail(&mut queue, pos);
                None
            };
            self.persist(&queue);
            (retry_count, dropped)
        };

        if let Some(dropped) = dropped {
            warn!(
                "dropping {} {} after {} failed attempt(s): {error}",
                dropped.sync_type, dropped.id, retry_count
            );
            self.inner.event_bus.emit(AppEvent::SyncItemDropped {
                id: dropped.id,
                sync_type: dropped.sync_type,
                error: error.to_string(),
            });
            return true;
        }

        let delay = self.inner.policy.retry_delay(retry_count);
        warn!(
            "sync of {} {} failed (attempt {}/{}), retrying in {:.1}s: {error}",
            item.sync_type,
            item.id,
            retry_count,
            item.max_retries,
            delay.as_secs_f64()
        );
        self.schedule_retry(delay).await;
        self.inner.event_bus.emit(AppEvent::SyncRetryScheduled {
            id: item.id.clone(),
            retry_count,
            delay_ms: delay.as_millis() as u64,
        });
        false
    }

    /// Arm the single backoff timer, replacing any pending one.
    async fn schedule_retry(&self, delay: Duration) {
        let mut slot = self.inner.retry_timer.lock().await;
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        let this = self.clone();
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detach our own handle so a retry armed by this drain does not abort us.
            this.inner.retry_timer.lock().await.take();
            this.drain_boxed().await;
        }));
    }

    /// The retry timer is armed from inside a drain, so the drain it runs
    /// must be boxed to keep the future type finite.
    fn drain_boxed(&self) -> Pin<Box<dyn Future<Output = usize> + Send + '_>> {
        Box::pin(self.process_sync_queue())
    }

    async fn retry_pending(&self) -> bool {
        self.inner
            .retry_timer
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Drain for automatic triggers. A pending backoff holds them off until
    /// its timer fires.
    async fn drain_unless_backing_off(&self) -> usize {
        if self.retry_pending().await {
            debug!("sync retry pending, deferring drain");
            return 0;
        }
        self.process_sync_queue().await
    }

    async fn cancel_retry(&self) {
        if let Some(handle) = self.inner.retry_timer.lock().await.take() {
            handle.abort();
            debug!("cancelled pending sync retry");
        }
    }

    /// Same as a normal drain; kept as the explicit user-facing entry point.
    pub async fn force_sync(&self) -> usize {
        info!("forced sync requested");
        self.process_sync_queue().await
    }

    /// Remove every queued item and cancel any pending retry.
    pub async fn clear_queue(&self) -> usize {
        let count = {
            let mut queue = self.inner.queue.lock().await;
            let count = queue.len();
            queue.clear();
            self.persist(&queue);
            count
        };
        self.cancel_retry().await;
        info!("cleared sync queue ({count} item(s))");
        self.inner.event_bus.emit(AppEvent::SyncQueueCleared { count });
        count
    }

    /// Remove one item by id.
    pub async fn remove_item(&self, id: &str) -> bool {
        let mut queue = self.inner.queue.lock().await;
        match queue.iter().position(|q| q.id == id) {
            Some(pos) => {
                queue.remove(pos);
                self.persist(&queue);
                debug!("removed queued item {id}");
                true
            }
            None => false,
        }
    }

    /// Copy of the queue in service order.
    pub async fn queue_items(&self) -> Vec<SyncQueueItem> {
        self.inner.queue.lock().await.clone()
    }

    pub async fn queue_len(&self) -> usize {
        self.inner.queue.lock().await.len()
    }

    pub async fn queue_status(&self) -> QueueStatus {
        let queue = self.inner.queue.lock().await;
        let count = |p: SyncPriority| queue.iter().filter(|i| i.priority == p).count();
        QueueStatus {
            pending: queue.len(),
            high: count(SyncPriority::High),
            medium: count(SyncPriority::Medium),
            low: count(SyncPriority::Low),
            oldest_timestamp: queue.iter().map(|i| i.timestamp).min(),
            processing: self.inner.in_progress.load(Ordering::SeqCst),
            online: self.inner.network.is_online(),
            retry_pending: self
                .inner
                .retry_timer
                .try_lock()
                .map(|slot| slot.as_ref().is_some_and(|h| !h.is_finished()))
                .unwrap_or(true),
        }
    }

    async fn purge_expired(&self) -> usize {
        let purged = {
            let mut queue = self.inner.queue.lock().await;
            let purged = purge_expired(&mut queue, now_ms());
            if purged > 0 {
                self.persist(&queue);
            }
            purged
        };
        if purged > 0 {
            info!("purged {purged} expired sync item(s)");
            self.inner.event_bus.emit(AppEvent::SyncItemsExpired { count: purged });
        }
        purged
    }

    fn persist(&self, queue: &[SyncQueueItem]) {
        if let Err(e) = self.inner.store.save(queue) {
            warn!("failed to persist sync queue: {e}");
        }
    }

    fn spawn_drain(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            this.drain_unless_backing_off().await;
        });
    }

    /// Follow connectivity: drain on the online transition. Coming back
    /// online resets any pending backoff.
    fn spawn_network_listener(&self) -> JoinHandle<()> {
        let this = self.clone();
        let mut rx = self.inner.network.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let online = *rx.borrow_and_update();
                this.inner.event_bus.emit(AppEvent::NetworkChanged { online });
                if online {
                    this.cancel_retry().await;
                    this.process_sync_queue().await;
                }
            }
        })
    }

    /// Drain periodically in case a connectivity event was missed.
    fn spawn_fallback_timer(&self) -> JoinHandle<()> {
        let this = self.clone();
        let period = self.inner.policy.fallback_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if this.inner.network.is_online() && this.queue_len().await > 0 {
                    debug!("fallback sync tick");
                    this.drain_unless_backing_off().await;
                }
            }
        })
    }
}

#[async_trait]
impl Service for BackgroundSyncService {
    fn name(&self) -> &str {
        "background_sync"
    }

    fn state(&self) -> ServiceState {
        self.inner.state.get()
    }

    async fn init(&self) -> ZephraResult<()> {
        self.inner.state.set(ServiceState::Initializing);

        let restored = self.inner.store.load();
        let pending = {
            let mut queue = self.inner.queue.lock().await;
            *queue = restored;
            queue.len()
        };
        self.purge_expired().await;

        {
            let mut tasks = self.inner.background_tasks.lock().await;
            tasks.push(self.spawn_network_listener());
            tasks.push(self.spawn_fallback_timer());
        }

        self.inner.state.set(ServiceState::Running);
        info!("background sync initialized with {pending} restored item(s)");

        if self.inner.network.is_online() && self.queue_len().await > 0 {
            self.spawn_drain();
        }
        Ok(())
    }

    async fn shutdown(&self) -> ZephraResult<()> {
        self.inner.state.set(ServiceState::ShuttingDown);
        for handle in self.inner.background_tasks.lock().await.drain(..) {
            handle.abort();
        }
        self.cancel_retry().await;
        self.inner.state.set(ServiceState::Stopped);
        info!("background sync stopped");
        Ok(())
    }
}
