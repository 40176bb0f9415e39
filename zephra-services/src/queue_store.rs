//! Persistence of the background sync queue.

use std::sync::Arc;

use tracing::debug;

use zephra_core::constants::storage_keys;
use zephra_core::error::ZephraResult;
use zephra_models::store::{load_json_or_default, save_json};
use zephra_models::{KeyValueStore, SyncQueueItem};

/// Loads and saves the queue as one JSON array under a fixed key.
#[derive(Clone)]
pub struct QueueStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl QueueStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            key: storage_keys::SYNC_QUEUE.to_string(),
        }
    }

    /// Load the persisted queue.
    ///
    /// A missing key yields an empty queue; corrupt JSON is reset. The result
    /// is re-sorted by tier (stably) in case an older writer left it unsorted.
    pub fn load(&self) -> Vec<SyncQueueItem> {
        let mut items: Vec<SyncQueueItem> = load_json_or_default(self.store.as_ref(), &self.key);
        items.sort_by_key(|item| item.priority.rank());
        debug!("loaded {} queued item(s)", items.len());
        items
    }

    /// Persist the queue in its current order.
    pub fn save(&self, items: &[SyncQueueItem]) -> ZephraResult<()> {
        save_json(self.store.as_ref(), &self.key, items)
    }
}
