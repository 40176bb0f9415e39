//! Online/offline state shared by every manager.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Connectivity flag published over a watch channel.
///
/// The host (a UI shell, the CLI, or a test) reports transitions through
/// [`NetworkMonitor::set_online`]; managers read the current value or
/// follow changes through [`NetworkMonitor::subscribe`].
#[derive(Clone)]
pub struct NetworkMonitor {
    state_tx: Arc<watch::Sender<bool>>,
}

impl NetworkMonitor {
    pub fn new(online: bool) -> Self {
        let (state_tx, _) = watch::channel(online);
        Self {
            state_tx: Arc::new(state_tx),
        }
    }

    /// Current connectivity.
    pub fn is_online(&self) -> bool {
        *self.state_tx.borrow()
    }

    /// Record connectivity. Returns whether the value changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!("network is now {}", if online { "online" } else { "offline" });
        }
        changed
    }

    /// Subscribe to connectivity transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state_tx.subscribe()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
