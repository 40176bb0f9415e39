//! Service trait and lifecycle management.
//!
//! All managers implement the `Service` trait which provides a standard
//! lifecycle (init, shutdown) and health checking interface.

use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use serde::Serialize;

use zephra_core::error::ZephraResult;

/// Lifecycle state of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    /// Service has been created but not initialized.
    Created,
    /// Service is initializing.
    Initializing,
    /// Service is running and ready.
    Running,
    /// Service is shutting down.
    ShuttingDown,
    /// Service has been stopped.
    Stopped,
    /// Service encountered a fatal error.
    Failed,
}

impl ServiceState {
    fn to_u8(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Initializing => 1,
            Self::Running => 2,
            Self::ShuttingDown => 3,
            Self::Stopped => 4,
            Self::Failed => 5,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Initializing,
            2 => Self::Running,
            3 => Self::ShuttingDown,
            4 => Self::Stopped,
            _ => Self::Failed,
        }
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Initializing => write!(f, "initializing"),
            Self::Running => write!(f, "running"),
            Self::ShuttingDown => write!(f, "shutting_down"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Lock-free holder for a service's lifecycle state.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: ServiceState) -> Self {
        Self(AtomicU8::new(state.to_u8()))
    }

    pub fn get(&self) -> ServiceState {
        ServiceState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: ServiceState) {
        self.0.store(state.to_u8(), Ordering::SeqCst);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(ServiceState::Created)
    }
}

/// Trait that all Zephra managers implement.
///
/// Managers are cheap-to-clone handles over shared state, so lifecycle
/// methods take `&self`. A failing `init` leaves the service in
/// [`ServiceState::Failed`].
#[async_trait]
pub trait Service: Send + Sync {
    /// Human-readable name of this service.
    fn name(&self) -> &str;

    /// Current state of this service.
    fn state(&self) -> ServiceState;

    /// Initialize the service. Called once during application startup.
    async fn init(&self) -> ZephraResult<()>;

    /// Gracefully shut down the service, cancelling its timers.
    async fn shutdown(&self) -> ZephraResult<()>;

    /// Health check. Returns true if the service is operational.
    fn is_healthy(&self) -> bool {
        self.state() == ServiceState::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestService {
        state: StateCell,
    }

    #[async_trait]
    impl Service for TestService {
        fn name(&self) -> &str { "test" }
        fn state(&self) -> ServiceState { self.state.get() }
        async fn init(&self) -> ZephraResult<()> {
            self.state.set(ServiceState::Running);
            Ok(())
        }
        async fn shutdown(&self) -> ZephraResult<()> {
            self.state.set(ServiceState::Stopped);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_service_lifecycle() {
        let svc = TestService { state: StateCell::default() };
        assert!(!svc.is_healthy());
        svc.init().await.unwrap();
        assert!(svc.is_healthy());
        svc.shutdown().await.unwrap();
        assert!(!svc.is_healthy());
    }

    #[test]
    fn test_state_cell_round_trips_every_state() {
        let cell = StateCell::default();
        for state in [
            ServiceState::Created,
            ServiceState::Initializing,
            ServiceState::Running,
            ServiceState::ShuttingDown,
            ServiceState::Stopped,
            ServiceState::Failed,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn test_service_state_display() {
        assert_eq!(ServiceState::ShuttingDown.to_string(), "shutting_down");
        assert_eq!(serde_json::to_string(&ServiceState::Running).unwrap(), "\"running\"");
    }
}
