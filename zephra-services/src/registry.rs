//! Service registry for lifecycle management.
//!
//! The registry holds every manager behind the [`Service`] trait. Startup
//! runs all `init`s concurrently and waits for every one to settle, so one
//! failing manager never blocks or aborts the others. Shutdown runs in
//! reverse registration order.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use zephra_core::error::ZephraError;

use crate::service::{Service, ServiceState};

/// Outcome of initializing one service.
#[derive(Debug)]
pub struct InitOutcome {
    pub name: String,
    pub result: Result<(), ZephraError>,
}

/// Outcome of [`ServiceRegistry::init_all`], in registration order.
#[derive(Debug, Default)]
pub struct InitReport {
    pub outcomes: Vec<InitOutcome>,
}

impl InitReport {
    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// `(service, error)` for every service that failed.
    pub fn failures(&self) -> Vec<(&str, String)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.name.as_str(), e.to_string())))
            .collect()
    }
}

/// Health snapshot of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceHealth {
    pub name: String,
    pub state: ServiceState,
    pub healthy: bool,
}

/// Central registry that owns the managers' lifecycle.
#[derive(Default)]
pub struct ServiceRegistry {
    services: Vec<Arc<dyn Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service. Shutdown runs in reverse registration order.
    pub fn register(&mut self, service: Arc<dyn Service>) {
        info!("registered service: {}", service.name());
        self.services.push(service);
    }

    /// Initialize every service concurrently and wait for all of them.
    pub async fn init_all(&self) -> InitReport {
        info!("initializing {} services", self.services.len());

        let mut set = JoinSet::new();
        for (index, service) in self.services.iter().enumerate() {
            let service = service.clone();
            set.spawn(async move { (index, service.init().await) });
        }

        let mut results: Vec<Option<Result<(), ZephraError>>> =
            (0..self.services.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => error!("service init task failed to join: {e}"),
            }
        }

        let outcomes = self
            .services
            .iter()
            .zip(results)
            .map(|(service, result)| {
                let name = service.name().to_string();
                let result = result.unwrap_or_else(|| {
                    Err(ZephraError::ServiceInit(format!("{name} init task panicked")))
                });
                match &result {
                    Ok(()) => info!("service {name} initialized"),
                    Err(e) => error!("service {name} failed to initialize: {e}"),
                }
                InitOutcome { name, result }
            })
            .collect();

        InitReport { outcomes }
    }

    /// Shut down every service in reverse registration order.
    pub async fn shutdown_all(&self) {
        info!("shutting down {} services", self.services.len());
        for service in self.services.iter().rev() {
            if let Err(e) = service.shutdown().await {
                warn!("service {} shutdown error: {e}", service.name());
            }
        }
    }

    pub fn health_check(&self) -> Vec<ServiceHealth> {
        self.services
            .iter()
            .map(|s| ServiceHealth {
                name: s.name().to_string(),
                state: s.state(),
                healthy: s.is_healthy(),
            })
            .collect()
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use async_trait::async_trait;
    use zephra_core::error::ZephraResult;
    use crate::service::StateCell;

    struct Probe {
        name: &'static str,
        fail: bool,
        state: StateCell,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Service for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn state(&self) -> ServiceState {
            self.state.get()
        }

        async fn init(&self) -> ZephraResult<()> {
            if self.fail {
                self.state.set(ServiceState::Failed);
                return Err(ZephraError::ServiceInit(format!("{} refused", self.name)));
            }
            self.state.set(ServiceState::Running);
            Ok(())
        }

        async fn shutdown(&self) -> ZephraResult<()> {
            self.log.lock().unwrap().push(self.name.to_string());
            self.state.set(ServiceState::Stopped);
            Ok(())
        }
    }

    fn recording_service(name: &'static str, fail: bool, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Service> {
        Arc::new(Probe { name, fail, state: StateCell::default(), log: log.clone() })
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_others() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ServiceRegistry::new();
        registry.register(recording_service("worker", false, &log));
        registry.register(recording_service("sync", true, &log));
        registry.register(recording_service("push", false, &log));

        let report = registry.init_all().await;
        assert!(!report.all_ok());
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.failures(), vec![("sync", "service init error: sync refused".to_string())]);

        let health = registry.health_check();
        assert!(health[0].healthy);
        assert_eq!(health[1].state, ServiceState::Failed);
        assert!(health[2].healthy);
    }

    #[tokio::test]
    async fn test_shutdown_runs_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ServiceRegistry::new();
        registry.register(recording_service("a", false, &log));
        registry.register(recording_service("b", false, &log));
        registry.register(recording_service("c", false, &log));

        registry.init_all().await;
        registry.shutdown_all().await;
        assert_eq!(*log.lock().unwrap(), vec!["c", "b", "a"]);
        assert_eq!(registry.service_names(), vec!["a", "b", "c"]);
    }
}
