//! Application state shared across handlers.

use std::sync::Arc;

use mangashelf_core::{SystemTimeSource, TimeSource};
use mangashelf_store::{Backend, ServiceConfig, Services};

use crate::config::ServerConfig;
use crate::events::NotificationBroadcaster;

/// Application state shared across all handlers.
///
/// This is cloneable and can be extracted in handlers using `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    services: Services,
    config: Arc<ServerConfig>,
    broadcaster: Arc<NotificationBroadcaster>,
}

impl AppState {
    /// Create new application state over a storage backend.
    pub fn new(backend: Arc<dyn Backend>, config: ServerConfig) -> Self {
        Self::with_time_source(backend, Arc::new(SystemTimeSource), config)
    }

    pub fn with_time_source(
        backend: Arc<dyn Backend>,
        clock: Arc<dyn TimeSource>,
        config: ServerConfig,
    ) -> Self {
        let broadcaster = Arc::new(NotificationBroadcaster::new());
        let services = Services::new(
            backend,
            clock,
            broadcaster.clone(),
            ServiceConfig {
                low_balance_threshold: config.low_balance_threshold,
            },
        );
        Self {
            services,
            config: Arc::new(config),
            broadcaster,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn broadcaster(&self) -> &Arc<NotificationBroadcaster> {
        &self.broadcaster
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
