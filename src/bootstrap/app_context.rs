use std::sync::Arc;

use crate::application::ports::access_repository::AccessRepository;
use crate::application::services::realtime::metrics::MetricsCollector;
use crate::application::services::realtime::registry::RoomRegistry;
use crate::application::services::realtime::snapshot::SnapshotService;
use crate::bootstrap::config::Config;
use crate::infrastructure::auth::TokenVerifier;

/// Shared, cheaply-cloneable application state handed to every axum
/// handler as router state.
#[derive(Clone)]
pub struct AppContext {
    pub cfg: Config,
    services: Arc<AppServices>,
}

struct AppServices {
    access_repo: Arc<dyn AccessRepository>,
    token_verifier: Arc<TokenVerifier>,
    snapshot_service: Arc<SnapshotService>,
    registry: Arc<RoomRegistry>,
    metrics: Arc<MetricsCollector>,
}

impl AppContext {
    pub fn new(
        cfg: Config,
        access_repo: Arc<dyn AccessRepository>,
        token_verifier: Arc<TokenVerifier>,
        snapshot_service: Arc<SnapshotService>,
        registry: Arc<RoomRegistry>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            cfg,
            services: Arc::new(AppServices {
                access_repo,
                token_verifier,
                snapshot_service,
                registry,
                metrics,
            }),
        }
    }

    pub fn access_repo(&self) -> Arc<dyn AccessRepository> {
        self.services.access_repo.clone()
    }

    pub fn token_verifier(&self) -> Arc<TokenVerifier> {
        self.services.token_verifier.clone()
    }

    pub fn snapshot_service(&self) -> Arc<SnapshotService> {
        self.services.snapshot_service.clone()
    }

    pub fn registry(&self) -> Arc<RoomRegistry> {
        self.services.registry.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.services.metrics.clone()
    }
}
