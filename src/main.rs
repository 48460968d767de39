use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use dotenvy::dotenv;
use http::HeaderValue;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use noterelay::application::ports::access_repository::AccessRepository;
use noterelay::application::ports::cache_port::CachePort;
use noterelay::application::ports::snapshot_store::DurableStore;
use noterelay::application::services::realtime::metrics::MetricsCollector;
use noterelay::application::services::realtime::registry::RoomRegistry;
use noterelay::application::services::realtime::snapshot::SnapshotService;
use noterelay::application::services::realtime::sweeper;
use noterelay::bootstrap::app_context::AppContext;
use noterelay::bootstrap::config::Config;
use noterelay::infrastructure::auth::TokenVerifier;
use noterelay::infrastructure::cache::{NoopCache, RedisCache};
use noterelay::infrastructure::db::repositories::{SqlxAccessRepository, SqlxSnapshotRepository};
use noterelay::infrastructure::db::{connect_pool, migrate};
use noterelay::presentation::{http as presentation_http, ws as presentation_ws};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = Config::from_env()?;
    info!(port = cfg.port, "starting noterelay");

    let pool = connect_pool(&cfg.database_url).await?;
    migrate(&pool).await?;

    let access_repo: Arc<dyn AccessRepository> = Arc::new(SqlxAccessRepository::new(pool.clone()));
    let durable: Arc<dyn DurableStore> = Arc::new(SqlxSnapshotRepository::new(pool.clone()));
    let cache: Arc<dyn CachePort> = match &cfg.redis_url {
        Some(url) => match RedisCache::new(url) {
            Ok(cache) => Arc::new(cache),
            Err(e) => {
                error!(error = ?e, "redis_init_failed_falling_back_to_durable_only");
                Arc::new(NoopCache)
            }
        },
        None => Arc::new(NoopCache),
    };

    let token_verifier = Arc::new(TokenVerifier::new(&cfg.jwt_secret));
    let snapshot_service = Arc::new(SnapshotService::new(cache, durable));
    let metrics = Arc::new(MetricsCollector::default());
    let registry = Arc::new(RoomRegistry::new(snapshot_service.clone(), metrics.clone()));

    let ctx = AppContext::new(
        cfg.clone(),
        access_repo,
        token_verifier,
        snapshot_service,
        registry.clone(),
        metrics,
    );

    let cors = if cfg.is_production {
        match &cfg.cors_origin {
            Some(origin) => CorsLayer::new()
                .allow_origin(origin.parse::<HeaderValue>().map(AllowOrigin::exact)?)
                .allow_methods([http::Method::GET, http::Method::POST])
                .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION]),
            None => CorsLayer::new().allow_origin(AllowOrigin::exact(HeaderValue::from_static(
                "http://invalid",
            ))),
        }
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods([http::Method::GET, http::Method::POST])
            .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
    };

    let app = Router::new()
        .merge(presentation_http::routes())
        .merge(presentation_ws::routes())
        .with_state(ctx)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let sweeper_registry = registry.clone();
    tokio::spawn(sweeper::run(sweeper_registry));

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    Ok(())
}

/// Waits for SIGINT/SIGTERM, then flushes every room's pending persist so a
/// debounce timer in flight isn't silently dropped on exit.
async fn shutdown_signal(registry: Arc<RoomRegistry>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl_c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, flushing pending persists");
    registry.flush_all().await;
}
