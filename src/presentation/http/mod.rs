pub mod health;
pub mod metrics;

use axum::routing::get;
use axum::Router;

use crate::bootstrap::app_context::AppContext;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/metrics", get(metrics::metrics))
}
