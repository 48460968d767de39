use axum::extract::State;
use axum::Json;

use crate::application::services::realtime::metrics::MetricsSnapshot;
use crate::bootstrap::app_context::AppContext;

pub async fn metrics(State(ctx): State<AppContext>) -> Json<MetricsSnapshot> {
    Json(ctx.metrics().snapshot())
}
