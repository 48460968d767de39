pub mod handler;

use axum::routing::get;
use axum::Router;

use crate::bootstrap::app_context::AppContext;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/ws", get(handler::ws_entry))
}
