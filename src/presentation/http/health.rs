use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResp {
    pub status: &'static str,
}

/// Unconditional liveness probe: 200 while the listener is up, regardless
/// of database or cache reachability.
pub async fn healthz() -> Json<HealthResp> {
    Json(HealthResp { status: "ok" })
}
