use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, used as the shared clock for
/// presence heartbeats across rooms and the sweeper.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
