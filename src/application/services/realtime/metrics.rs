use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

/// Tracks active rooms, active connections, and a rolling 60s count of
/// successfully applied editor/owner updates.
pub struct MetricsCollector {
    active_documents: AtomicUsize,
    active_connections: AtomicUsize,
    ops: Mutex<VecDeque<Instant>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            active_documents: AtomicUsize::new(0),
            active_connections: AtomicUsize::new(0),
            ops: Mutex::new(VecDeque::new()),
        }
    }
}

impl MetricsCollector {
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn room_created(&self) {
        self.active_documents.fetch_add(1, Ordering::Relaxed);
    }

    pub fn room_removed(&self) {
        self.active_documents.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_operation(&self) {
        let now = Instant::now();
        let mut ops = self.ops.lock().unwrap();
        ops.push_back(now);
        evict_stale(&mut ops, now);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let now = Instant::now();
        let ops_per_minute = {
            let mut ops = self.ops.lock().unwrap();
            evict_stale(&mut ops, now);
            ops.len()
        };
        MetricsSnapshot {
            active_documents: self.active_documents.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            ops_per_minute,
        }
    }
}

fn evict_stale(ops: &mut VecDeque<Instant>, now: Instant) {
    while let Some(front) = ops.front() {
        if now.duration_since(*front) > WINDOW {
            ops.pop_front();
        } else {
            break;
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub active_documents: usize,
    pub active_connections: usize,
    pub ops_per_minute: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_rooms_and_connections() {
        let m = MetricsCollector::default();
        m.room_created();
        m.connection_opened();
        m.connection_opened();
        let snap = m.snapshot();
        assert_eq!(snap.active_documents, 1);
        assert_eq!(snap.active_connections, 2);
    }

    #[test]
    fn operations_outside_window_are_discarded() {
        let m = MetricsCollector::default();
        {
            let mut ops = m.ops.lock().unwrap();
            ops.push_back(Instant::now() - Duration::from_secs(61));
        }
        m.record_operation();
        let snap = m.snapshot();
        assert_eq!(snap.ops_per_minute, 1);
    }
}
