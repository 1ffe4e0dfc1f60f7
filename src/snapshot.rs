//! Immutable, atomically published view of all targets' state.

use crate::monitor::TargetState;

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Per-target status as exposed to the API layer.
#[derive(Debug, Clone, Serialize)]
pub struct TargetStatus {
    pub name: String,
    pub url: String,
    pub up: bool,
    pub last_checked: String,
    pub latency_ms: i64,
    pub status_code: u16,
    pub last_error: Option<String>,

    pub consecutive_success: u32,
    pub consecutive_fail: u32,
    pub total_checks: u64,
    pub total_fails: u64,
}

impl From<&TargetState> for TargetStatus {
    fn from(st: &TargetState) -> Self {
        Self {
            name: st.name.clone(),
            url: st.url.clone(),
            up: st.last_up,
            last_checked: st.last_checked.to_rfc3339(),
            latency_ms: st.last_latency.as_millis() as i64,
            status_code: st.last_status_code,
            last_error: st.last_error.clone(),
            consecutive_success: st.consecutive_success,
            consecutive_fail: st.consecutive_fail,
            total_checks: st.total_checks,
            total_fails: st.total_fails,
        }
    }
}

/// A complete, consistent view of all targets at one point in time.
/// Replaced wholesale on every aggregator iteration, never mutated.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub all: Vec<TargetStatus>,
    pub by_name: HashMap<String, TargetStatus>,
}

/// Holder of the latest published snapshot.
///
/// Written only by the aggregator; read concurrently by the API layer.
/// Starts out holding an empty snapshot so readers never observe "nothing".
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current snapshot.
    pub fn publish(&self, snapshot: Snapshot) {
        let mut current = self.current.write().unwrap();
        *current = Arc::new(snapshot);
    }

    /// Return the latest snapshot. Cheap: clones an Arc, not the data.
    pub fn get(&self) -> Arc<Snapshot> {
        self.current.read().unwrap().clone()
    }
}
