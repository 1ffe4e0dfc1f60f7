//! Database model types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A persisted outage record for one (target, probe) pair.
#[derive(Debug, Clone, Serialize)]
pub struct Incident {
    pub id: i64,
    pub target_name: String,
    pub probe: String,

    pub started_at: DateTime<Utc>,
    pub start_status: String,
    pub start_status_code: Option<u16>,
    pub start_error: Option<String>,

    pub ended_at: Option<DateTime<Utc>>,
    pub end_status: Option<String>,
    pub end_status_code: Option<u16>,
    pub end_error: Option<String>,
}

/// Per-target uptime counts over a sliding window.
#[derive(Debug, Clone, Serialize)]
pub struct UptimeStat {
    pub target_name: String,
    pub total_checks: i64,
    pub total_up: i64,
}

impl UptimeStat {
    pub fn uptime_pct(&self) -> f64 {
        if self.total_checks > 0 {
            self.total_up as f64 / self.total_checks as f64 * 100.0
        } else {
            0.0
        }
    }
}
