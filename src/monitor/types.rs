//! Core types flowing through the monitoring pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// HTTP method used for a check. Only GET and HEAD are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Get,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
        }
    }
}

/// A monitoring target. Built from configuration at startup and immutable
/// thereafter.
#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub url: String,
    pub method: Method,
    /// How often to schedule checks.
    pub interval: Duration,
    /// Per-check timeout.
    pub timeout: Duration,
    /// Exact status code to require; 0 accepts any 200..400.
    pub expected_status: u16,
    /// Optional keyword that must occur in the body (GET only).
    pub contains: Option<String>,
    /// Limit on how much of the body is read for the keyword check.
    pub max_body_bytes: u64,
    pub enabled: bool,
    pub tags: Vec<String>,
}

/// A single scheduled check.
#[derive(Debug, Clone)]
pub struct CheckJob {
    pub target: Arc<Target>,
    pub scheduled_at: DateTime<Utc>,
    /// Reserved for retries; always 1 for now.
    pub attempt: u32,
}

/// The outcome of executing one check.
#[derive(Debug, Clone, Default)]
pub struct CheckResult {
    pub target_name: String,
    pub url: String,

    pub at: DateTime<Utc>,
    pub latency: Duration,

    pub up: bool,
    /// 0 if no response was received.
    pub status_code: u16,
    /// Transport-level failure (connect, DNS, TLS, timeout, ...).
    pub error: Option<String>,
    /// Validation failure (unexpected status, missing keyword).
    pub validation: Option<String>,

    pub attempt: u32,
}

impl CheckResult {
    /// Human-readable reason for a failed check: the transport error when
    /// present, otherwise the validation message.
    pub fn reason(&self) -> Option<&str> {
        self.error.as_deref().or(self.validation.as_deref())
    }

    /// Status label used by the persistence sink: UP, TIMEOUT, or DOWN.
    pub fn status_label(&self) -> &'static str {
        if self.up {
            "UP"
        } else if is_timeout_reason(self.error.as_deref()) {
            "TIMEOUT"
        } else {
            "DOWN"
        }
    }
}

/// The rolling view per target. Owned exclusively by the aggregator.
#[derive(Debug, Clone, Default)]
pub struct TargetState {
    pub name: String,
    pub url: String,

    pub last_up: bool,
    pub last_checked: DateTime<Utc>,
    pub last_latency: Duration,
    pub last_status_code: u16,
    /// Reason of the most recent failure. Kept across recoveries.
    pub last_error: Option<String>,

    pub consecutive_success: u32,
    pub consecutive_fail: u32,

    pub total_checks: u64,
    pub total_fails: u64,
}

impl TargetState {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            ..Default::default()
        }
    }

    /// Fold one result into the state.
    pub fn apply(&mut self, res: &CheckResult) {
        self.name = res.target_name.clone();
        self.url = res.url.clone();
        self.last_checked = res.at;
        self.last_up = res.up;
        self.last_latency = res.latency;
        self.last_status_code = res.status_code;
        self.total_checks += 1;

        if res.up {
            self.consecutive_success += 1;
            self.consecutive_fail = 0;
        } else {
            self.total_fails += 1;
            self.consecutive_fail += 1;
            self.consecutive_success = 0;
            self.last_error = res.reason().map(str::to_string);
        }
    }
}

/// Emitted when a target's up-state flips between consecutive checks.
#[derive(Debug, Clone)]
pub struct Event {
    pub target_name: String,
    pub url: String,

    pub from: bool,
    pub to: bool,

    pub at: DateTime<Utc>,
    pub reason: String,
    pub status_code: u16,
}

impl Event {
    /// Status label recorded when this event opens an incident.
    pub fn down_status(&self) -> &'static str {
        if self.status_code == 0 && is_timeout_reason(Some(&self.reason)) {
            "TIMEOUT"
        } else {
            "DOWN"
        }
    }
}

fn is_timeout_reason(reason: Option<&str>) -> bool {
    match reason {
        Some(r) => {
            let r = r.to_lowercase();
            r.contains("timeout") || r.contains("canceled")
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(up: bool, error: Option<&str>) -> CheckResult {
        CheckResult {
            target_name: "t".to_string(),
            url: "https://t.example".to_string(),
            at: Utc::now(),
            latency: Duration::from_millis(10),
            up,
            status_code: if up { 200 } else { 0 },
            error: error.map(str::to_string),
            validation: None,
            attempt: 1,
        }
    }

    #[test]
    fn streaks_are_mutually_exclusive() {
        let mut st = TargetState::new("t", "https://t.example");

        for up in [true, true, false, false, true, false, true] {
            st.apply(&result(up, if up { None } else { Some("connect refused") }));
            if st.last_up {
                assert_eq!(st.consecutive_fail, 0);
                assert!(st.consecutive_success > 0);
            } else {
                assert_eq!(st.consecutive_success, 0);
                assert!(st.consecutive_fail > 0);
            }
        }
    }

    #[test]
    fn totals_add_up() {
        let mut st = TargetState::new("t", "https://t.example");
        let ups = [true, false, true, true, false, false];

        for up in ups {
            st.apply(&result(up, if up { None } else { Some("timeout") }));
        }

        assert_eq!(st.total_checks, ups.len() as u64);
        assert_eq!(st.total_fails, ups.iter().filter(|u| !**u).count() as u64);
    }

    #[test]
    fn failure_reason_is_recorded_and_kept() {
        let mut st = TargetState::new("t", "https://t.example");

        st.apply(&result(false, Some("timeout")));
        assert_eq!(st.last_error.as_deref(), Some("timeout"));

        // Recovery does not erase the last known failure reason.
        st.apply(&result(true, None));
        assert!(st.last_up);
        assert_eq!(st.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn status_labels() {
        assert_eq!(result(true, None).status_label(), "UP");
        assert_eq!(result(false, Some("timeout")).status_label(), "TIMEOUT");
        assert_eq!(result(false, Some("connect refused")).status_label(), "DOWN");

        // Validation failures are DOWN, not TIMEOUT.
        let mut res = result(false, None);
        res.validation = Some("keyword missing: \"OK\"".to_string());
        assert_eq!(res.status_label(), "DOWN");
        assert_eq!(res.reason(), Some("keyword missing: \"OK\""));
    }

    #[test]
    fn down_event_status() {
        let mut ev = Event {
            target_name: "t".to_string(),
            url: "https://t.example".to_string(),
            from: true,
            to: false,
            at: Utc::now(),
            reason: "timeout".to_string(),
            status_code: 0,
        };
        assert_eq!(ev.down_status(), "TIMEOUT");

        ev.reason = "connect refused".to_string();
        assert_eq!(ev.down_status(), "DOWN");

        // A real HTTP status is never a timeout, whatever the reason says.
        ev.reason = "timeout".to_string();
        ev.status_code = 503;
        assert_eq!(ev.down_status(), "DOWN");
    }
}
