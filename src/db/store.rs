//! SQLite store for check results and incidents.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

use super::models::*;
use crate::monitor::{CheckResult, Event, TargetState};

/// Probe identity recorded with every row. Only one probe exists today.
pub const PRIMARY_PROBE: &str = "primary";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    // --- Check results ---

    /// Append one check result. Append-only; callers treat failures as
    /// non-fatal.
    pub fn insert_check_result(&self, res: &CheckResult) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO check_results (target_name, checked_at, status, status_code, latency_ms, error, probe)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                res.target_name,
                format_db_time(res.at),
                res.status_label(),
                res.status_code,
                res.latency.as_millis() as i64,
                res.reason(),
                PRIMARY_PROBE,
            ],
        )?;
        Ok(())
    }

    /// Uptime counts for one target since `from`.
    pub fn uptime_stats(&self, target: &str, from: DateTime<Utc>) -> Result<UptimeStat, DbError> {
        let conn = self.conn.lock().unwrap();
        let (total, up) = conn.query_row(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'UP')
             FROM check_results
             WHERE target_name = ?1 AND checked_at >= ?2",
            params![target, format_db_time(from)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(UptimeStat {
            target_name: target.to_string(),
            total_checks: total,
            total_up: up,
        })
    }

    /// Uptime counts for every target with results since `from`.
    pub fn uptime_stats_all(&self, from: DateTime<Utc>) -> Result<Vec<UptimeStat>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT target_name, COUNT(*), COUNT(*) FILTER (WHERE status = 'UP')
             FROM check_results
             WHERE checked_at >= ?1
             GROUP BY target_name
             ORDER BY target_name",
        )?;

        let stats = stmt
            .query_map(params![format_db_time(from)], |row| {
                Ok(UptimeStat {
                    target_name: row.get(0)?,
                    total_checks: row.get(1)?,
                    total_up: row.get(2)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(stats)
    }

    // --- State hydration ---

    /// Reconstruct the last known state for a target from its check log.
    ///
    /// Returns `Ok(None)` when the target has no history; starting fresh is
    /// not an error.
    pub fn load_target_state(&self, name: &str) -> Result<Option<TargetState>, DbError> {
        let conn = self.conn.lock().unwrap();

        let last = conn
            .query_row(
                "SELECT checked_at, status, COALESCE(status_code, 0), COALESCE(latency_ms, 0), error
                 FROM check_results
                 WHERE target_name = ?1
                 ORDER BY checked_at DESC
                 LIMIT 1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u16>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((checked_at, status, status_code, latency_ms, error)) = last else {
            return Ok(None);
        };

        let mut st = TargetState::new(name, "");
        st.last_checked = parse_db_time(&checked_at).unwrap_or_else(Utc::now);
        st.last_up = status.eq_ignore_ascii_case("UP");
        st.last_latency = Duration::from_millis(latency_ms.max(0) as u64);
        st.last_status_code = status_code;
        st.last_error = error;

        let (total, fails) = conn.query_row(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE status <> 'UP')
             FROM check_results
             WHERE target_name = ?1",
            params![name],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )?;
        st.total_checks = total.max(0) as u64;
        st.total_fails = fails.max(0) as u64;

        // Streak: walk recent rows until the status changes.
        let mut stmt = conn.prepare(
            "SELECT status FROM check_results
             WHERE target_name = ?1
             ORDER BY checked_at DESC
             LIMIT 100",
        )?;
        let statuses = stmt
            .query_map(params![name], |row| row.get::<_, String>(0))?
            .collect::<SqlResult<Vec<_>>>()?;

        let mut streak: u32 = 0;
        if let Some(first) = statuses.first() {
            for status in &statuses {
                if !status.eq_ignore_ascii_case(first) {
                    break;
                }
                streak += 1;
            }
        }
        if st.last_up {
            st.consecutive_success = streak;
            st.consecutive_fail = 0;
        } else {
            st.consecutive_fail = streak;
            st.consecutive_success = 0;
        }

        Ok(Some(st))
    }

    // --- Incidents ---

    /// Open an incident for the event's target, unless one is already open.
    ///
    /// The existence check and the insert are a single statement, so
    /// concurrent down-events cannot create two open incidents.
    pub fn open_incident(&self, ev: &Event) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO incidents (target_name, probe, started_at, start_status, start_status_code, start_error)
             SELECT ?1, ?2, ?3, ?4, NULLIF(?5, 0), NULLIF(?6, '')
             WHERE NOT EXISTS (
                 SELECT 1 FROM incidents
                 WHERE target_name = ?1 AND probe = ?2 AND ended_at IS NULL
             )",
            params![
                ev.target_name,
                PRIMARY_PROBE,
                format_db_time(ev.at),
                ev.down_status(),
                ev.status_code,
                ev.reason,
            ],
        )?;
        Ok(())
    }

    /// Close the open incident for the event's target. No-op if none is open.
    pub fn close_incident(&self, ev: &Event) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE incidents
             SET ended_at = ?1,
                 end_status = 'UP',
                 end_status_code = NULLIF(?2, 0),
                 end_error = NULLIF(?3, ''),
                 updated_at = ?1
             WHERE target_name = ?4 AND probe = ?5 AND ended_at IS NULL",
            params![
                format_db_time(ev.at),
                ev.status_code,
                ev.reason,
                ev.target_name,
                PRIMARY_PROBE,
            ],
        )?;
        Ok(())
    }

    /// Number of currently open incidents for a target.
    pub fn open_incident_count(&self, target: &str) -> Result<i64, DbError> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM incidents
             WHERE target_name = ?1 AND probe = ?2 AND ended_at IS NULL",
            params![target, PRIMARY_PROBE],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Most recent incidents, newest first.
    pub fn recent_incidents(&self, limit: u32) -> Result<Vec<Incident>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, target_name, probe, started_at, start_status, start_status_code, start_error,
                    ended_at, end_status, end_status_code, end_error
             FROM incidents
             ORDER BY started_at DESC, id DESC
             LIMIT ?1",
        )?;

        let incidents = stmt
            .query_map(params![limit], |row| {
                let started_at: String = row.get(3)?;
                let ended_at: Option<String> = row.get(7)?;
                Ok(Incident {
                    id: row.get(0)?,
                    target_name: row.get(1)?,
                    probe: row.get(2)?,
                    started_at: parse_db_time(&started_at).unwrap_or_else(Utc::now),
                    start_status: row.get(4)?,
                    start_status_code: row.get(5)?,
                    start_error: row.get(6)?,
                    ended_at: ended_at.as_deref().and_then(parse_db_time),
                    end_status: row.get(8)?,
                    end_status_code: row.get(9)?,
                    end_error: row.get(10)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(incidents)
    }
}

/// Format a datetime for storage. Lexicographic order matches time order.
fn format_db_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S%.9f").to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [
        "%Y-%m-%d %H:%M:%S%.9f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}
