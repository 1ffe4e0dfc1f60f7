//! HTTP request handlers.

use super::AppState;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::json;

const DEFAULT_WINDOW_SECS: i64 = 24 * 60 * 60;

pub async fn handle_healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// The latest published snapshot. Non-blocking: whatever the aggregator
/// last published, even while persistence is degraded.
pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.snapshots.get();
    Json(snapshot.all.clone())
}

#[derive(Debug, Deserialize)]
pub struct UptimeQuery {
    pub target: String,
    pub window_secs: Option<i64>,
}

pub async fn handle_uptime(
    State(state): State<AppState>,
    Query(query): Query<UptimeQuery>,
) -> impl IntoResponse {
    let Some(store) = &state.store else {
        return (StatusCode::SERVICE_UNAVAILABLE, "persistence disabled").into_response();
    };

    let window_secs = query.window_secs.unwrap_or(DEFAULT_WINDOW_SECS);
    if window_secs <= 0 {
        return (StatusCode::BAD_REQUEST, "invalid window").into_response();
    }
    let from = Utc::now() - ChronoDuration::seconds(window_secs);

    match store.uptime_stats(&query.target, from) {
        Ok(stat) => Json(json!({
            "target": stat.target_name,
            "window_secs": window_secs,
            "from": from.to_rfc3339(),
            "total_checks": stat.total_checks,
            "total_up": stat.total_up,
            "uptime_pct": stat.uptime_pct(),
            "generated_at": Utc::now().to_rfc3339(),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("uptime query failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "uptime query failed").into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UptimeAllQuery {
    pub window_secs: Option<i64>,
}

pub async fn handle_uptime_all(
    State(state): State<AppState>,
    Query(query): Query<UptimeAllQuery>,
) -> impl IntoResponse {
    let Some(store) = &state.store else {
        return (StatusCode::SERVICE_UNAVAILABLE, "persistence disabled").into_response();
    };

    let window_secs = query.window_secs.unwrap_or(DEFAULT_WINDOW_SECS);
    if window_secs <= 0 {
        return (StatusCode::BAD_REQUEST, "invalid window").into_response();
    }
    let from = Utc::now() - ChronoDuration::seconds(window_secs);

    match store.uptime_stats_all(from) {
        Ok(stats) => {
            let targets: Vec<_> = stats
                .iter()
                .map(|stat| {
                    json!({
                        "target": stat.target_name,
                        "total_checks": stat.total_checks,
                        "total_up": stat.total_up,
                        "uptime_pct": stat.uptime_pct(),
                    })
                })
                .collect();

            Json(json!({
                "window_secs": window_secs,
                "from": from.to_rfc3339(),
                "targets": targets,
                "generated_at": Utc::now().to_rfc3339(),
            }))
            .into_response()
        }
        Err(e) => {
            tracing::error!("uptime query failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "uptime query failed").into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IncidentsQuery {
    pub limit: Option<u32>,
}

pub async fn handle_incidents(
    State(state): State<AppState>,
    Query(query): Query<IncidentsQuery>,
) -> impl IntoResponse {
    let Some(store) = &state.store else {
        return (StatusCode::SERVICE_UNAVAILABLE, "persistence disabled").into_response();
    };

    let limit = query.limit.unwrap_or(50).clamp(1, 500);

    match store.recent_incidents(limit) {
        Ok(incidents) => Json(incidents).into_response(),
        Err(e) => {
            tracing::error!("incidents query failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "incidents query failed").into_response()
        }
    }
}
