//! Probe execution: a single HTTP check against a single target.

mod http;

pub use http::*;

use std::time::Duration;

/// Build the shared HTTP client used by every worker.
///
/// Connection pooling lives here; per-check deadlines are applied per
/// request by the caller. The client-level timeout is a hard safety net.
pub fn build_client(user_agent: &str) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(user_agent.to_string())
        .connect_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(Duration::from_secs(10))
        .build()
}
