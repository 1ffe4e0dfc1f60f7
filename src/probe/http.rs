//! HTTP check implementation.

use crate::monitor::{CheckResult, Method, Target};

use chrono::Utc;
use std::time::{Duration, Instant};

const DEFAULT_MAX_BODY_BYTES: u64 = 64 * 1024;

/// Perform a single check against `target` under the given deadline.
///
/// Never returns an error: every failure mode is folded into the result,
/// with transport errors and validation failures kept disjoint. Latency is
/// measured from request issuance, also when the check fails.
pub async fn check_once(
    client: &reqwest::Client,
    target: &Target,
    timeout: Duration,
) -> CheckResult {
    let start = Instant::now();

    let mut res = CheckResult {
        target_name: target.name.clone(),
        url: target.url.clone(),
        at: Utc::now(),
        attempt: 1,
        ..Default::default()
    };

    let method = match target.method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
    };

    let response = match client
        .request(method, &target.url)
        .timeout(timeout)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            res.error = Some(classify_error(&e));
            res.latency = start.elapsed();
            return res;
        }
    };

    res.status_code = response.status().as_u16();
    res.latency = start.elapsed();

    // 1) Status code validation.
    if target.expected_status != 0 && res.status_code != target.expected_status {
        res.validation = Some(format!(
            "unexpected status: got {} want {}",
            res.status_code, target.expected_status
        ));
        return res;
    }

    // With no expected status, 200..400 counts as up.
    if target.expected_status == 0 && !(200..400).contains(&res.status_code) {
        res.validation = Some(format!("bad status: {}", res.status_code));
        return res;
    }

    // 2) Keyword validation (GET only; HEAD responses have no body).
    let contains = target
        .contains
        .as_deref()
        .map(str::trim)
        .filter(|kw| !kw.is_empty());
    if let Some(keyword) = contains {
        if target.method == Method::Head {
            res.validation =
                Some("keyword check configured but method is HEAD (no body)".to_string());
            return res;
        }

        let max_bytes = if target.max_body_bytes == 0 {
            DEFAULT_MAX_BODY_BYTES
        } else {
            target.max_body_bytes
        };

        let body = match read_body_limited(response, max_bytes).await {
            Ok(b) => b,
            Err(e) => {
                res.error = Some(format!("read body: {}", classify_error(&e)));
                return res;
            }
        };

        if !body.contains(keyword) {
            res.validation = Some(format!("keyword missing: {:?}", keyword));
            return res;
        }
    }

    res.up = true;
    res
}

/// Read at most `max_bytes` of the response body.
async fn read_body_limited(
    mut response: reqwest::Response,
    max_bytes: u64,
) -> Result<String, reqwest::Error> {
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = response.chunk().await? {
        let remaining = max_bytes as usize - buf.len();
        if chunk.len() >= remaining {
            buf.extend_from_slice(&chunk[..remaining]);
            break;
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Map a transport error to a stable, human-readable reason.
///
/// Timeouts and cancellations get fixed labels so downstream classification
/// (incident start status) can special-case them.
fn classify_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return "timeout".to_string();
    }

    let text = root_cause(err);
    if text.contains("canceled") || text.contains("cancelled") {
        return "canceled".to_string();
    }
    text
}

/// Walk the source chain to the innermost error; reqwest's outer messages
/// ("error sending request for url ...") bury the interesting part.
fn root_cause(err: &reqwest::Error) -> String {
    let mut source: &dyn std::error::Error = err;
    while let Some(next) = source.source() {
        source = next;
    }
    source.to_string()
}
