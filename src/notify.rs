//! Outbound notifications for up/down transitions.

use crate::monitor::Event;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Posts transition messages to a webhook as `{"text": ...}` JSON.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }

    /// Deliver one message. Callers log failures; nothing is retried.
    pub async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status()));
        }
        Ok(())
    }
}

/// Human-readable message for a transition event.
pub fn format_event_message(ev: &Event) -> String {
    if ev.to {
        format_up_message(ev)
    } else {
        format_down_message(ev)
    }
}

fn format_down_message(ev: &Event) -> String {
    let mut status_line = String::from("Status: ");
    if ev.status_code == 0 {
        // No response at all; the reason says why.
        if ev.reason.is_empty() {
            status_line.push_str("TIMEOUT");
        } else {
            status_line.push_str(&format!("TIMEOUT ({})", ev.reason));
        }
    } else {
        if ev.status_code >= 500 {
            status_line.push_str(&format!("HTTP {} (server error)", ev.status_code));
        } else {
            status_line.push_str(&format!("HTTP {}", ev.status_code));
        }
        if !ev.reason.is_empty() {
            status_line.push_str(&format!(" - {}", ev.reason));
        }
    }

    format!(
        "DOWN: {}\n{}\nProbe: primary\nAt: {}",
        ev.target_name,
        status_line,
        ev.at.format("%Y-%m-%d %H:%M UTC")
    )
}

fn format_up_message(ev: &Event) -> String {
    let mut status_line = String::from("Status: ");
    if ev.status_code == 0 {
        status_line.push_str("UP");
    } else {
        status_line.push_str(&format!("HTTP {}", ev.status_code));
        if !ev.reason.is_empty() {
            status_line.push_str(&format!(" - {}", ev.reason));
        }
    }

    format!(
        "UP: {}\n{}\nProbe: primary\nAt: {}",
        ev.target_name,
        status_line,
        ev.at.format("%Y-%m-%d %H:%M UTC")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn event(to: bool, reason: &str, status_code: u16) -> Event {
        Event {
            target_name: "alpha".to_string(),
            url: "https://alpha.example".to_string(),
            from: !to,
            to,
            at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap(),
            reason: reason.to_string(),
            status_code,
        }
    }

    #[test]
    fn down_message_for_timeout() {
        let msg = format_event_message(&event(false, "timeout", 0));
        assert!(msg.starts_with("DOWN: alpha"));
        assert!(msg.contains("Status: TIMEOUT (timeout)"));
        assert!(msg.contains("Probe: primary"));
        assert!(msg.contains("2025-06-01 12:30 UTC"));
    }

    #[test]
    fn down_message_for_server_error() {
        let msg = format_event_message(&event(false, "bad status: 503", 503));
        assert!(msg.contains("Status: HTTP 503 (server error) - bad status: 503"));
    }

    #[test]
    fn up_message_confirms_recovery() {
        let msg = format_event_message(&event(true, "", 200));
        assert!(msg.starts_with("UP: alpha"));
        assert!(msg.contains("Status: HTTP 200"));
    }

    async fn serve_status(status_line: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            if let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = sock.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    status_line
                );
                let _ = sock.write_all(response.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn webhook_delivery() {
        let url = serve_status("200 OK").await;
        let notifier = WebhookNotifier::new(reqwest::Client::new(), url);
        notifier.notify("DOWN: alpha").await.unwrap();
    }

    #[tokio::test]
    async fn webhook_failure_surfaces_status() {
        let url = serve_status("500 Internal Server Error").await;
        let notifier = WebhookNotifier::new(reqwest::Client::new(), url);
        let err = notifier.notify("DOWN: alpha").await.unwrap_err();
        assert!(matches!(err, NotifyError::Status(_)));
    }
}
