//! The monitoring pipeline.
//!
//! Stages connected by bounded queues: per-target schedulers feed a job
//! queue, a fixed worker pool turns jobs into results, a single aggregator
//! task owns all state and publishes snapshots, and an incident tracker
//! derives outage records from transition events.

mod aggregator;
mod incident;
mod scheduler;
mod types;
mod worker;

pub use aggregator::*;
pub use incident::*;
pub use scheduler::*;
pub use types::*;
pub use worker::*;

use crate::db::Store;
use crate::notify::WebhookNotifier;
use crate::snapshot::SnapshotStore;

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Queue and pool sizing for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub workers: usize,
    pub jobs_buffer: usize,
    pub results_buffer: usize,
    pub events_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            jobs_buffer: 200,
            results_buffer: 200,
            events_buffer: 50,
        }
    }
}

/// Spawn every pipeline stage.
///
/// The returned handles complete once `shutdown` fires (or the queues
/// close). The job queue drops on overflow; results and events apply
/// backpressure to their producers.
pub fn start_pipeline(
    cfg: &PipelineConfig,
    targets: &[Arc<Target>],
    client: reqwest::Client,
    store: Option<Arc<Store>>,
    snapshots: Arc<SnapshotStore>,
    notifier: Option<WebhookNotifier>,
    shutdown: &broadcast::Sender<()>,
) -> Vec<JoinHandle<()>> {
    let (jobs_tx, jobs_rx) = mpsc::channel(cfg.jobs_buffer.max(1));
    let (results_tx, results_rx) = mpsc::channel(cfg.results_buffer.max(1));
    let (events_tx, events_rx) = mpsc::channel(cfg.events_buffer.max(1));

    let mut handles = start_schedulers(targets, jobs_tx, shutdown);
    handles.extend(start_workers(
        cfg.workers,
        client,
        jobs_rx,
        results_tx,
        shutdown,
    ));
    handles.push(tokio::spawn(run_aggregator(
        results_rx,
        events_tx,
        store.clone(),
        snapshots,
        shutdown.subscribe(),
    )));
    handles.push(tokio::spawn(run_incident_tracker(
        events_rx,
        store,
        notifier,
        shutdown.subscribe(),
    )));

    handles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::build_client;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn serve_ok_forever() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let _ = sock.read(&mut buf).await;
                    let _ = sock
                        .write_all(
                            b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok",
                        )
                        .await;
                    let _ = sock.shutdown().await;
                });
            }
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn pipeline_end_to_end() {
        let url = serve_ok_forever().await;

        let target = Arc::new(Target {
            name: "alpha".to_string(),
            url,
            method: Method::Get,
            interval: Duration::from_millis(50),
            timeout: Duration::from_secs(2),
            expected_status: 200,
            contains: Some("ok".to_string()),
            max_body_bytes: 1024,
            enabled: true,
            tags: vec!["test".to_string()],
        });

        let snapshots = Arc::new(SnapshotStore::new());
        let (shutdown, _) = broadcast::channel(1);
        let client = build_client("pulsewatch-test").unwrap();

        let handles = start_pipeline(
            &PipelineConfig {
                workers: 2,
                ..Default::default()
            },
            &[target],
            client,
            None,
            Arc::clone(&snapshots),
            None,
            &shutdown,
        );

        // The immediate first check flows through to a published snapshot.
        let mut seen = false;
        for _ in 0..100 {
            let snap = snapshots.get();
            if let Some(alpha) = snap.by_name.get("alpha") {
                assert!(alpha.up);
                assert!(alpha.total_checks >= 1);
                assert_eq!(alpha.consecutive_fail, 0);
                seen = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(seen, "no snapshot published for the target");

        shutdown.send(()).unwrap();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .expect("pipeline stage should exit on shutdown")
                .unwrap();
        }
    }
}
