//! Fixed pool of concurrent check executors.

use super::{CheckJob, CheckResult};
use crate::probe::check_once;

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

/// Spawn a fixed pool of workers that pull jobs, run checks under the
/// per-job timeout, and push results.
///
/// The pool size never changes at runtime. Workers exit when the job queue
/// closes or shutdown fires; on shutdown an in-flight check is abandoned
/// and its result may be lost.
pub fn start_workers(
    count: usize,
    client: reqwest::Client,
    jobs_rx: mpsc::Receiver<CheckJob>,
    results_tx: mpsc::Sender<CheckResult>,
    shutdown: &broadcast::Sender<()>,
) -> Vec<JoinHandle<()>> {
    let count = count.max(1);
    // tokio's mpsc receiver is single-consumer; the pool shares it behind a
    // lock held only across recv.
    let jobs_rx = Arc::new(Mutex::new(jobs_rx));

    (1..=count)
        .map(|id| {
            let client = client.clone();
            let jobs_rx = Arc::clone(&jobs_rx);
            let results_tx = results_tx.clone();
            let mut stop = shutdown.subscribe();

            tokio::spawn(async move {
                run_worker(id, client, jobs_rx, results_tx, &mut stop).await;
            })
        })
        .collect()
}

async fn run_worker(
    id: usize,
    client: reqwest::Client,
    jobs_rx: Arc<Mutex<mpsc::Receiver<CheckJob>>>,
    results_tx: mpsc::Sender<CheckResult>,
    stop: &mut broadcast::Receiver<()>,
) {
    loop {
        let job = tokio::select! {
            _ = stop.recv() => break,
            job = recv_job(&jobs_rx) => match job {
                Some(job) => job,
                // Closed job queue is a clean shutdown signal.
                None => break,
            },
        };

        let timeout = job.target.timeout;
        let mut result = tokio::select! {
            _ = stop.recv() => break,
            result = check_once(&client, &job.target, timeout) => result,
        };

        // Fields that belong to the job, not the raw check.
        result.attempt = job.attempt;

        tokio::select! {
            _ = stop.recv() => break,
            sent = results_tx.send(result) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!("worker {} exiting", id);
}

async fn recv_job(jobs_rx: &Mutex<mpsc::Receiver<CheckJob>>) -> Option<CheckJob> {
    jobs_rx.lock().await.recv().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{Method, Target};
    use crate::probe::build_client;
    use chrono::Utc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn serve_ok() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = [0u8; 2048];
                let _ = sock.read(&mut buf).await;
                let _ = sock
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok")
                    .await;
                let _ = sock.shutdown().await;
            }
        });

        format!("http://{}", addr)
    }

    fn job(url: &str, attempt: u32) -> CheckJob {
        CheckJob {
            target: Arc::new(Target {
                name: "alpha".to_string(),
                url: url.to_string(),
                method: Method::Get,
                interval: Duration::from_secs(30),
                timeout: Duration::from_secs(2),
                expected_status: 200,
                contains: None,
                max_body_bytes: 0,
                enabled: true,
                tags: Vec::new(),
            }),
            scheduled_at: Utc::now(),
            attempt,
        }
    }

    #[tokio::test]
    async fn executes_jobs_and_stamps_attempt() {
        let url = serve_ok().await;
        let (jobs_tx, jobs_rx) = mpsc::channel(8);
        let (results_tx, mut results_rx) = mpsc::channel(8);
        let (shutdown, _) = broadcast::channel(1);

        let client = build_client("pulsewatch-test").unwrap();
        let handles = start_workers(2, client, jobs_rx, results_tx, &shutdown);

        jobs_tx.send(job(&url, 3)).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), results_rx.recv())
            .await
            .expect("worker should produce a result")
            .unwrap();
        assert_eq!(result.target_name, "alpha");
        assert!(result.up);
        assert_eq!(result.attempt, 3);

        drop(jobs_tx);
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .expect("worker should exit on closed queue")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn shutdown_stops_idle_workers() {
        let (_jobs_tx, jobs_rx) = mpsc::channel::<CheckJob>(1);
        let (results_tx, _results_rx) = mpsc::channel(1);
        let (shutdown, _) = broadcast::channel(1);

        let client = build_client("pulsewatch-test").unwrap();
        let handles = start_workers(3, client, jobs_rx, results_tx, &shutdown);

        shutdown.send(()).unwrap();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .expect("worker should exit on shutdown")
                .unwrap();
        }
    }
}
